//! Swap target parsing
//!
//! A swap target is either a literal pool id (compressed public key hex) or
//! a bech32m/bech32 token identifier with the `btkn` prefix.

use bitcoin::bech32::primitives::decode::CheckedHrpstring;
use bitcoin::bech32::{Bech32, Bech32m};

/// Pool ids are 33-byte compressed public keys
pub fn is_pool_id(s: &str) -> bool {
    s.len() == 66 && s.bytes().all(|b| b.is_ascii_hexdigit()) && (s.starts_with("02") || s.starts_with("03"))
}

pub fn is_token_identifier(s: &str) -> bool {
    s.to_lowercase().starts_with("btkn")
}

/// Canonical hex of a token identifier, bech32m first, then legacy bech32
pub fn decode_token_identifier(s: &str) -> Option<String> {
    let checked = CheckedHrpstring::new::<Bech32m>(s)
        .or_else(|_| CheckedHrpstring::new::<Bech32>(s))
        .ok()?;
    Some(hex::encode(checked.byte_iter().collect::<Vec<u8>>()))
}

/// Parsed swap target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapTarget {
    Pool(String),
    Token {
        identifier: String,
        /// Decoded form, when the checksum verified
        hex: Option<String>,
    },
    Unrecognized(String),
}

impl SwapTarget {
    pub fn parse(target: &str) -> Self {
        let target = target.trim();
        if is_pool_id(target) {
            SwapTarget::Pool(target.to_string())
        } else if is_token_identifier(target) {
            SwapTarget::Token {
                identifier: target.to_string(),
                hex: decode_token_identifier(target),
            }
        } else {
            SwapTarget::Unrecognized(target.to_string())
        }
    }

    pub fn is_pool(&self) -> bool {
        matches!(self, SwapTarget::Pool(_))
    }

    /// Address forms to query pools by: hex, upper-case hex, then the identifier itself
    pub fn lookup_addresses(&self) -> Vec<String> {
        match self {
            SwapTarget::Token { identifier, hex } => {
                let mut addrs = Vec::with_capacity(3);
                if let Some(hex) = hex {
                    addrs.push(hex.clone());
                    addrs.push(hex.to_uppercase());
                }
                addrs.push(identifier.clone());
                addrs
            }
            SwapTarget::Pool(id) | SwapTarget::Unrecognized(id) => vec![id.clone()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::bech32::Hrp;

    fn encode<Ck: bitcoin::bech32::Checksum>(bytes: &[u8]) -> String {
        bitcoin::bech32::encode::<Ck>(Hrp::parse("btkn").unwrap(), bytes).unwrap()
    }

    #[test]
    fn test_pool_id_detection() {
        assert!(is_pool_id(&format!("02{}", "ab".repeat(32))));
        assert!(is_pool_id(&format!("03{}", "AB".repeat(32))));
        assert!(!is_pool_id(&format!("04{}", "ab".repeat(32))));
        assert!(!is_pool_id(&format!("02{}", "ab".repeat(31))));
        assert!(!is_pool_id(&format!("02{}zz", "ab".repeat(31))));
    }

    #[test]
    fn test_decode_bech32m_and_bech32() {
        let bytes = [0xde, 0xad, 0xbe, 0xef, 0x01];
        assert_eq!(decode_token_identifier(&encode::<Bech32m>(&bytes)).as_deref(), Some("deadbeef01"));
        assert_eq!(decode_token_identifier(&encode::<Bech32>(&bytes)).as_deref(), Some("deadbeef01"));
        assert_eq!(decode_token_identifier("btkn1notvalid"), None);
    }

    #[test]
    fn test_lookup_addresses() {
        let id = encode::<Bech32m>(&[0xab, 0xcd]);
        let target = SwapTarget::parse(&id);
        assert_eq!(target.lookup_addresses(), vec!["abcd".to_string(), "ABCD".to_string(), id.clone()]);

        let undecodable = SwapTarget::parse("btkn1garbage");
        assert_eq!(undecodable.lookup_addresses(), vec!["btkn1garbage".to_string()]);

        assert!(SwapTarget::parse(&format!("02{}", "11".repeat(32))).is_pool());
        assert!(matches!(SwapTarget::parse("hello"), SwapTarget::Unrecognized(_)));
    }
}
