//! Wallet Collaborator
//!
//! Typed interface to the custody wallet. Key management, signing and the
//! claim protocol itself live behind this trait; the deposit pipeline only
//! sees addresses, balances and claim calls.
//!
//! Wallet backends differ in which claim methods they expose. Instead of
//! calling blindly, a backend reports its [`WalletCapabilities`] up front and
//! the claim executor only issues calls the backend advertises.

pub mod claim;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

pub use claim::{ClaimArgs, ClaimCall, ClaimMethod, ClaimRef, StaticDepositQuote};

/// Capability names for the optional wallet surface
pub mod methods {
    pub const QUERY_STATIC_DEPOSIT_ADDRESSES: &str = "queryStaticDepositAddresses";
    pub const GET_UNUSED_DEPOSIT_ADDRESSES: &str = "getUnusedDepositAddresses";
    pub const GET_CLAIM_STATIC_DEPOSIT_QUOTE: &str = "getClaimStaticDepositQuote";
    pub const START_PERIODIC_CLAIM_TRANSFERS: &str = "startPeriodicClaimTransfers";
}

/// Wallet errors
#[derive(Debug, Clone, Error)]
pub enum WalletError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("{0}")]
    Rejected(String),

    #[error("method not available: {0}")]
    MethodUnavailable(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl WalletError {
    /// Connection-level failures worth retrying on the next poll
    pub fn is_transport(&self) -> bool {
        matches!(self, WalletError::Transport(_))
    }
}

/// Set of wallet method names the backend exposes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WalletCapabilities {
    methods: BTreeSet<String>,
}

impl WalletCapabilities {
    pub fn from_methods<I, S>(methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            methods: methods.into_iter().map(Into::into).collect(),
        }
    }

    pub fn supports(&self, method: &str) -> bool {
        self.methods.contains(method)
    }

    pub fn supports_claim(&self, method: ClaimMethod) -> bool {
        self.supports(method.wire_name())
    }

    /// Exposed claim-shaped methods, for diagnostics
    pub fn claim_methods(&self) -> Vec<&str> {
        self.methods
            .iter()
            .filter(|m| m.to_lowercase().contains("claim"))
            .map(String::as_str)
            .collect()
    }
}

/// Token balance normalized at the wallet boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub asset_id: String,
    /// Amount in minor units
    pub amount: u128,
    pub decimals: Option<u8>,
}

/// Wallet balance snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalance {
    pub balance_sats: u64,
    pub tokens: Vec<TokenBalance>,
}

impl WalletBalance {
    /// Amount held for an asset; `base_asset` maps to the sats balance
    pub fn amount_of(&self, asset_id: &str, base_asset: &str) -> u128 {
        if asset_id.eq_ignore_ascii_case(base_asset) {
            return self.balance_sats as u128;
        }
        self.tokens
            .iter()
            .filter(|t| t.asset_id.eq_ignore_ascii_case(asset_id))
            .map(|t| t.amount)
            .sum()
    }
}

/// Options for the wallet's built-in periodic claim loop
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodicClaimOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fee: Option<u64>,
}

impl PeriodicClaimOptions {
    /// Option shapes to try, simplest first. `None` means call without arguments.
    pub fn candidates(interval_ms: u64, max_fee: u64) -> Vec<Option<PeriodicClaimOptions>> {
        let opts = |interval: Option<u64>, poll: Option<u64>, fee: Option<u64>| {
            Some(PeriodicClaimOptions {
                interval_ms: interval,
                poll_interval_ms: poll,
                max_fee: fee,
            })
        };
        vec![
            None,
            opts(None, None, None),
            opts(Some(interval_ms), None, None),
            opts(None, Some(interval_ms), None),
            opts(None, None, Some(max_fee)),
            opts(Some(interval_ms), None, Some(max_fee)),
            opts(None, Some(interval_ms), Some(max_fee)),
        ]
    }
}

/// Custody wallet surface used by the deposit pipeline
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DepositWallet: Send + Sync {
    /// Methods this backend exposes
    async fn capabilities(&self) -> Result<WalletCapabilities, WalletError>;

    /// Long-lived static deposit address
    async fn get_static_deposit_address(&self) -> Result<String, WalletError>;

    /// All static deposit addresses; falls back to the single one when unsupported
    async fn query_static_deposit_addresses(&self) -> Result<Vec<String>, WalletError>;

    /// Unused single-use deposit addresses
    async fn get_unused_deposit_addresses(&self) -> Result<Vec<String>, WalletError>;

    async fn get_identity_public_key(&self) -> Result<String, WalletError>;

    async fn get_balance(&self) -> Result<WalletBalance, WalletError>;

    /// Issue one claim call; the result payload is opaque
    async fn invoke_claim(&self, call: &ClaimCall) -> Result<serde_json::Value, WalletError>;

    /// Credit quote for a static deposit output
    async fn get_claim_static_deposit_quote(
        &self,
        txid: &str,
        vout: Option<u32>,
    ) -> Result<StaticDepositQuote, WalletError>;

    /// Start the wallet's own claim loop
    async fn start_periodic_claim(
        &self,
        options: Option<PeriodicClaimOptions>,
    ) -> Result<(), WalletError>;
}
