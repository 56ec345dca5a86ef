//! Claim call model
//!
//! Typed description of one claim request sent to the wallet: which claim
//! method, and which argument shape. The wallet backend maps each
//! `ClaimCall` to its own positional parameters.

use serde::Serialize;
use serde_json::{json, Map, Value};

/// Claim-shaped wallet methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ClaimMethod {
    #[serde(rename = "claimDeposit")]
    ClaimDeposit,
    #[serde(rename = "claimStaticDeposit")]
    ClaimStaticDeposit,
    #[serde(rename = "claimTaprootDeposit")]
    ClaimTaprootDeposit,
    #[serde(rename = "claimStaticDepositWithMaxFee")]
    ClaimStaticDepositWithMaxFee,
    #[serde(rename = "claimTaprootDepositWithMaxFee")]
    ClaimTaprootDepositWithMaxFee,
}

impl ClaimMethod {
    /// Method name as exposed by the wallet
    pub fn wire_name(&self) -> &'static str {
        match self {
            ClaimMethod::ClaimDeposit => "claimDeposit",
            ClaimMethod::ClaimStaticDeposit => "claimStaticDeposit",
            ClaimMethod::ClaimTaprootDeposit => "claimTaprootDeposit",
            ClaimMethod::ClaimStaticDepositWithMaxFee => "claimStaticDepositWithMaxFee",
            ClaimMethod::ClaimTaprootDepositWithMaxFee => "claimTaprootDepositWithMaxFee",
        }
    }
}

impl std::fmt::Display for ClaimMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// How a deposit transaction is referenced
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClaimRef {
    /// Full raw transaction hex
    TxHex(String),
    /// Transaction id
    TransactionId(String),
}

impl ClaimRef {
    pub fn as_str(&self) -> &str {
        match self {
            ClaimRef::TxHex(hex) => hex,
            ClaimRef::TransactionId(txid) => txid,
        }
    }

    fn field_name(&self) -> &'static str {
        match self {
            ClaimRef::TxHex(_) => "txHex",
            ClaimRef::TransactionId(_) => "transactionId",
        }
    }
}

/// Credit quote for a static deposit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticDepositQuote {
    pub transaction_id: String,
    pub output_index: u32,
    pub credit_amount_sats: u64,
    pub signature: String,
}

/// Argument shape of a claim call
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClaimArgs {
    /// `(reference)`
    Reference(ClaimRef),
    /// `(reference, maxFee)`
    ReferenceWithFee(ClaimRef, u64),
    /// `({ txHex | transactionId, maxFee?, outputIndex? })`
    Request {
        reference: ClaimRef,
        max_fee: Option<u64>,
        output_index: Option<u32>,
    },
    /// `({ transactionId, creditAmountSats, sspSignature, outputIndex })`
    Quoted(StaticDepositQuote),
}

impl ClaimArgs {
    pub fn is_structured(&self) -> bool {
        matches!(self, ClaimArgs::Request { .. } | ClaimArgs::Quoted(_))
    }

    pub fn has_fee(&self) -> bool {
        match self {
            ClaimArgs::ReferenceWithFee(..) => true,
            ClaimArgs::Request { max_fee, .. } => max_fee.is_some(),
            _ => false,
        }
    }

    /// Positional JSON parameters
    pub fn to_params(&self) -> Vec<Value> {
        match self {
            ClaimArgs::Reference(r) => vec![json!(r.as_str())],
            ClaimArgs::ReferenceWithFee(r, fee) => vec![json!(r.as_str()), json!(fee)],
            ClaimArgs::Request {
                reference,
                max_fee,
                output_index,
            } => {
                let mut obj = Map::new();
                obj.insert(reference.field_name().into(), json!(reference.as_str()));
                if let Some(fee) = max_fee {
                    obj.insert("maxFee".into(), json!(fee));
                }
                if let Some(index) = output_index {
                    obj.insert("outputIndex".into(), json!(index));
                }
                vec![Value::Object(obj)]
            }
            ClaimArgs::Quoted(quote) => vec![json!({
                "transactionId": quote.transaction_id,
                "creditAmountSats": quote.credit_amount_sats,
                "sspSignature": quote.signature,
                "outputIndex": quote.output_index,
            })],
        }
    }
}

/// One claim request: method plus argument shape
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClaimCall {
    pub method: ClaimMethod,
    pub args: ClaimArgs,
}

impl ClaimCall {
    pub fn new(method: ClaimMethod, args: ClaimArgs) -> Self {
        Self { method, args }
    }

    /// Short description for logs, without the raw hex body
    pub fn describe(&self) -> String {
        let reference = match &self.args {
            ClaimArgs::Reference(r) | ClaimArgs::ReferenceWithFee(r, _) => r,
            ClaimArgs::Request { reference, .. } => reference,
            ClaimArgs::Quoted(_) => return format!("{}(quote)", self.method),
        };
        let kind = match reference {
            ClaimRef::TxHex(_) => "hex",
            ClaimRef::TransactionId(_) => "txid",
        };
        let shape = if self.args.is_structured() { "{}" } else { "" };
        let fee = if self.args.has_fee() { "+fee" } else { "" };
        format!("{}({}{}{})", self.method, shape, kind, fee)
    }
}
