//! AMM Types
//!
//! Pool, quote and swap types exchanged with the AMM collaborator, plus the
//! collaborator trait itself. Amounts are integers in minor units and go
//! over the wire as decimal strings.

use async_trait::async_trait;
use serde::{Deserialize, Serialize, Serializer};
use std::time::Duration;
use thiserror::Error;

use crate::wallet::WalletBalance;

/// Base asset identifier for BTC on the AMM (`02` repeated 33 bytes)
pub const BTC_ASSET_PUBKEY: &str =
    "020202020202020202020202020202020202020202020202020202020202020202";

/// Error signatures the AMM uses for insufficient pool liquidity
const LIQUIDITY_SIGNATURES: [&str; 2] = ["fsag-4201", "insufficient liquidity"];

/// AMM errors
#[derive(Debug, Clone, Error)]
pub enum AmmError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("{0}")]
    Rejected(String),

    #[error("pool not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl AmmError {
    pub fn is_transport(&self) -> bool {
        matches!(self, AmmError::Transport(_))
    }

    /// Pool cannot fill the requested amount
    pub fn is_liquidity_insufficient(&self) -> bool {
        let msg = self.to_string().to_lowercase();
        LIQUIDITY_SIGNATURES.iter().any(|sig| msg.contains(sig))
    }

    /// Authentication was refused
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, AmmError::Unauthorized(_)) || self.to_string().contains("403")
    }
}

/// Pricing curve of a pool
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CurveType {
    ConstantProduct,
    SingleSided,
    Other(String),
}

impl CurveType {
    pub fn as_str(&self) -> &str {
        match self {
            CurveType::ConstantProduct => "CONSTANT_PRODUCT",
            CurveType::SingleSided => "SINGLE_SIDED",
            CurveType::Other(s) => s,
        }
    }
}

impl From<&str> for CurveType {
    fn from(s: &str) -> Self {
        let upper = s.to_uppercase();
        if upper.contains("SINGLE") {
            CurveType::SingleSided
        } else if upper.contains("CONSTANT") {
            CurveType::ConstantProduct
        } else {
            CurveType::Other(s.to_string())
        }
    }
}

impl Serialize for CurveType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CurveType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(CurveType::from(s.as_str()))
    }
}

/// Serialize integer amounts as decimal strings
mod amount_string {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }
}

/// Liquidity pool as reported by the AMM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolDescriptor {
    pub pool_id: String,
    pub asset_a_address: String,
    pub asset_b_address: String,
    pub curve_type: Option<CurveType>,
    /// Identifier swaps are routed to
    pub lp_public_key: String,
    #[serde(default)]
    pub host_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl PoolDescriptor {
    pub fn has_asset(&self, asset: &str) -> bool {
        self.asset_a_address.eq_ignore_ascii_case(asset) || self.asset_b_address.eq_ignore_ascii_case(asset)
    }

    /// The side that is not `base`, if `base` is on either side
    pub fn counter_asset(&self, base: &str) -> Option<&str> {
        if self.asset_a_address.eq_ignore_ascii_case(base) {
            Some(&self.asset_b_address)
        } else if self.asset_b_address.eq_ignore_ascii_case(base) {
            Some(&self.asset_a_address)
        } else {
            None
        }
    }

    pub fn is_constant_product(&self) -> bool {
        matches!(self.curve_type, Some(CurveType::ConstantProduct))
    }
}

/// Pool listing filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolFilter {
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_a_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_b_address: Option<String>,
}

impl PoolFilter {
    pub fn limit(limit: u32) -> Self {
        Self {
            limit,
            asset_a_address: None,
            asset_b_address: None,
        }
    }

    pub fn asset_a(limit: u32, address: &str) -> Self {
        Self {
            asset_a_address: Some(address.to_string()),
            ..Self::limit(limit)
        }
    }

    pub fn asset_b(limit: u32, address: &str) -> Self {
        Self {
            asset_b_address: Some(address.to_string()),
            ..Self::limit(limit)
        }
    }
}

/// Selected pool and counter-asset for a base-asset swap
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteCandidate {
    pub pool_id: String,
    pub asset_out_address: String,
    pub curve_type: Option<CurveType>,
}

/// Simulation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateRequest {
    pub pool_id: String,
    pub asset_in_address: String,
    pub asset_out_address: String,
    #[serde(serialize_with = "amount_string::serialize")]
    pub amount_in: u128,
}

/// Simulated swap output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapQuote {
    #[serde(serialize_with = "amount_string::serialize")]
    pub amount_out: u128,
}

/// Signed execution request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapIntent {
    pub pool_id: String,
    pub asset_in_address: String,
    pub asset_out_address: String,
    #[serde(serialize_with = "amount_string::serialize")]
    pub amount_in: u128,
    #[serde(serialize_with = "amount_string::serialize")]
    pub min_amount_out: u128,
    pub max_slippage_bps: u32,
}

/// Execution acknowledgement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapReceipt {
    pub request_id: String,
    pub accepted: bool,
}

/// Swap settings
#[derive(Debug, Clone)]
pub struct SwapConfig {
    /// Asset swapped from
    pub base_asset: String,
    /// Default slippage for constant-product pools
    pub slippage_cp_bps: u32,
    /// Default slippage for single-sided pools
    pub slippage_single_bps: u32,
    /// Wall-clock limit for the wait-then-execute loop
    pub max_duration: Duration,
    pub retry_interval: Duration,
    pub skip_balance_check: bool,
    pub dry_execute: bool,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            base_asset: BTC_ASSET_PUBKEY.to_string(),
            slippage_cp_bps: 300,
            slippage_single_bps: 700,
            max_duration: Duration::from_secs(120),
            retry_interval: Duration::from_secs(2),
            skip_balance_check: false,
            dry_execute: false,
        }
    }
}

/// AMM collaborator surface
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AmmClient: Send + Sync {
    /// Obtain or refresh the session
    async fn authenticate(&self) -> Result<(), AmmError>;

    async fn list_pools(&self, filter: &PoolFilter) -> Result<Vec<PoolDescriptor>, AmmError>;

    async fn get_pool(&self, pool_id: &str) -> Result<PoolDescriptor, AmmError>;

    async fn simulate_swap(&self, request: &SimulateRequest) -> Result<SwapQuote, AmmError>;

    /// Submit a swap; never retried by callers
    async fn execute_swap(&self, intent: &SwapIntent) -> Result<SwapReceipt, AmmError>;

    async fn get_balance(&self) -> Result<WalletBalance, AmmError>;
}
