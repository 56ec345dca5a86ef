//! Wallet/AMM bridge client
//!
//! The wallet SDK and the AMM client run in a separate host process that
//! exposes them over JSON-RPC 2.0. This module speaks that protocol and
//! implements [`DepositWallet`] and [`AmmClient`] on top of it, normalizing
//! the loosely-typed payloads the host returns.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::amm::types::{
    AmmClient, AmmError, CurveType, PoolDescriptor, PoolFilter, SimulateRequest, SwapIntent, SwapQuote,
    SwapReceipt,
};
use crate::wallet::{
    ClaimCall, DepositWallet, PeriodicClaimOptions, StaticDepositQuote, TokenBalance, WalletBalance,
    WalletCapabilities, WalletError,
};

/// JSON-RPC "method not found"
const METHOD_NOT_FOUND: i64 = -32601;

/// Bridge transport and protocol errors
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("bridge request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("bridge rejected credentials ({0})")]
    Unauthorized(u16),

    #[error("bridge returned status {0}")]
    Status(u16),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<BridgeError> for WalletError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Http(e) => WalletError::Transport(e.to_string()),
            BridgeError::Status(s) => WalletError::Transport(format!("status {}", s)),
            BridgeError::Unauthorized(s) => WalletError::Unauthorized(s.to_string()),
            BridgeError::MethodNotFound(m) => WalletError::MethodUnavailable(m),
            BridgeError::Rpc { message, .. } => WalletError::Rejected(message),
            BridgeError::Malformed(m) => WalletError::InvalidResponse(m),
        }
    }
}

impl From<BridgeError> for AmmError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Http(e) => AmmError::Transport(e.to_string()),
            BridgeError::Status(s) => AmmError::Transport(format!("status {}", s)),
            BridgeError::Unauthorized(s) => AmmError::Unauthorized(s.to_string()),
            BridgeError::MethodNotFound(m) => AmmError::NotFound(m),
            BridgeError::Rpc { message, .. } => AmmError::Rejected(message),
            BridgeError::Malformed(m) => AmmError::InvalidResponse(m),
        }
    }
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// JSON-RPC client for the SDK host
pub struct BridgeClient {
    client: Client,
    url: String,
    token: String,
    next_id: AtomicU64,
}

impl BridgeClient {
    pub fn new(url: &str, token: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Single JSON-RPC call
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, BridgeError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(method, id, "bridge call");

        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&RpcRequest {
                jsonrpc: "2.0",
                id,
                method,
                params,
            })
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BridgeError::Unauthorized(status.as_u16()));
        }
        if !status.is_success() {
            return Err(BridgeError::Status(status.as_u16()));
        }

        let body: RpcResponse = resp.json().await?;
        match (body.result, body.error) {
            (_, Some(err)) if err.code == METHOD_NOT_FOUND => Err(BridgeError::MethodNotFound(method.to_string())),
            (_, Some(err)) => Err(BridgeError::Rpc {
                code: err.code,
                message: err.message,
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Ok(Value::Null),
        }
    }
}

// ============================================================================
// Payload normalization
// ============================================================================

/// Amount from a JSON number or decimal string
pub fn parse_amount(value: &Value) -> Option<u128> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u128)),
        Value::String(s) => s.trim().trim_end_matches('n').parse().ok(),
        _ => None,
    }
}

fn first_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| value.get(*k))
}

fn token_entry(asset_id: Option<&str>, entry: &Value) -> Option<TokenBalance> {
    let asset_id = asset_id
        .map(str::to_string)
        .or_else(|| {
            first_field(entry, &["tokenIdentifier", "tokenPublicKey", "assetId", "id"])
                .and_then(Value::as_str)
                .map(str::to_string)
        })?;

    let amount = match entry {
        Value::Object(_) => first_field(entry, &["balance", "amount", "ownedBalance"]).and_then(parse_amount)?,
        other => parse_amount(other)?,
    };

    let decimals = first_field(entry, &["decimals"])
        .or_else(|| entry.get("tokenMetadata").and_then(|m| m.get("decimals")))
        .and_then(Value::as_u64)
        .and_then(|d| u8::try_from(d).ok());

    Some(TokenBalance {
        asset_id,
        amount,
        decimals,
    })
}

/// Normalize a balance payload.
///
/// Token balances arrive either as a map keyed by asset id or as an array
/// of entries; amounts may be numbers or strings.
pub fn normalize_balance(payload: &Value) -> Result<WalletBalance, String> {
    let balance_sats = match payload {
        Value::Object(_) => first_field(payload, &["balance", "balanceSats", "sats"]).and_then(parse_amount),
        other => parse_amount(other),
    }
    .ok_or_else(|| "balance missing".to_string())?;
    let balance_sats = u64::try_from(balance_sats).map_err(|_| "balance out of range".to_string())?;

    let tokens = match first_field(payload, &["tokenBalances", "tokens"]) {
        Some(Value::Object(map)) => map.iter().filter_map(|(id, entry)| token_entry(Some(id.as_str()), entry)).collect(),
        Some(Value::Array(items)) => items.iter().filter_map(|entry| token_entry(None, entry)).collect(),
        _ => Vec::new(),
    };

    Ok(WalletBalance { balance_sats, tokens })
}

/// Pool entry; the routing key is the LP public key when present
pub fn parse_pool(value: &Value) -> Option<PoolDescriptor> {
    let str_field = |keys: &[&str]| first_field(value, keys).and_then(Value::as_str).map(str::to_string);

    let lp_public_key = str_field(&["lpPublicKey", "poolId", "id"])?;
    Some(PoolDescriptor {
        pool_id: str_field(&["poolId", "id"]).unwrap_or_else(|| lp_public_key.clone()),
        asset_a_address: str_field(&["assetAAddress", "assetA"])?,
        asset_b_address: str_field(&["assetBAddress", "assetB"])?,
        curve_type: str_field(&["curveType"]).map(|c| CurveType::from(c.as_str())),
        lp_public_key,
        host_name: str_field(&["hostName", "host"]),
        created_at: str_field(&["createdAt"]),
    })
}

fn parse_pools(result: &Value) -> Result<Vec<PoolDescriptor>, BridgeError> {
    let items = match result {
        Value::Array(items) => items,
        other => match other.get("pools") {
            Some(Value::Array(items)) => items,
            _ => return Err(BridgeError::Malformed("pool listing is not an array".into())),
        },
    };
    Ok(items.iter().filter_map(parse_pool).collect())
}

fn parse_strings(result: &Value) -> Vec<String> {
    match result {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                other => other.get("address").and_then(Value::as_str).map(str::to_string),
            })
            .collect(),
        Value::String(s) => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn parse_quote(result: &Value) -> Option<StaticDepositQuote> {
    Some(StaticDepositQuote {
        transaction_id: first_field(result, &["transactionId", "txid"])?.as_str()?.to_string(),
        output_index: u32::try_from(first_field(result, &["outputIndex", "vout"])?.as_u64()?).ok()?,
        credit_amount_sats: u64::try_from(parse_amount(first_field(result, &["creditAmountSats", "credit"])?)?).ok()?,
        signature: first_field(result, &["signature", "sspSignature"])?.as_str()?.to_string(),
    })
}

/// Execution result; a request id is mandatory and `accepted` is passed through as reported
fn parse_receipt(result: &Value) -> Result<SwapReceipt, AmmError> {
    let request_id = first_field(result, &["requestId", "id", "outboundTransferId"])
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AmmError::InvalidResponse("swap result has no requestId".into()))?;
    let accepted = match result.get("accepted") {
        None => true,
        Some(flag) => flag
            .as_bool()
            .ok_or_else(|| AmmError::InvalidResponse(format!("accepted is not a boolean: {}", flag)))?,
    };
    Ok(SwapReceipt {
        request_id: request_id.to_string(),
        accepted,
    })
}

// ============================================================================
// Collaborator implementations
// ============================================================================

#[async_trait]
impl DepositWallet for BridgeClient {
    async fn capabilities(&self) -> Result<WalletCapabilities, WalletError> {
        let result = match self.call("capabilities", json!([])).await {
            Err(BridgeError::MethodNotFound(_)) => self.call("methods", json!([])).await?,
            other => other?,
        };
        let names = match &result {
            Value::Object(_) => result.get("methods").map(parse_strings).unwrap_or_default(),
            other => parse_strings(other),
        };
        Ok(WalletCapabilities::from_methods(names))
    }

    async fn get_static_deposit_address(&self) -> Result<String, WalletError> {
        let result = self.call("getStaticDepositAddress", json!([])).await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| WalletError::InvalidResponse("static deposit address is not a string".into()))
    }

    async fn query_static_deposit_addresses(&self) -> Result<Vec<String>, WalletError> {
        let result = self.call("queryStaticDepositAddresses", json!([])).await?;
        Ok(parse_strings(&result))
    }

    async fn get_unused_deposit_addresses(&self) -> Result<Vec<String>, WalletError> {
        let result = self.call("getUnusedDepositAddresses", json!([])).await?;
        Ok(parse_strings(&result))
    }

    async fn get_identity_public_key(&self) -> Result<String, WalletError> {
        let result = self.call("getIdentityPublicKey", json!([])).await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| WalletError::InvalidResponse("identity key is not a string".into()))
    }

    async fn get_balance(&self) -> Result<WalletBalance, WalletError> {
        let result = self.call("getBalance", json!([])).await?;
        normalize_balance(&result).map_err(WalletError::InvalidResponse)
    }

    async fn invoke_claim(&self, call: &ClaimCall) -> Result<Value, WalletError> {
        let params = Value::Array(call.args.to_params());
        Ok(self.call(call.method.wire_name(), params).await?)
    }

    async fn get_claim_static_deposit_quote(
        &self,
        txid: &str,
        vout: Option<u32>,
    ) -> Result<StaticDepositQuote, WalletError> {
        let params = match vout {
            Some(vout) => json!([txid, vout]),
            None => json!([txid]),
        };
        let result = self.call("getClaimStaticDepositQuote", params).await?;
        parse_quote(&result).ok_or_else(|| WalletError::InvalidResponse("quote is missing fields".into()))
    }

    async fn start_periodic_claim(&self, options: Option<PeriodicClaimOptions>) -> Result<(), WalletError> {
        let params = match options {
            Some(options) => json!([options]),
            None => json!([]),
        };
        self.call("startPeriodicClaimTransfers", params).await?;
        Ok(())
    }
}

#[async_trait]
impl AmmClient for BridgeClient {
    async fn authenticate(&self) -> Result<(), AmmError> {
        self.call("amm.authenticate", json!([])).await?;
        Ok(())
    }

    async fn list_pools(&self, filter: &PoolFilter) -> Result<Vec<PoolDescriptor>, AmmError> {
        let result = self.call("amm.listPools", json!([filter])).await?;
        Ok(parse_pools(&result)?)
    }

    async fn get_pool(&self, pool_id: &str) -> Result<PoolDescriptor, AmmError> {
        let result = self.call("amm.getPool", json!([pool_id])).await?;
        let pool = result.get("pool").unwrap_or(&result);
        parse_pool(pool).ok_or_else(|| AmmError::NotFound(pool_id.to_string()))
    }

    async fn simulate_swap(&self, request: &SimulateRequest) -> Result<SwapQuote, AmmError> {
        let result = self.call("amm.simulateSwap", json!([request])).await?;
        let amount_out = first_field(&result, &["amountOut", "outputAmount"])
            .and_then(parse_amount)
            .ok_or_else(|| AmmError::InvalidResponse("simulation has no amountOut".into()))?;
        Ok(SwapQuote { amount_out })
    }

    async fn execute_swap(&self, intent: &SwapIntent) -> Result<SwapReceipt, AmmError> {
        let result = self.call("amm.executeSwap", json!([intent])).await?;
        parse_receipt(&result)
    }

    async fn get_balance(&self) -> Result<WalletBalance, AmmError> {
        let result = self.call("getBalance", json!([])).await?;
        normalize_balance(&result).map_err(AmmError::InvalidResponse)
    }
}
