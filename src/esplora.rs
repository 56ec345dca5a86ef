//! Esplora Chain Data Client
//!
//! Normalizes block-explorer responses (mempool.space, blockstream, electrs)
//! behind a single client that walks an ordered endpoint list. Individual
//! transport or parse failures fall through to the next endpoint; when every
//! endpoint fails the caller gets an "unavailable" value (empty list, zero
//! confirmations, `None`) and is expected to retry on its next poll.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Raw transaction bodies at or below this length are treated as error pages
pub const MIN_RAW_TX_HEX_LEN: usize = 100;

/// One explorer backend
#[derive(Clone)]
pub struct Endpoint {
    pub base_url: String,
    pub basic_auth: Option<(String, String)>,
}

impl Endpoint {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            basic_auth: None,
        }
    }

    pub fn with_basic_auth(mut self, credentials: Option<(String, String)>) -> Self {
        self.basic_auth = credentials;
        self
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("base_url", &self.base_url)
            .field("basic_auth", &self.basic_auth.as_ref().map(|(user, _)| user))
            .finish()
    }
}

/// Unspent transaction output, identity = (txid, vout)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Utxo {
    pub txid: String,
    pub vout: u32,
    #[serde(rename = "value")]
    pub value_sats: u64,
}

/// Transaction from an address history listing
#[derive(Debug, Clone, PartialEq)]
pub struct AddressTx {
    pub txid: String,
    pub outputs: Vec<TxOutput>,
}

/// Output of an [`AddressTx`], indexed by position
#[derive(Debug, Clone, PartialEq)]
pub struct TxOutput {
    pub address: Option<String>,
    pub value_sats: u64,
}

/// Explorer errors. Never leave this module except through logs.
#[derive(Debug, thiserror::Error)]
pub enum EsploraError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Read side of the chain, as the deposit scanner consumes it
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainSource: Send + Sync {
    /// UTXOs for an address; empty when none or unavailable
    async fn list_utxos(&self, address: &str) -> Vec<Utxo>;

    /// Address transaction history; empty when unavailable
    async fn list_address_txs(&self, address: &str) -> Vec<AddressTx>;

    /// Spent flags aligned by output index; `None` when no endpoint answered.
    /// An entry is `None` when the provider did not report a boolean `spent`.
    async fn get_outspends(&self, txid: &str) -> Option<Vec<Option<bool>>>;

    /// Confirmation depth; 0 when unconfirmed or unavailable
    async fn get_confirmations(&self, txid: &str) -> u32;

    /// Raw transaction hex; `None` when unavailable
    async fn get_tx_hex(&self, txid: &str) -> Option<String>;
}

/// Multi-endpoint explorer client
#[derive(Debug, Clone)]
pub struct ChainDataClient {
    client: Client,
    endpoints: Vec<Endpoint>,
}

impl ChainDataClient {
    /// Create a client over an ordered endpoint list
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self {
            client: Client::new(),
            endpoints,
        }
    }

    /// Create a client from bare URLs
    pub fn from_urls(urls: &[&str]) -> Self {
        Self::new(urls.iter().map(|u| Endpoint::new(u)).collect())
    }

    /// Configured endpoints in failover order
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    fn request(&self, endpoint: &Endpoint, path: &str) -> RequestBuilder {
        let url = format!("{}{}", endpoint.base_url, path);
        let req = self.client.get(url);
        match &endpoint.basic_auth {
            Some((user, pass)) => req.basic_auth(user, Some(pass)),
            None => req,
        }
    }

    async fn fetch_json(&self, endpoint: &Endpoint, path: &str) -> Result<Value, EsploraError> {
        let resp = self
            .request(endpoint, path)
            .header("accept", "application/json")
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(EsploraError::Status {
                url: format!("{}{}", endpoint.base_url, path),
                status: resp.status().as_u16(),
            });
        }

        Ok(resp.json::<Value>().await?)
    }

    async fn fetch_text(&self, endpoint: &Endpoint, path: &str) -> Result<String, EsploraError> {
        let resp = self
            .request(endpoint, path)
            .header("accept", "text/plain")
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(EsploraError::Status {
                url: format!("{}{}", endpoint.base_url, path),
                status: resp.status().as_u16(),
            });
        }

        Ok(resp.text().await?.trim().to_string())
    }

    async fn fetch_array(&self, endpoint: &Endpoint, path: &str) -> Result<Vec<Value>, EsploraError> {
        match self.fetch_json(endpoint, path).await? {
            Value::Array(items) => Ok(items),
            other => Err(EsploraError::Malformed(format!(
                "{} expected array, got {}",
                path,
                json_kind(&other)
            ))),
        }
    }

    /// Current chain tip height
    pub async fn get_tip_height(&self) -> Option<u64> {
        for endpoint in &self.endpoints {
            match self.fetch_text(endpoint, "/blocks/tip/height").await {
                Ok(text) => match text.parse::<u64>() {
                    Ok(height) => return Some(height),
                    Err(_) => skip(endpoint, "/blocks/tip/height", &EsploraError::Malformed(text)),
                },
                Err(e) => skip(endpoint, "/blocks/tip/height", &e),
            }
        }
        exhausted("/blocks/tip/height");
        None
    }

    /// Confirmations computed against a single endpoint
    async fn confirmations_from(&self, endpoint: &Endpoint, txid: &str) -> Result<u32, EsploraError> {
        let status_path = format!("/tx/{}/status", txid);
        let status = self.fetch_json(endpoint, &status_path).await?;
        if !status.is_object() {
            return Err(EsploraError::Malformed(format!("{} is not an object", status_path)));
        }

        let confirmed = status.get("confirmed").and_then(Value::as_bool).unwrap_or(false);
        if !confirmed {
            return Ok(0);
        }
        let block_height = status.get("block_height").and_then(Value::as_f64);

        let tip_text = self.fetch_text(endpoint, "/blocks/tip/height").await?;
        let tip_height = tip_text.parse::<f64>().ok();

        Ok(compute_confirmations(confirmed, block_height, tip_height))
    }

    async fn raw_hex_from(&self, endpoint: &Endpoint, txid: &str) -> Option<String> {
        for path in raw_tx_paths(txid) {
            match self.fetch_text(endpoint, &path).await {
                Ok(text) if is_plausible_raw_tx(&text) => return Some(text),
                Ok(_) => skip(endpoint, &path, &EsploraError::Malformed("not raw tx hex".into())),
                Err(e) => skip(endpoint, &path, &e),
            }
        }

        // Some explorers only embed the hex in the JSON transaction body
        let path = format!("/tx/{}", txid);
        match self.fetch_json(endpoint, &path).await {
            Ok(body) => {
                let hex = ["hex", "raw", "txHex"]
                    .iter()
                    .find_map(|key| body.get(*key).and_then(Value::as_str))
                    .map(|s| s.trim().to_string());
                match hex {
                    Some(hex) if is_plausible_raw_tx(&hex) => return Some(hex),
                    _ => skip(endpoint, &path, &EsploraError::Malformed("no hex field".into())),
                }
            }
            Err(e) => skip(endpoint, &path, &e),
        }

        None
    }
}

#[async_trait]
impl ChainSource for ChainDataClient {
    async fn list_utxos(&self, address: &str) -> Vec<Utxo> {
        let path = format!("/address/{}/utxo", address);
        for endpoint in &self.endpoints {
            match self.fetch_array(endpoint, &path).await {
                Ok(items) => {
                    let utxos: Vec<Utxo> = items.iter().filter_map(parse_utxo).collect();
                    if utxos.len() < items.len() {
                        debug!(
                            endpoint = %endpoint.base_url,
                            dropped = items.len() - utxos.len(),
                            "dropped malformed utxo entries"
                        );
                    }
                    return utxos;
                }
                Err(e) => skip(endpoint, &path, &e),
            }
        }
        exhausted(&path);
        Vec::new()
    }

    async fn list_address_txs(&self, address: &str) -> Vec<AddressTx> {
        let path = format!("/address/{}/txs", address);
        for endpoint in &self.endpoints {
            match self.fetch_array(endpoint, &path).await {
                Ok(items) => return items.iter().filter_map(parse_address_tx).collect(),
                Err(e) => skip(endpoint, &path, &e),
            }
        }
        exhausted(&path);
        Vec::new()
    }

    async fn get_outspends(&self, txid: &str) -> Option<Vec<Option<bool>>> {
        let path = format!("/tx/{}/outspends", txid);
        for endpoint in &self.endpoints {
            match self.fetch_array(endpoint, &path).await {
                Ok(items) => {
                    return Some(
                        items
                            .iter()
                            .map(|o| o.get("spent").and_then(Value::as_bool))
                            .collect(),
                    )
                }
                Err(e) => skip(endpoint, &path, &e),
            }
        }
        exhausted(&path);
        None
    }

    async fn get_confirmations(&self, txid: &str) -> u32 {
        for endpoint in &self.endpoints {
            match self.confirmations_from(endpoint, txid).await {
                Ok(confirmations) => return confirmations,
                Err(e) => skip(endpoint, "/tx/{txid}/status", &e),
            }
        }
        exhausted(&format!("/tx/{}/status", txid));
        0
    }

    async fn get_tx_hex(&self, txid: &str) -> Option<String> {
        for endpoint in &self.endpoints {
            if let Some(hex) = self.raw_hex_from(endpoint, txid).await {
                return Some(hex);
            }
        }
        exhausted(&format!("/tx/{}/hex", txid));
        None
    }
}

/// Confirmation depth from a tx status and the chain tip.
///
/// `max(0, tip - block_height + 1)` when confirmed and both heights are
/// finite positive numbers, otherwise 0.
pub fn compute_confirmations(confirmed: bool, block_height: Option<f64>, tip_height: Option<f64>) -> u32 {
    if !confirmed {
        return 0;
    }
    match (block_height, tip_height) {
        (Some(bh), Some(tip)) if bh.is_finite() && tip.is_finite() && bh > 0.0 && tip > 0.0 => {
            let depth = tip as i64 - bh as i64 + 1;
            depth.clamp(0, u32::MAX as i64) as u32
        }
        _ => 0,
    }
}

/// Strict hex check guarding against HTML error pages read as raw tx bodies
pub fn is_plausible_raw_tx(text: &str) -> bool {
    text.len() > MIN_RAW_TX_HEX_LEN && text.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Path conventions for raw transaction hex, in preference order
fn raw_tx_paths(txid: &str) -> [String; 4] {
    [
        format!("/tx/{}/hex", txid),
        format!("/tx/{}/raw", txid),
        format!("/rawtx/{}", txid),
        format!("/raw/tx/{}", txid),
    ]
}

fn parse_utxo(item: &Value) -> Option<Utxo> {
    let txid = item.get("txid")?.as_str()?.trim();
    if txid.is_empty() {
        return None;
    }
    let vout = u32::try_from(item.get("vout")?.as_u64()?).ok()?;
    Some(Utxo {
        txid: txid.to_string(),
        vout,
        value_sats: sats(item.get("value")),
    })
}

fn parse_address_tx(item: &Value) -> Option<AddressTx> {
    let txid = item
        .get("txid")
        .or_else(|| item.get("hash"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())?;

    let outputs = item
        .get("vout")
        .or_else(|| item.get("outputs"))
        .and_then(Value::as_array)
        .map(|outs| {
            outs.iter()
                .map(|out| TxOutput {
                    address: out
                        .get("scriptpubkey_address")
                        .or_else(|| out.get("address"))
                        .or_else(|| out.get("scriptPubKey").and_then(|s| s.get("address")))
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    value_sats: sats(out.get("value").or_else(|| out.get("sats"))),
                })
                .collect()
        })
        .unwrap_or_default();

    Some(AddressTx {
        txid: txid.to_string(),
        outputs,
    })
}

/// Non-negative satoshi amount from a JSON number; anything else is 0
fn sats(value: Option<&Value>) -> u64 {
    match value {
        Some(v) => v
            .as_u64()
            .or_else(|| v.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        None => 0,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn skip(endpoint: &Endpoint, path: &str, error: &EsploraError) {
    debug!(endpoint = %endpoint.base_url, path, error = %error, "explorer request failed, trying next");
}

fn exhausted(path: &str) {
    warn!(path, "all explorer endpoints failed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_confirmations_formula() {
        assert_eq!(compute_confirmations(true, Some(100.0), Some(100.0)), 1);
        assert_eq!(compute_confirmations(true, Some(100.0), Some(102.0)), 3);
        assert_eq!(compute_confirmations(true, Some(105.0), Some(100.0)), 0);
        assert_eq!(compute_confirmations(true, Some(101.0), Some(100.0)), 0);
    }

    #[test]
    fn test_confirmations_require_valid_heights() {
        assert_eq!(compute_confirmations(false, Some(100.0), Some(200.0)), 0);
        assert_eq!(compute_confirmations(true, None, Some(200.0)), 0);
        assert_eq!(compute_confirmations(true, Some(0.0), Some(200.0)), 0);
        assert_eq!(compute_confirmations(true, Some(100.0), None), 0);
        assert_eq!(compute_confirmations(true, Some(f64::NAN), Some(200.0)), 0);
        assert_eq!(compute_confirmations(true, Some(100.0), Some(f64::INFINITY)), 0);
    }

    #[test]
    fn test_confirmations_over_height_range() {
        for bh in 1..50u32 {
            for tip in 1..50u32 {
                let expected = (tip as i64 - bh as i64 + 1).max(0) as u32;
                assert_eq!(
                    compute_confirmations(true, Some(bh as f64), Some(tip as f64)),
                    expected
                );
            }
        }
    }

    #[test]
    fn test_raw_tx_plausibility() {
        let tx = "02000000".repeat(20);
        assert!(is_plausible_raw_tx(&tx));
        assert!(!is_plausible_raw_tx(&"ab".repeat(50)));
        assert!(!is_plausible_raw_tx(&format!("<html>{}</html>", "a".repeat(200))));
        assert!(!is_plausible_raw_tx(""));
    }

    #[test]
    fn test_parse_utxo_drops_malformed() {
        let items = vec![
            json!({"txid": "aa", "vout": 0, "value": 50000}),
            json!({"txid": "", "vout": 0, "value": 1}),
            json!({"txid": "bb", "vout": -1, "value": 1}),
            json!({"txid": "cc", "value": 1}),
            json!({"txid": "dd", "vout": 2}),
            json!("garbage"),
        ];
        let utxos: Vec<Utxo> = items.iter().filter_map(parse_utxo).collect();
        assert_eq!(
            utxos,
            vec![
                Utxo { txid: "aa".into(), vout: 0, value_sats: 50_000 },
                Utxo { txid: "dd".into(), vout: 2, value_sats: 0 },
            ]
        );
    }

    #[test]
    fn test_parse_address_tx_aliases() {
        let tx = parse_address_tx(&json!({
            "hash": "ff",
            "outputs": [
                {"address": "bc1qa", "sats": 10},
                {"scriptPubKey": {"address": "bc1qb"}, "value": 20},
                {"scriptpubkey_address": "bc1qc", "value": 30},
                {"value": 40}
            ]
        }))
        .unwrap();

        assert_eq!(tx.txid, "ff");
        let addrs: Vec<Option<&str>> = tx.outputs.iter().map(|o| o.address.as_deref()).collect();
        assert_eq!(addrs, vec![Some("bc1qa"), Some("bc1qb"), Some("bc1qc"), None]);
        assert_eq!(tx.outputs[0].value_sats, 10);
        assert_eq!(tx.outputs[3].value_sats, 40);

        assert!(parse_address_tx(&json!({"vout": []})).is_none());
    }

    #[test]
    fn test_endpoint_debug_hides_password() {
        let ep = Endpoint::new("https://electrs.local/")
            .with_basic_auth(Some(("user".into(), "hunter2".into())));
        assert_eq!(ep.base_url, "https://electrs.local");
        let dbg = format!("{:?}", ep);
        assert!(dbg.contains("user"));
        assert!(!dbg.contains("hunter2"));
    }
}
