//! Deposit Tracker Types
//!
//! Watched addresses, deposit candidates and the reports the pipeline
//! produces. Candidates move through:
//! scanning → waiting_confirmations → mature → claiming → claimed | claim_failed

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::common::config::ConfigError;
use crate::esplora::Utxo;

/// Raw-hex claim inputs must be at least this many hex characters
pub const MIN_RAW_TX_INPUT_LEN: usize = 200;

/// Kind of deposit address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressKind {
    /// Long-lived address, claimed with a quote
    Static,
    /// Single-use address, claimed directly
    Active,
}

impl std::fmt::Display for AddressKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static => write!(f, "static"),
            Self::Active => write!(f, "active"),
        }
    }
}

/// Address owned by the wallet and watched for incoming funds
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct WatchedAddress {
    pub kind: AddressKind,
    pub address: String,
}

impl WatchedAddress {
    pub fn new(kind: AddressKind, address: impl Into<String>) -> Self {
        Self {
            kind,
            address: address.into(),
        }
    }
}

/// How to treat a history output whose spend status no explorer could report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownOutspendPolicy {
    /// Treat as spent; may hide a real deposit until an explorer answers
    #[default]
    Exclude,
    /// Treat as unspent; may surface an already-spent output
    Include,
}

impl FromStr for UnknownOutspendPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exclude" => Ok(Self::Exclude),
            "include" => Ok(Self::Include),
            other => Err(ConfigError::InvalidValue(
                "UNKNOWN_OUTSPEND_POLICY".to_string(),
                format!("unknown policy '{}'", other),
            )),
        }
    }
}

/// How matured deposits are claimed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClaimStrategy {
    /// Walk the ordered claim call list
    #[default]
    Probe,
    /// Quote then claim for static deposits, probe for the rest
    Quote,
}

impl FromStr for ClaimStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "probe" => Ok(Self::Probe),
            "quote" => Ok(Self::Quote),
            other => Err(ConfigError::InvalidValue(
                "CLAIM_STRATEGY".to_string(),
                format!("unknown strategy '{}'", other),
            )),
        }
    }
}

/// Tracker configuration
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Confirmations before a deposit is claimed
    pub required_confirmations: u32,
    /// Fee budget passed to fee-qualified claim calls
    pub max_fee_sats: u64,
    /// Poll interval while waiting for confirmations
    pub confirmation_poll_interval: Duration,
    /// Sleep between scans
    pub scan_interval: Duration,
    /// Also watch unused single-use addresses
    pub scan_active_addresses: bool,
    pub unknown_outspend: UnknownOutspendPolicy,
    pub strategy: ClaimStrategy,
    /// Label prefixed to watcher logs
    pub watcher_name: Option<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            required_confirmations: 3,
            max_fee_sats: 2_000,
            confirmation_poll_interval: Duration::from_secs(10),
            scan_interval: Duration::from_secs(5),
            scan_active_addresses: false,
            unknown_outspend: UnknownOutspendPolicy::Exclude,
            strategy: ClaimStrategy::Probe,
            watcher_name: None,
        }
    }
}

/// UTXO with its confirmation depth against a threshold
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmedUtxo {
    #[serde(flatten)]
    pub utxo: Utxo,
    pub confirmations: u32,
    #[serde(rename = "required")]
    pub required_confirmations: u32,
}

impl ConfirmedUtxo {
    pub fn mature(&self) -> bool {
        super::scanner::is_mature(self.confirmations, self.required_confirmations)
    }
}

/// Output paying a watched address, as found by one scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepositCandidate {
    pub kind: AddressKind,
    pub address: String,
    pub utxo: Utxo,
    pub confirmations: u32,
}

impl DepositCandidate {
    pub fn txid(&self) -> &str {
        &self.utxo.txid
    }

    pub fn confirmed(&self, required: u32) -> ConfirmedUtxo {
        ConfirmedUtxo {
            utxo: self.utxo.clone(),
            confirmations: self.confirmations,
            required_confirmations: required,
        }
    }
}

/// Reference to a deposit transaction for claiming
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositRef {
    pub txid: String,
    pub vout: Option<u32>,
    pub tx_hex: Option<String>,
}

impl DepositRef {
    pub fn from_txid(txid: impl Into<String>, vout: Option<u32>) -> Self {
        Self {
            txid: txid.into(),
            vout,
            tx_hex: None,
        }
    }

    pub fn with_hex(mut self, tx_hex: Option<String>) -> Self {
        self.tx_hex = tx_hex;
        self
    }

    /// Parse operator input: a txid, or a raw transaction in hex
    pub fn parse_input(input: &str, vout: Option<u32>) -> Result<Self, String> {
        let input = input.trim();
        if is_raw_tx_input(input) {
            let bytes = hex::decode(input).map_err(|e| format!("invalid hex: {}", e))?;
            let tx: bitcoin::Transaction = bitcoin::consensus::deserialize(&bytes)
                .map_err(|e| format!("invalid raw transaction: {}", e))?;
            return Ok(Self {
                txid: tx.compute_txid().to_string(),
                vout,
                tx_hex: Some(input.to_string()),
            });
        }

        if input.len() == 64 && input.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Ok(Self::from_txid(input.to_lowercase(), vout));
        }

        Err(format!("expected a 64-char txid or raw transaction hex, got '{}'", input))
    }
}

/// Raw transaction hex typed by an operator
pub fn is_raw_tx_input(input: &str) -> bool {
    input.len() >= MIN_RAW_TX_INPUT_LEN && input.bytes().all(|b| b.is_ascii_hexdigit())
}

/// What happened to one candidate during a cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CandidateOutcome {
    /// Below the confirmation threshold; still watched
    Pending { confirmations: u32, required: u32 },
    /// Claimed through the named method
    Claimed { method: String, attempts: usize },
    /// Every applicable claim call failed
    ClaimFailed { error: String, failures: Vec<String> },
    /// Confirmation wait interrupted by shutdown
    Cancelled,
}

/// Candidate plus its outcome
#[derive(Debug, Clone, Serialize)]
pub struct CandidateReport {
    pub txid: String,
    pub vout: u32,
    pub kind: AddressKind,
    pub address: String,
    pub value_sats: u64,
    #[serde(flatten)]
    pub outcome: CandidateOutcome,
}

impl CandidateReport {
    pub fn new(candidate: &DepositCandidate, outcome: CandidateOutcome) -> Self {
        Self {
            txid: candidate.utxo.txid.clone(),
            vout: candidate.utxo.vout,
            kind: candidate.kind,
            address: candidate.address.clone(),
            value_sats: candidate.utxo.value_sats,
            outcome,
        }
    }
}

/// Result of one scan-and-claim pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub scanned: usize,
    pub reports: Vec<CandidateReport>,
}

impl CycleReport {
    pub fn claimed(&self) -> usize {
        self.count(|o| matches!(o, CandidateOutcome::Claimed { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, CandidateOutcome::ClaimFailed { .. }))
    }

    pub fn pending(&self) -> usize {
        self.count(|o| matches!(o, CandidateOutcome::Pending { .. }))
    }

    fn count(&self, pred: impl Fn(&CandidateOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Deposit status entry
#[derive(Debug, Clone, Serialize)]
pub struct DepositStatusEntry {
    pub kind: AddressKind,
    pub address: String,
    #[serde(flatten)]
    pub deposit: ConfirmedUtxo,
    pub claimable: bool,
}

impl DepositStatusEntry {
    pub fn new(candidate: DepositCandidate, required: u32) -> Self {
        let deposit = candidate.confirmed(required);
        Self {
            kind: candidate.kind,
            address: candidate.address,
            claimable: deposit.mature(),
            deposit,
        }
    }
}

/// One-shot deposit status report
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositStatusReport {
    pub network: String,
    pub min_confirmations: u32,
    pub addresses: Vec<WatchedAddress>,
    pub deposits: Vec<DepositStatusEntry>,
}
