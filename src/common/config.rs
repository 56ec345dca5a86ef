//! Environment-based Configuration
//!
//! Configuration is read once at startup and never re-read. A `.env` file in
//! the working directory is honoured by the binary before this module runs.
//!
//! # Network
//! - `DEFAULT_NETWORK` - "MAINNET", "REGTEST", "TESTNET", "SIGNET" or "LOCAL" (default: MAINNET)
//! - `MEMPOOL_API_BASE` - comma-separated explorer base URLs, tried in order
//! - `ELECTRS_URL` / `ELECTRS_USERNAME` / `ELECTRS_PASSWORD` - wallet-side explorer, tried first
//!
//! # Deposit claiming
//! - `CLAIM_MIN_CONFIRMATIONS` - confirmations before a deposit is claimed (default: 3)
//! - `CLAIM_MAX_FEE` - fee budget passed to fee-qualified claim calls
//! - `CLAIM_POLL_INTERVAL_MS` / `SCAN_INTERVAL_MS` - polling cadence
//! - `SCAN_ACTIVE_DEPOSIT_ADDRESSES` - also watch unused single-use addresses
//! - `UNKNOWN_OUTSPEND_POLICY` - "exclude" or "include"
//! - `CLAIM_STRATEGY` - "probe" or "quote"
//!
//! # Swapping
//! - `SLIPPAGE_BPS_CP_DEFAULT` / `SLIPPAGE_BPS_SINGLE_SIDED_DEFAULT`
//! - `SNIPE_MAX_MS` / `SNIPE_RETRY_INTERVAL_MS`
//! - `SKIP_BALANCE_CHECK` / `DRY_EXECUTE`
//! - `BASE_ASSET_ADDRESS`
//! - `DETECTION_INTERVAL_MS` / `DETECTION_CONSECUTIVE_SUCCESSES`
//!
//! # Collaborators
//! - `WALLET_BRIDGE_URL` - JSON-RPC endpoint of the wallet/AMM host
//! - `WALLET_BRIDGE_TOKEN` - bearer secret for the bridge (required)
//!
//! # Logging
//! - `LOG_LEVEL`, `LOG_JSON`, `WATCHER_NAME`

use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::amm::readiness::ReadinessConfig;
use crate::amm::types::{SwapConfig, BTC_ASSET_PUBKEY};
use crate::deposit_tracker::types::{ClaimStrategy, TrackerConfig, UnknownOutspendPolicy};
use crate::esplora::Endpoint;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Bitcoin / layer-2 network selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Regtest,
    Testnet,
    Signet,
    Local,
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "MAINNET" | "MAIN" => Ok(Network::Mainnet),
            "REGTEST" => Ok(Network::Regtest),
            "TESTNET" | "TEST" => Ok(Network::Testnet),
            "SIGNET" => Ok(Network::Signet),
            "LOCAL" => Ok(Network::Local),
            _ => Err(ConfigError::InvalidValue(
                "DEFAULT_NETWORK".to_string(),
                format!("unknown network: {}", s),
            )),
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Network {
    /// Wire name understood by the wallet host
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "MAINNET",
            Network::Regtest => "REGTEST",
            Network::Testnet => "TESTNET",
            Network::Signet => "SIGNET",
            Network::Local => "LOCAL",
        }
    }

    /// Default explorer endpoints, in failover order
    pub fn default_explorer_urls(&self) -> &'static [&'static str] {
        match self {
            Network::Mainnet => &["https://mempool.space/api", "https://blockstream.info/api"],
            Network::Testnet => &[
                "https://mempool.space/testnet/api",
                "https://blockstream.info/testnet/api",
            ],
            Network::Signet => &["https://mempool.space/signet/api"],
            Network::Regtest => &["https://mempool.regtest.flashnet.xyz/api"],
            Network::Local => &["http://127.0.0.1:3002"],
        }
    }

    /// Default claim fee budget in sats
    pub fn default_claim_max_fee(&self) -> u64 {
        match self {
            Network::Mainnet => 2_000,
            _ => 1_000,
        }
    }

    /// Consecutive pool-listing successes before the AMM counts as live
    pub fn default_detection_consecutive(&self) -> u32 {
        match self {
            Network::Mainnet => 3,
            _ => 2,
        }
    }
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Network environment
    pub network: Network,

    /// Explorer endpoints in failover order
    pub explorers: Vec<Endpoint>,

    /// Deposit watcher settings
    pub tracker: TrackerConfig,

    /// Swap pipeline settings
    pub swap: SwapConfig,

    /// Readiness detector settings
    pub readiness: ReadinessConfig,

    /// Wallet/AMM bridge endpoint
    pub bridge_url: String,

    /// Bridge bearer secret
    pub bridge_token: String,

    /// Log level
    pub log_level: String,

    /// Emit JSON logs
    pub log_json: bool,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let network: Network = vars.string("DEFAULT_NETWORK", "MAINNET").parse()?;

        // Secrets are checked before anything else is derived
        let bridge_token = vars
            .get("WALLET_BRIDGE_TOKEN")
            .ok_or_else(|| ConfigError::MissingEnvVar("WALLET_BRIDGE_TOKEN".to_string()))?;
        let bridge_url = vars
            .string("WALLET_BRIDGE_URL", "http://127.0.0.1:8787")
            .trim_end_matches('/')
            .to_string();

        let explorers = load_explorers(&vars, network);

        let min_confirmations: u32 = vars.number("CLAIM_MIN_CONFIRMATIONS", 3)?;
        if min_confirmations == 0 {
            return Err(ConfigError::InvalidValue(
                "CLAIM_MIN_CONFIRMATIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let tracker = TrackerConfig {
            required_confirmations: min_confirmations,
            max_fee_sats: vars.number("CLAIM_MAX_FEE", network.default_claim_max_fee())?,
            confirmation_poll_interval: Duration::from_millis(
                vars.number("CLAIM_POLL_INTERVAL_MS", 10_000)?,
            ),
            scan_interval: Duration::from_millis(vars.number("SCAN_INTERVAL_MS", 5_000)?),
            scan_active_addresses: vars.flag("SCAN_ACTIVE_DEPOSIT_ADDRESSES", false),
            unknown_outspend: vars
                .string("UNKNOWN_OUTSPEND_POLICY", "exclude")
                .parse()?,
            strategy: vars.string("CLAIM_STRATEGY", "probe").parse()?,
            watcher_name: vars.get("WATCHER_NAME"),
        };

        let slippage_cp_bps: u32 = vars.number("SLIPPAGE_BPS_CP_DEFAULT", 300)?;
        let slippage_single_bps: u32 = vars.number("SLIPPAGE_BPS_SINGLE_SIDED_DEFAULT", 700)?;
        for (name, bps) in [
            ("SLIPPAGE_BPS_CP_DEFAULT", slippage_cp_bps),
            ("SLIPPAGE_BPS_SINGLE_SIDED_DEFAULT", slippage_single_bps),
        ] {
            if bps > 10_000 {
                return Err(ConfigError::InvalidValue(
                    name.to_string(),
                    "must not exceed 10000 bps".to_string(),
                ));
            }
        }

        let swap = SwapConfig {
            base_asset: vars.string("BASE_ASSET_ADDRESS", BTC_ASSET_PUBKEY),
            slippage_cp_bps,
            slippage_single_bps,
            max_duration: Duration::from_millis(vars.number("SNIPE_MAX_MS", 120_000)?),
            retry_interval: Duration::from_millis(vars.number("SNIPE_RETRY_INTERVAL_MS", 2_000)?),
            skip_balance_check: vars.flag("SKIP_BALANCE_CHECK", false),
            dry_execute: vars.flag("DRY_EXECUTE", false),
        };

        let readiness = ReadinessConfig {
            interval: Duration::from_millis(vars.number("DETECTION_INTERVAL_MS", 2_000)?),
            consecutive: vars.number(
                "DETECTION_CONSECUTIVE_SUCCESSES",
                network.default_detection_consecutive(),
            )?,
        };

        let log_level = vars.string("LOG_LEVEL", "info");
        let log_json = vars.flag("LOG_JSON", network == Network::Mainnet);

        Ok(Self {
            network,
            explorers,
            tracker,
            swap,
            readiness,
            bridge_url,
            bridge_token,
            log_level,
            log_json,
        })
    }

    /// Print configuration summary (hiding sensitive values)
    pub fn print_summary(&self) {
        tracing::info!(
            network = %self.network,
            explorers = ?self.explorers.iter().map(|e| e.base_url.as_str()).collect::<Vec<_>>(),
            bridge = %self.bridge_url,
            bridge_token = "<redacted>",
            min_confirmations = self.tracker.required_confirmations,
            max_fee_sats = self.tracker.max_fee_sats,
            strategy = ?self.tracker.strategy,
            unknown_outspend = ?self.tracker.unknown_outspend,
            slippage_cp_bps = self.swap.slippage_cp_bps,
            slippage_single_bps = self.swap.slippage_single_bps,
            swap_timeout_ms = self.swap.max_duration.as_millis() as u64,
            "configuration loaded"
        );
    }
}

/// Build the ordered explorer list
fn load_explorers<F>(vars: &Vars<F>, network: Network) -> Vec<Endpoint>
where
    F: Fn(&str) -> Option<String>,
{
    let mut explorers = Vec::new();

    if let Some(url) = vars.get("ELECTRS_URL") {
        let auth = match (vars.get("ELECTRS_USERNAME"), vars.get("ELECTRS_PASSWORD")) {
            (Some(user), Some(pass)) => Some((user, pass)),
            _ => None,
        };
        explorers.push(Endpoint::new(&url).with_basic_auth(auth));
    }

    match vars.get("MEMPOOL_API_BASE") {
        Some(list) => explorers.extend(
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(Endpoint::new),
        ),
        None => explorers.extend(network.default_explorer_urls().iter().map(|u| Endpoint::new(u))),
    }

    explorers
}

/// Typed accessors over a variable lookup
struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Trimmed, non-empty value
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    fn number<T: FromStr>(&self, name: &str, default: T) -> Result<T, ConfigError> {
        match self.get(name) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| {
                ConfigError::InvalidValue(name.to_string(), format!("not a number: {}", raw))
            }),
        }
    }

    fn flag(&self, name: &str, default: bool) -> bool {
        match self.get(name) {
            None => default,
            Some(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "y" | "on"),
        }
    }
}
