//! Structured Logging
//!
//! Human-readable output while developing, JSON lines in production. Deposit,
//! claim and swap outcomes are additionally emitted as one serialized
//! [`BusinessEvent`] each under the `flashclaim::events` target so they can
//! be filtered out of the stream.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Output format of the subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    pub fn from_flag(json: bool) -> Self {
        if json {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Level name to filter; unknown names fall back to `info`
pub fn parse_level(name: &str) -> LevelFilter {
    match name.trim().to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "warn" | "warning" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        "off" => LevelFilter::OFF,
        _ => LevelFilter::INFO,
    }
}

// ============================================================================
// Business events
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Deposit,
    Claim,
    Swap,
}

/// One business-level occurrence, keyed by the txid or pool it concerns
#[derive(Debug, Serialize)]
pub struct BusinessEvent {
    pub at: String,
    pub category: EventCategory,
    pub event: String,
    pub subject: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl BusinessEvent {
    pub fn new(category: EventCategory, event: &str, subject: &str) -> Self {
        Self {
            at: chrono::Utc::now().to_rfc3339(),
            category,
            event: event.to_string(),
            subject: subject.to_string(),
            ok: true,
            elapsed_ms: None,
            error: None,
            fields: Map::new(),
        }
    }

    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn elapsed(mut self, ms: u64) -> Self {
        self.elapsed_ms = Some(ms);
        self
    }

    pub fn failed(mut self, error: Option<&str>) -> Self {
        if let Some(error) = error {
            self.ok = false;
            self.error = Some(error.to_string());
        }
        self
    }

    pub fn render(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("{{\"event\":\"{}\",\"render_error\":\"{}\"}}", self.event, e))
    }

    /// Failed claims log at `error`, other failures at `warn`
    pub fn emit(&self) {
        let line = self.render();
        match (self.ok, self.category) {
            (true, _) => tracing::info!(target: "flashclaim::events", "{}", line),
            (false, EventCategory::Claim) => tracing::error!(target: "flashclaim::events", "{}", line),
            (false, _) => tracing::warn!(target: "flashclaim::events", "{}", line),
        }
    }
}

pub fn log_deposit_event(event: &str, txid: &str, value_sats: u64, confirmations: u32, required: u32) {
    BusinessEvent::new(EventCategory::Deposit, event, txid)
        .field("value_sats", value_sats)
        .field("confirmations", confirmations)
        .field("required", required)
        .field("mature", confirmations >= required)
        .emit();
}

/// Final result of claiming one transaction
pub fn log_claim_attempt(txid: &str, method: Option<&str>, attempts: usize, error: Option<&str>) {
    let event = if error.is_none() { "claimed" } else { "claim_failed" };
    BusinessEvent::new(EventCategory::Claim, event, txid)
        .field("method", method)
        .field("attempts", attempts)
        .failed(error)
        .emit();
}

pub fn log_swap_event(
    event: &str,
    pool_id: &str,
    amount_in: u128,
    min_amount_out: Option<u128>,
    elapsed_ms: u64,
    error: Option<&str>,
) {
    // u128 amounts travel as strings
    BusinessEvent::new(EventCategory::Swap, event, pool_id)
        .field("amount_in", amount_in.to_string())
        .field("min_amount_out", min_amount_out.map(|v| v.to_string()))
        .elapsed(elapsed_ms)
        .failed(error)
        .emit();
}

// ============================================================================
// Initialization
// ============================================================================

/// Install the global subscriber. `RUST_LOG` overrides `level`.
pub fn init_logging(level: LevelFilter, format: LogFormat) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("flashclaim={},reqwest=warn,hyper=warn", level)));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).with_span_events(FmtSpan::NONE))
            .try_init(),
    };

    installed.map_err(|e| LoggingError::InitFailed(e.to_string()))
}

pub fn init_from_config(config: &crate::common::config::AppConfig) -> Result<(), LoggingError> {
    init_logging(parse_level(&config.log_level), LogFormat::from_flag(config.log_json))
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to initialize logging: {0}")]
    InitFailed(String),
}

/// Identifier tying together the log lines of one pipeline run
pub fn new_run_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_rendering() {
        let line = BusinessEvent::new(EventCategory::Claim, "claimed", "abc123")
            .field("method", "claimStaticDeposit")
            .field("attempts", 2)
            .render();
        let json: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(json["category"], "claim");
        assert_eq!(json["subject"], "abc123");
        assert_eq!(json["method"], "claimStaticDeposit");
        assert_eq!(json["ok"], true);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_failed_event_carries_error() {
        let event = BusinessEvent::new(EventCategory::Swap, "swap_failed", "pool").failed(Some("FSAG-4201"));
        assert!(!event.ok);
        assert!(event.render().contains("FSAG-4201"));

        let unchanged = BusinessEvent::new(EventCategory::Swap, "swap_submitted", "pool").failed(None);
        assert!(unchanged.ok);
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!(parse_level("debug"), LevelFilter::DEBUG);
        assert_eq!(parse_level(" WARNING "), LevelFilter::WARN);
        assert_eq!(parse_level("verbose"), LevelFilter::INFO);
    }

    #[test]
    fn test_run_ids_are_unique() {
        let a = new_run_id();
        assert_eq!(a.len(), 32);
        assert_ne!(a, new_run_id());
    }
}
