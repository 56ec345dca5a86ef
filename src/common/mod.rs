//! Common Infrastructure Module
//!
//! This module contains:
//! - Configuration loading from environment variables
//! - Structured logging setup
//! - Common error types
//! - Cooperative shutdown signal shared by every polling loop

pub mod config;
pub mod error;
pub mod logging;
pub mod shutdown;

// Re-exports for convenience
pub use config::{AppConfig, ConfigError, Network};
pub use error::{FlashclaimError, Result};
pub use logging::{
    init_from_config, init_logging, log_claim_attempt, log_deposit_event, log_swap_event,
    new_run_id, parse_level, BusinessEvent, EventCategory, LogFormat, LoggingError,
};
pub use shutdown::{Cancelled, Shutdown, ShutdownTrigger};
