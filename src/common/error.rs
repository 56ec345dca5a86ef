//! Common Error Types
//!
//! Root error type that every module error converts into at the binary edge.

use thiserror::Error;

use crate::amm::service::SwapError;
use crate::amm::types::AmmError;
use crate::deposit_tracker::claimer::ClaimError;
use crate::deposit_tracker::service::TrackerError;
use crate::storage::StorageError;
use crate::wallet::WalletError;

/// Root error type for flashclaim
#[derive(Debug, Error)]
pub enum FlashclaimError {
    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),

    /// Logging errors
    #[error("logging error: {0}")]
    Logging(#[from] super::logging::LoggingError),

    /// Wallet collaborator errors
    #[error("wallet error: {0}")]
    Wallet(#[from] WalletError),

    /// Claim errors
    #[error("claim error: {0}")]
    Claim(#[from] ClaimError),

    /// Deposit watcher errors
    #[error("tracker error: {0}")]
    Tracker(#[from] TrackerError),

    /// AMM collaborator errors
    #[error("amm error: {0}")]
    Amm(#[from] AmmError),

    /// Swap pipeline errors
    #[error("swap error: {0}")]
    Swap(#[from] SwapError),

    /// Seen-set storage errors
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Validation errors
    #[error("validation error: {0}")]
    Validation(String),
}

impl FlashclaimError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        match self {
            FlashclaimError::Wallet(e) => e.is_transport(),
            FlashclaimError::Amm(e) => e.is_transport(),
            FlashclaimError::Storage(_) => true,
            _ => false,
        }
    }

    /// Get error code for JSON results
    pub fn error_code(&self) -> &'static str {
        match self {
            FlashclaimError::Config(_) => "CONFIG_ERROR",
            FlashclaimError::Logging(_) => "LOGGING_ERROR",
            FlashclaimError::Wallet(_) => "WALLET_ERROR",
            FlashclaimError::Claim(_) => "CLAIM_ERROR",
            FlashclaimError::Tracker(_) => "TRACKER_ERROR",
            FlashclaimError::Amm(_) => "AMM_ERROR",
            FlashclaimError::Swap(_) => "SWAP_ERROR",
            FlashclaimError::Storage(_) => "STORAGE_ERROR",
            FlashclaimError::Validation(_) => "VALIDATION_ERROR",
        }
    }
}

/// Result type alias using FlashclaimError
pub type Result<T> = std::result::Result<T, FlashclaimError>;
