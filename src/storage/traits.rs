//! Storage Trait Definitions
//!
//! Abstract interface for the per-run set of deposit transactions the
//! watcher has already picked up. The in-memory store covers a single run;
//! a durable implementation can be plugged in for cross-restart dedup.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Where a seen transaction ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SeenStatus {
    /// Picked up, waiting for confirmations
    Waiting,
    /// Claimed through the named wallet method
    Claimed { method: String },
    /// Claim attempted and failed; not retried within the run
    Failed { error: String },
    /// Confirmation wait interrupted by shutdown
    Cancelled,
}

/// Seen transaction record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeenRecord {
    pub txid: String,
    /// Unix timestamp (seconds) when the txid was first observed
    pub first_seen_at: i64,
    pub status: SeenStatus,
}

impl SeenRecord {
    pub fn new(txid: &str) -> Self {
        Self {
            txid: txid.to_string(),
            first_seen_at: chrono::Utc::now().timestamp(),
            status: SeenStatus::Waiting,
        }
    }
}

/// Deduplication store keyed by txid
///
/// Implementations:
/// - `MemorySeenStore` - process-scoped set, lost on restart
#[async_trait]
pub trait SeenStore: Send + Sync {
    /// Record a txid; returns `false` if it was already present
    async fn mark_seen(&self, txid: &str) -> StorageResult<bool>;

    /// Check whether a txid was already recorded
    async fn is_seen(&self, txid: &str) -> StorageResult<bool>;

    /// Update the outcome of a recorded txid
    async fn set_status(&self, txid: &str, status: SeenStatus) -> StorageResult<()>;

    /// Get a record by txid
    async fn get(&self, txid: &str) -> StorageResult<Option<SeenRecord>>;

    /// Number of recorded txids
    async fn count(&self) -> StorageResult<usize>;
}
