//! In-Memory Storage Implementation
//!
//! Process-scoped seen set. Data is lost when the watcher restarts.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::traits::{SeenRecord, SeenStatus, SeenStore, StorageError, StorageResult};

/// In-memory seen-txid store
///
/// Grows monotonically for the lifetime of the store. Uses Arc<RwLock<>>
/// so clones share the same set.
#[derive(Clone, Default)]
pub struct MemorySeenStore {
    /// Records indexed by txid
    records: Arc<RwLock<HashMap<String, SeenRecord>>>,
}

impl MemorySeenStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SeenStore for MemorySeenStore {
    async fn mark_seen(&self, txid: &str) -> StorageResult<bool> {
        let mut records = self.records.write().await;

        if records.contains_key(txid) {
            return Ok(false);
        }

        records.insert(txid.to_string(), SeenRecord::new(txid));
        Ok(true)
    }

    async fn is_seen(&self, txid: &str) -> StorageResult<bool> {
        let records = self.records.read().await;
        Ok(records.contains_key(txid))
    }

    async fn set_status(&self, txid: &str, status: SeenStatus) -> StorageResult<()> {
        let mut records = self.records.write().await;
        match records.get_mut(txid) {
            Some(record) => {
                record.status = status;
                Ok(())
            }
            None => Err(StorageError::NotFound(txid.to_string())),
        }
    }

    async fn get(&self, txid: &str) -> StorageResult<Option<SeenRecord>> {
        let records = self.records.read().await;
        Ok(records.get(txid).cloned())
    }

    async fn count(&self) -> StorageResult<usize> {
        let records = self.records.read().await;
        Ok(records.len())
    }
}
