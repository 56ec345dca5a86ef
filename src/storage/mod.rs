//! Storage Layer Module
//!
//! Deduplication state for the deposit watcher.
//!
//! This module contains:
//! - Storage trait definitions for abstraction
//! - In-memory implementation for single-run dedup

pub mod memory;
pub mod traits;

// Re-exports for convenience
pub use memory::MemorySeenStore;
pub use traits::{SeenRecord, SeenStatus, SeenStore, StorageError, StorageResult};
