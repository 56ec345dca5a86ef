//! Deposit Tracker Module
//!
//! Detects Bitcoin deposits to the wallet's addresses and claims them once
//! they are deep enough:
//!
//! ```text
//! SCANNING → WAITING_CONFIRMATIONS → MATURE → CLAIMING → CLAIMED | CLAIM_FAILED
//! ```
//!
//! ## Components
//!
//! - **types**: Watched addresses, candidates, reports and configuration
//! - **scanner**: Fast-path UTXO listing with history reconstruction fallback
//! - **claimer**: Ordered claim calls against the wallet
//! - **service**: Pipeline composing scanner, confirmation gate and claimer

pub mod claimer;
pub mod scanner;
pub mod service;
pub mod types;

// Re-exports
pub use claimer::{claim_candidates, ClaimError, ClaimExecutor, ClaimFailure, ClaimSuccess};
pub use scanner::{is_mature, DepositScanner};
pub use service::{DepositClaimPipeline, TrackerError};
pub use types::{
    AddressKind, CandidateOutcome, CandidateReport, ClaimStrategy, ConfirmedUtxo, CycleReport,
    DepositCandidate, DepositRef, DepositStatusEntry, DepositStatusReport, TrackerConfig,
    UnknownOutspendPolicy, WatchedAddress,
};
