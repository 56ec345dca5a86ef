//! flashclaim - Deposit Auto-Claim and Swap Automation
//!
//! Two workflows against a Bitcoin layer-2 wallet:
//!
//! 1. **Deposit auto-claim** - watch the wallet's deposit addresses on a
//!    block explorer, wait for confirmations and claim each deposit once.
//! 2. **Liquidity-routed swaps** - resolve a target token or pool to the best
//!    pool by simulated output, wait until it is fundable and swap.
//!
//! The wallet SDK and AMM client are reached through [`bridge::BridgeClient`];
//! both sit behind traits so the pipelines can be driven by fakes.

pub mod amm;
pub mod bridge;
pub mod common;
pub mod deposit_tracker;
pub mod esplora;
pub mod storage;
pub mod wallet;

// Re-exports: explorer client
pub use esplora::{ChainDataClient, ChainSource, Endpoint, EsploraError, Utxo};

// Re-exports: pipelines
pub use amm::{PoolRouteResolver, SwapExecutor, SwapPipeline};
pub use deposit_tracker::{ClaimExecutor, DepositClaimPipeline, DepositScanner};

// Re-exports: collaborators
pub use amm::AmmClient;
pub use bridge::BridgeClient;
pub use wallet::DepositWallet;

pub use common::{AppConfig, FlashclaimError, Shutdown};
