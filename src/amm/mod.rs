//! AMM swap automation
//!
//! Route resolution over live pools, simulation-bounded execution and the
//! wait-then-execute loop.

pub mod executor;
pub mod readiness;
pub mod resolver;
pub mod service;
pub mod token;
pub mod types;

pub use executor::{min_amount_out, PreparedSwap, SwapExecutor};
pub use readiness::{ReadinessConfig, ReadinessDetector, ReadinessReport};
pub use resolver::{PoolListing, PoolRouteResolver};
pub use service::{SwapError, SwapMode, SwapOutcome, SwapPipeline, SwapRequest};
pub use token::SwapTarget;
pub use types::{AmmClient, AmmError, CurveType, PoolDescriptor, RouteCandidate, SwapConfig, BTC_ASSET_PUBKEY};
