//! Pool Route Resolver
//!
//! Resolves a swap target into the pool that pays the most for a fixed
//! base-asset input. Pool discovery and per-pool simulation fan out with a
//! bounded, order-preserving buffer so that equal quotes always resolve to
//! the first pool discovered.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, warn};

use super::token::SwapTarget;
use super::types::{AmmClient, PoolDescriptor, PoolFilter, RouteCandidate, SimulateRequest};

/// Concurrent collaborator calls during discovery and simulation
pub const FAN_OUT: usize = 4;

/// Page size for pool discovery queries
pub const DISCOVERY_LIMIT: u32 = 50;

/// Pool listing row with base-asset annotations
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolListing {
    #[serde(flatten)]
    pub pool: PoolDescriptor,
    pub constant_product: bool,
    /// "A" or "B" when the base asset is on that side
    pub base_side: Option<&'static str>,
}

/// Liquidity-ranked route resolver
#[derive(Clone)]
pub struct PoolRouteResolver {
    client: Arc<dyn AmmClient>,
    base_asset: String,
}

impl PoolRouteResolver {
    pub fn new(client: Arc<dyn AmmClient>, base_asset: impl Into<String>) -> Self {
        Self {
            client,
            base_asset: base_asset.into(),
        }
    }

    pub fn base_asset(&self) -> &str {
        &self.base_asset
    }

    /// Best route for `target`; `None` means not ready yet
    pub async fn resolve(&self, target: &str, amount_in: u128) -> Option<RouteCandidate> {
        match SwapTarget::parse(target) {
            SwapTarget::Pool(pool_id) => self.resolve_pool(&pool_id).await,
            token @ SwapTarget::Token { .. } => {
                let pools = self.discover(&token.lookup_addresses()).await;
                self.best_by_simulation(pools, amount_in).await
            }
            SwapTarget::Unrecognized(t) => {
                warn!(swap_target = %t, "target is neither a pool id nor a token identifier");
                None
            }
        }
    }

    /// Route through a literal pool, if the base asset is one of its sides
    pub async fn resolve_pool(&self, pool_id: &str) -> Option<RouteCandidate> {
        let pool = match self.client.get_pool(pool_id).await {
            Ok(pool) => pool,
            Err(e) => {
                debug!(pool_id, error = %e, "pool lookup failed");
                return None;
            }
        };

        let Some(asset_out) = pool.counter_asset(&self.base_asset) else {
            debug!(pool_id, "pool does not trade the base asset");
            return None;
        };

        Some(RouteCandidate {
            pool_id: pool.lp_public_key.clone(),
            asset_out_address: asset_out.to_string(),
            curve_type: pool.curve_type.clone(),
        })
    }

    /// Best alternative to a failing pool, found through its token side
    pub async fn resolve_fallback(&self, failing_pool_id: &str, amount_in: u128) -> Option<RouteCandidate> {
        let pool = match self.client.get_pool(failing_pool_id).await {
            Ok(pool) => pool,
            Err(e) => {
                debug!(pool_id = failing_pool_id, error = %e, "fallback pool lookup failed");
                return None;
            }
        };

        let token = pool
            .counter_asset(&self.base_asset)
            .unwrap_or(&pool.asset_a_address)
            .to_string();

        let pools: Vec<PoolDescriptor> = self
            .discover(&[token])
            .await
            .into_iter()
            .filter(|p| {
                !p.lp_public_key.eq_ignore_ascii_case(failing_pool_id)
                    && !p.lp_public_key.eq_ignore_ascii_case(&pool.lp_public_key)
            })
            .collect();

        self.best_by_simulation(pools, amount_in).await
    }

    /// Pools containing any of `addresses` on either side and the base asset
    /// on the other, de-duplicated, in discovery order
    async fn discover(&self, addresses: &[String]) -> Vec<PoolDescriptor> {
        let filters: Vec<PoolFilter> = addresses
            .iter()
            .flat_map(|addr| {
                [
                    PoolFilter::asset_a(DISCOVERY_LIMIT, addr),
                    PoolFilter::asset_b(DISCOVERY_LIMIT, addr),
                ]
            })
            .collect();

        let results: Vec<_> = stream::iter(filters)
            .map(|filter| async move {
                let result = self.client.list_pools(&filter).await;
                (filter, result)
            })
            .buffered(FAN_OUT)
            .collect()
            .await;

        let mut unique = HashSet::new();
        let mut pools = Vec::new();
        for (filter, result) in results {
            match result {
                Ok(found) => pools.extend(found),
                Err(e) => debug!(?filter, error = %e, "pool query failed"),
            }
        }
        pools.retain(|p| p.has_asset(&self.base_asset) && unique.insert(p.lp_public_key.to_lowercase()));
        pools
    }

    /// Candidate with the strictly largest simulated output; failed simulations are skipped
    async fn best_by_simulation(&self, pools: Vec<PoolDescriptor>, amount_in: u128) -> Option<RouteCandidate> {
        let quotes: Vec<_> = stream::iter(pools)
            .filter_map(|pool| async move {
                let asset_out = pool.counter_asset(&self.base_asset)?.to_string();
                Some((pool, asset_out))
            })
            .map(|(pool, asset_out)| async move {
                let request = SimulateRequest {
                    pool_id: pool.lp_public_key.clone(),
                    asset_in_address: self.base_asset.clone(),
                    asset_out_address: asset_out.clone(),
                    amount_in,
                };
                let quote = self.client.simulate_swap(&request).await;
                (pool, asset_out, quote)
            })
            .buffered(FAN_OUT)
            .collect()
            .await;

        let mut best: Option<(u128, RouteCandidate)> = None;
        for (pool, asset_out, quote) in quotes {
            match quote {
                Ok(quote) => {
                    debug!(pool_id = %pool.lp_public_key, amount_out = %quote.amount_out, "simulated");
                    if best.as_ref().map_or(true, |(out, _)| quote.amount_out > *out) {
                        best = Some((
                            quote.amount_out,
                            RouteCandidate {
                                pool_id: pool.lp_public_key,
                                asset_out_address: asset_out,
                                curve_type: pool.curve_type,
                            },
                        ));
                    }
                }
                Err(e) => debug!(pool_id = %pool.lp_public_key, error = %e, "simulation failed, skipping pool"),
            }
        }

        best.map(|(_, route)| route)
    }

    /// Pools on the AMM with base-asset side and curve annotations
    pub async fn list_pools(&self, limit: u32) -> Result<Vec<PoolListing>, super::types::AmmError> {
        let pools = self.client.list_pools(&PoolFilter::limit(limit)).await?;
        Ok(pools
            .into_iter()
            .map(|pool| {
                let base_side = if pool.asset_a_address.eq_ignore_ascii_case(&self.base_asset) {
                    Some("A")
                } else if pool.asset_b_address.eq_ignore_ascii_case(&self.base_asset) {
                    Some("B")
                } else {
                    None
                };
                PoolListing {
                    constant_product: pool.is_constant_product(),
                    base_side,
                    pool,
                }
            })
            .collect())
    }
}
