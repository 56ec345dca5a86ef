//! Swap Executor
//!
//! Simulates a swap on a resolved route, bounds the minimum output by the
//! slippage tolerance and submits it. A literal-pool target whose pool
//! cannot fill the order gets exactly one re-route through the resolver.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::resolver::PoolRouteResolver;
use super::types::{
    AmmClient, AmmError, CurveType, RouteCandidate, SimulateRequest, SwapConfig, SwapIntent, SwapQuote,
    SwapReceipt,
};

const BPS_DENOMINATOR: u128 = 10_000;

/// `floor(amount_out * (10000 - bps) / 10000)` without intermediate overflow
pub fn min_amount_out(amount_out: u128, slippage_bps: u32) -> u128 {
    let keep = BPS_DENOMINATOR - u128::from(slippage_bps.min(10_000));
    (amount_out / BPS_DENOMINATOR) * keep + (amount_out % BPS_DENOMINATOR) * keep / BPS_DENOMINATOR
}

/// Curve-dependent default tolerance
pub fn default_slippage_bps(curve: Option<&CurveType>, config: &SwapConfig) -> u32 {
    match curve {
        Some(CurveType::SingleSided) => config.slippage_single_bps,
        _ => config.slippage_cp_bps,
    }
}

/// Simulated and slippage-bounded swap, ready to submit
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedSwap {
    pub route: RouteCandidate,
    pub quote: SwapQuote,
    pub intent: SwapIntent,
    /// Whether the route was replaced by a fallback pool
    pub rerouted: bool,
}

/// Simulate, bound and submit swaps
#[derive(Clone)]
pub struct SwapExecutor {
    client: Arc<dyn AmmClient>,
    resolver: PoolRouteResolver,
    config: SwapConfig,
}

impl SwapExecutor {
    pub fn new(client: Arc<dyn AmmClient>, resolver: PoolRouteResolver, config: SwapConfig) -> Self {
        Self {
            client,
            resolver,
            config,
        }
    }

    async fn simulate(&self, route: &RouteCandidate, amount_in: u128) -> Result<SwapQuote, AmmError> {
        let request = SimulateRequest {
            pool_id: route.pool_id.clone(),
            asset_in_address: self.config.base_asset.clone(),
            asset_out_address: route.asset_out_address.clone(),
            amount_in,
        };
        self.client.simulate_swap(&request).await
    }

    /// Simulate on `route` and build the intent.
    ///
    /// `Ok(None)` means the pool quoted zero output and the caller should back
    /// off. `allow_reroute` is set when the target was a literal pool id.
    pub async fn prepare(
        &self,
        route: RouteCandidate,
        amount_in: u128,
        slippage_override: Option<u32>,
        allow_reroute: bool,
    ) -> Result<Option<PreparedSwap>, AmmError> {
        let mut route = route;
        let mut rerouted = false;

        let mut quote = match self.simulate(&route, amount_in).await {
            Ok(quote) => quote,
            Err(e) if allow_reroute && e.is_liquidity_insufficient() => {
                let Some(fallback) = self.resolver.resolve_fallback(&route.pool_id, amount_in).await else {
                    return Err(e);
                };
                info!(from = %route.pool_id, to = %fallback.pool_id, "insufficient liquidity, switching pool");
                route = fallback;
                rerouted = true;
                self.simulate(&route, amount_in).await?
            }
            Err(e) => return Err(e),
        };

        if quote.amount_out == 0 && allow_reroute && !rerouted {
            if let Some(fallback) = self.resolver.resolve_fallback(&route.pool_id, amount_in).await {
                info!(from = %route.pool_id, to = %fallback.pool_id, "zero simulated output, switching pool");
                route = fallback;
                rerouted = true;
                quote = self.simulate(&route, amount_in).await?;
            }
        }

        if quote.amount_out == 0 {
            return Ok(None);
        }

        let bps = slippage_override.unwrap_or_else(|| default_slippage_bps(route.curve_type.as_ref(), &self.config));
        let intent = SwapIntent {
            pool_id: route.pool_id.clone(),
            asset_in_address: self.config.base_asset.clone(),
            asset_out_address: route.asset_out_address.clone(),
            amount_in,
            min_amount_out: min_amount_out(quote.amount_out, bps),
            max_slippage_bps: bps,
        };

        Ok(Some(PreparedSwap {
            route,
            quote,
            intent,
            rerouted,
        }))
    }

    /// Submit once; failures go back to the caller's retry loop
    pub async fn execute(&self, intent: &SwapIntent) -> Result<SwapReceipt, AmmError> {
        self.client.execute_swap(intent).await
    }
}
