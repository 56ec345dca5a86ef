//! Swap Pipeline
//!
//! "Wait until ready, then execute": each attempt authenticates, checks the
//! balance, resolves (or reuses a pinned) route and runs the executor. Not
//! ready states and errors both sleep and retry until the wall-clock limit.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};

use super::executor::{PreparedSwap, SwapExecutor};
use super::resolver::PoolRouteResolver;
use super::token::is_pool_id;
use super::types::{AmmClient, AmmError, RouteCandidate, SwapConfig, SwapReceipt};
use crate::common::logging::{log_swap_event, new_run_id};
use crate::common::shutdown::{Cancelled, Shutdown};

/// Swap pipeline errors
#[derive(Debug, thiserror::Error)]
pub enum SwapError {
    #[error("Timeout after {elapsed_ms}ms: {last_error}")]
    Timeout { elapsed_ms: u64, last_error: String },

    #[error("Not resolved")]
    NotResolved,

    #[error("invalid swap request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Amm(#[from] AmmError),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// What the pipeline does once the target is ready
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwapMode {
    #[default]
    Execute,
    /// Stop after building the intent
    DryExecute,
    /// Stop after resolving the route
    DryResolve,
}

/// Operator swap request
#[derive(Debug, Clone)]
pub struct SwapRequest {
    /// Pool id or token identifier
    pub target: String,
    pub amount_in: u128,
    /// Overrides the curve default
    pub slippage_bps: Option<u32>,
    /// Pre-resolved `(pool_id, asset_out)` that skips resolution
    pub pinned_route: Option<(String, String)>,
    pub mode: SwapMode,
    pub skip_balance_check: bool,
}

impl SwapRequest {
    pub fn new(target: impl Into<String>, amount_in: u128) -> Self {
        Self {
            target: target.into(),
            amount_in,
            slippage_bps: None,
            pinned_route: None,
            mode: SwapMode::Execute,
            skip_balance_check: false,
        }
    }

    pub fn validate(&self) -> Result<(), SwapError> {
        if self.target.trim().is_empty() {
            return Err(SwapError::InvalidRequest("target is required".into()));
        }
        if self.amount_in == 0 {
            return Err(SwapError::InvalidRequest("amount must be positive".into()));
        }
        if matches!(self.slippage_bps, Some(bps) if bps > 10_000) {
            return Err(SwapError::InvalidRequest("slippage must not exceed 10000 bps".into()));
        }
        Ok(())
    }
}

/// Per-stage durations of the final attempt
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
    pub auth_ms: u64,
    pub balance_ms: u64,
    pub resolve_ms: u64,
    pub simulate_ms: u64,
    pub execute_ms: u64,
}

/// Pipeline result
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SwapOutcome {
    Executed {
        #[serde(flatten)]
        prepared: PreparedSwap,
        receipt: SwapReceipt,
        timings: Timings,
    },
    DryExecuted {
        #[serde(flatten)]
        prepared: PreparedSwap,
        timings: Timings,
    },
    Resolved {
        route: RouteCandidate,
        timings: Timings,
    },
}

enum Step {
    Done(SwapOutcome),
    NotReady(String),
}

fn ms_since(t: Instant) -> u64 {
    t.elapsed().as_millis() as u64
}

/// Balance-gated, bounded-retry swap loop
pub struct SwapPipeline {
    client: Arc<dyn AmmClient>,
    resolver: PoolRouteResolver,
    executor: SwapExecutor,
    config: SwapConfig,
}

impl SwapPipeline {
    pub fn new(client: Arc<dyn AmmClient>, config: SwapConfig) -> Self {
        let resolver = PoolRouteResolver::new(client.clone(), config.base_asset.clone());
        let executor = SwapExecutor::new(client.clone(), resolver.clone(), config.clone());
        Self {
            client,
            resolver,
            executor,
            config,
        }
    }

    pub fn resolver(&self) -> &PoolRouteResolver {
        &self.resolver
    }

    /// Retry until the swap is submitted, the deadline passes or shutdown fires
    pub async fn run(&self, request: &SwapRequest, shutdown: &Shutdown) -> Result<SwapOutcome, SwapError> {
        request.validate()?;
        let span = info_span!("swap", run_id = %new_run_id(), swap_target = %request.target);
        self.retry_loop(request, shutdown).instrument(span).await
    }

    async fn retry_loop(&self, request: &SwapRequest, shutdown: &Shutdown) -> Result<SwapOutcome, SwapError> {
        let start = Instant::now();

        loop {
            let last_error = match self.attempt(request).await {
                Ok(Step::Done(outcome)) => return Ok(outcome),
                Ok(Step::NotReady(reason)) => {
                    info!(elapsed_ms = ms_since(start), "waiting: {}", reason);
                    reason
                }
                Err(SwapError::NotResolved) => return Err(SwapError::NotResolved),
                Err(e) => {
                    let badge = match &e {
                        SwapError::Amm(amm) if amm.is_auth_failure() => "AUTH 403",
                        _ => "retrying",
                    };
                    warn!(elapsed_ms = ms_since(start), error = %e, "{}", badge);
                    e.to_string()
                }
            };

            if start.elapsed() >= self.config.max_duration {
                let elapsed_ms = ms_since(start);
                log_swap_event("swap_timeout", &request.target, request.amount_in, None, elapsed_ms, Some(&last_error));
                return Err(SwapError::Timeout { elapsed_ms, last_error });
            }

            shutdown.sleep(self.config.retry_interval).await?;
        }
    }

    async fn attempt(&self, request: &SwapRequest) -> Result<Step, SwapError> {
        let mut timings = Timings::default();
        let amount = request.amount_in;

        let t = Instant::now();
        self.client.authenticate().await?;
        timings.auth_ms = ms_since(t);

        let skip_balance = request.skip_balance_check || self.config.skip_balance_check;
        let mut available = None;
        if !skip_balance {
            let t = Instant::now();
            let balance = self.client.get_balance().await?;
            timings.balance_ms = ms_since(t);
            available = Some(balance.amount_of(&self.config.base_asset, &self.config.base_asset));
        }

        if request.mode == SwapMode::DryResolve {
            let t = Instant::now();
            let route = self.resolver.resolve(&request.target, amount).await;
            timings.resolve_ms = ms_since(t);
            return match route {
                Some(route) => Ok(Step::Done(SwapOutcome::Resolved { route, timings })),
                None => Err(SwapError::NotResolved),
            };
        }

        let route = match &request.pinned_route {
            Some((pool_id, asset_out)) => RouteCandidate {
                pool_id: pool_id.clone(),
                asset_out_address: asset_out.clone(),
                curve_type: None,
            },
            None => {
                let t = Instant::now();
                let route = self.resolver.resolve(&request.target, amount).await;
                timings.resolve_ms = ms_since(t);
                match route {
                    Some(route) => route,
                    None => return Ok(Step::NotReady("resolving target".into())),
                }
            }
        };

        if let Some(balance) = available {
            if balance < amount {
                return Ok(Step::NotReady(format!(
                    "funding needed (balance {} < amount {})",
                    balance, amount
                )));
            }
        }

        let t = Instant::now();
        let prepared = self
            .executor
            .prepare(route, amount, request.slippage_bps, is_pool_id(&request.target))
            .await?;
        timings.simulate_ms = ms_since(t);

        let Some(prepared) = prepared else {
            return Ok(Step::NotReady("simulation returned zero output".into()));
        };

        info!(
            pool_id = %prepared.intent.pool_id,
            amount_out = %prepared.quote.amount_out,
            min_amount_out = %prepared.intent.min_amount_out,
            bps = prepared.intent.max_slippage_bps,
            "target ready"
        );

        if request.mode == SwapMode::DryExecute || self.config.dry_execute {
            return Ok(Step::Done(SwapOutcome::DryExecuted { prepared, timings }));
        }

        let t = Instant::now();
        let result = self.executor.execute(&prepared.intent).await;
        timings.execute_ms = ms_since(t);

        match result {
            Ok(receipt) => {
                // Submitted either way; a refused request is reported, never resubmitted
                let refused = (!receipt.accepted).then(|| format!("request {} not accepted", receipt.request_id));
                log_swap_event(
                    if receipt.accepted { "swap_submitted" } else { "swap_not_accepted" },
                    &prepared.intent.pool_id,
                    amount,
                    Some(prepared.intent.min_amount_out),
                    timings.execute_ms,
                    refused.as_deref(),
                );
                Ok(Step::Done(SwapOutcome::Executed {
                    prepared,
                    receipt,
                    timings,
                }))
            }
            Err(e) => {
                log_swap_event(
                    "swap_failed",
                    &prepared.intent.pool_id,
                    amount,
                    Some(prepared.intent.min_amount_out),
                    timings.execute_ms,
                    Some(&e.to_string()),
                );
                Err(e.into())
            }
        }
    }
}
