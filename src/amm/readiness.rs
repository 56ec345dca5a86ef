//! Venue readiness detection
//!
//! Polls the pool listing until it answers with pools for a number of
//! consecutive rounds, so a swap run is only started against a venue that
//! is actually serving.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

use super::types::{AmmClient, PoolFilter};
use crate::common::shutdown::{Cancelled, Shutdown};

const PROBE_LIMIT: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessConfig {
    pub interval: Duration,
    /// Consecutive non-empty listings required
    pub consecutive: u32,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2_000),
            consecutive: 3,
        }
    }
}

/// Result of one poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    Ok(usize),
    Empty,
    Failed(String),
}

/// Next streak value after `probe`
pub fn advance(streak: u32, probe: &Probe) -> u32 {
    match probe {
        Probe::Ok(_) => streak.saturating_add(1),
        Probe::Empty | Probe::Failed(_) => 0,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessReport {
    pub polls: u32,
    pub consecutive: u32,
    pub elapsed_ms: u64,
    /// Pool count seen on the final poll
    pub pools: usize,
}

pub struct ReadinessDetector {
    client: Arc<dyn AmmClient>,
    config: ReadinessConfig,
}

impl ReadinessDetector {
    pub fn new(client: Arc<dyn AmmClient>, config: ReadinessConfig) -> Self {
        Self { client, config }
    }

    pub async fn poll_once(&self) -> Probe {
        if let Err(e) = self.client.authenticate().await {
            return Probe::Failed(e.to_string());
        }
        match self.client.list_pools(&PoolFilter::limit(PROBE_LIMIT)).await {
            Ok(pools) if pools.is_empty() => Probe::Empty,
            Ok(pools) => Probe::Ok(pools.len()),
            Err(e) => Probe::Failed(e.to_string()),
        }
    }

    /// Poll until the streak reaches the threshold
    pub async fn wait_until_ready(&self, shutdown: &Shutdown) -> Result<ReadinessReport, Cancelled> {
        let start = Instant::now();
        let required = self.config.consecutive.max(1);
        let mut streak = 0;
        let mut polls = 0;

        loop {
            let probe = self.poll_once().await;
            polls += 1;
            streak = advance(streak, &probe);
            debug!(poll = polls, streak, ?probe, "readiness probe");

            if let Probe::Ok(pools) = probe {
                if streak >= required {
                    let report = ReadinessReport {
                        polls,
                        consecutive: streak,
                        elapsed_ms: start.elapsed().as_millis() as u64,
                        pools,
                    };
                    info!(polls, elapsed_ms = report.elapsed_ms, "venue ready");
                    return Ok(report);
                }
            }

            shutdown.sleep(self.config.interval).await?;
        }
    }
}
