//! Deposit Claim Pipeline
//!
//! Watches the wallet's deposit addresses and claims deposits once they
//! reach the required confirmation depth:
//! scanning → waiting_confirmations → mature → claiming → claimed | claim_failed
//!
//! # Flow:
//! 1. Ask the wallet for its static (and optionally single-use) addresses
//! 2. Scan the explorer for outputs paying them
//! 3. New txids go into the seen set and wait for confirmations
//! 4. Matured deposits are claimed; a failed claim is not retried in the run

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Instrument};

use super::claimer::{ClaimError, ClaimExecutor, ClaimSuccess};
use super::scanner::{is_mature, DepositScanner};
use super::types::{
    AddressKind, CandidateOutcome, CandidateReport, CycleReport, DepositCandidate, DepositRef,
    DepositStatusEntry, DepositStatusReport, TrackerConfig, WatchedAddress,
};
use crate::common::logging::log_deposit_event;
use crate::common::shutdown::{Cancelled, Shutdown};
use crate::esplora::ChainSource;
use crate::storage::{SeenStatus, SeenStore, StorageError};
use crate::wallet::{methods, DepositWallet, PeriodicClaimOptions, WalletError};

/// Deposit pipeline errors
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Claim error: {0}")]
    Claim(#[from] ClaimError),

    #[error("No deposit addresses to watch")]
    NoAddresses,

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// Scan, gate and claim loop for one wallet
pub struct DepositClaimPipeline {
    config: TrackerConfig,
    network: String,
    wallet: Arc<dyn DepositWallet>,
    chain: Arc<dyn ChainSource>,
    scanner: DepositScanner,
    claimer: ClaimExecutor,
    seen: Arc<dyn SeenStore>,
}

impl DepositClaimPipeline {
    pub fn new(
        config: TrackerConfig,
        wallet: Arc<dyn DepositWallet>,
        chain: Arc<dyn ChainSource>,
        seen: Arc<dyn SeenStore>,
    ) -> Self {
        let scanner = DepositScanner::new(chain.clone(), config.unknown_outspend);
        let claimer = ClaimExecutor::new(wallet.clone(), Some(config.max_fee_sats), config.strategy);
        Self {
            config,
            network: String::new(),
            wallet,
            chain,
            scanner,
            claimer,
            seen,
        }
    }

    /// Network label used in status reports
    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = network.into();
        self
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn seen_store(&self) -> &Arc<dyn SeenStore> {
        &self.seen
    }

    /// Addresses to watch: static first, then unused single-use ones
    pub async fn watched_addresses(&self) -> Result<Vec<WatchedAddress>, TrackerError> {
        let caps = self.claimer.capabilities().await?;

        let mut statics = Vec::new();
        if caps.supports(methods::QUERY_STATIC_DEPOSIT_ADDRESSES) {
            match self.wallet.query_static_deposit_addresses().await {
                Ok(addrs) => statics = addrs,
                Err(e) => warn!(error = %e, "static address query failed, using primary address"),
            }
        }
        if statics.is_empty() {
            statics.push(self.wallet.get_static_deposit_address().await?);
        }

        let mut actives = Vec::new();
        if self.config.scan_active_addresses && caps.supports(methods::GET_UNUSED_DEPOSIT_ADDRESSES) {
            match self.wallet.get_unused_deposit_addresses().await {
                Ok(addrs) => actives = addrs,
                Err(e) => warn!(error = %e, "unused deposit address query failed"),
            }
        }

        let mut unique = HashSet::new();
        let watched: Vec<WatchedAddress> = statics
            .into_iter()
            .map(|a| WatchedAddress::new(AddressKind::Static, a))
            .chain(actives.into_iter().map(|a| WatchedAddress::new(AddressKind::Active, a)))
            .filter(|w| !w.address.is_empty() && unique.insert(w.address.clone()))
            .collect();

        if watched.is_empty() {
            return Err(TrackerError::NoAddresses);
        }
        Ok(watched)
    }

    /// Continuous watcher; returns when `shutdown` fires
    pub async fn run(&self, shutdown: Shutdown) -> Result<(), TrackerError> {
        let span = info_span!(
            "watcher",
            name = self.config.watcher_name.as_deref().unwrap_or("default")
        );

        async {
            info!(
                required_confirmations = self.config.required_confirmations,
                max_fee_sats = self.config.max_fee_sats,
                scan_interval_ms = self.config.scan_interval.as_millis() as u64,
                "deposit watcher started"
            );

            if self.try_start_periodic_claim().await {
                info!("wallet periodic auto-claim active, explorer polling disabled");
                shutdown.cancelled().await;
                return Ok(());
            }

            loop {
                if shutdown.is_triggered() {
                    break;
                }

                match self.process_cycle(&shutdown).await {
                    Ok(report) => debug!(
                        scanned = report.scanned,
                        claimed = report.claimed(),
                        failed = report.failed(),
                        "cycle complete"
                    ),
                    Err(e) => warn!(error = %e, "watch cycle error"),
                }

                if shutdown.sleep(self.config.scan_interval).await.is_err() {
                    break;
                }
            }

            info!("deposit watcher stopped");
            Ok::<(), TrackerError>(())
        }
        .instrument(span)
        .await
    }

    /// One scan; every new txid waits for maturity and is claimed once
    pub async fn process_cycle(&self, shutdown: &Shutdown) -> Result<CycleReport, TrackerError> {
        let addresses = self.watched_addresses().await?;
        let candidates = self.scanner.scan(&addresses).await;
        let mut report = CycleReport {
            scanned: candidates.len(),
            reports: Vec::new(),
        };

        for candidate in candidates {
            if !self.seen.mark_seen(candidate.txid()).await? {
                continue;
            }

            log_deposit_event(
                "deposit_detected",
                candidate.txid(),
                candidate.utxo.value_sats,
                candidate.confirmations,
                self.config.required_confirmations,
            );

            let confirmations = match self.wait_for_confirmations(&candidate, shutdown).await {
                Ok(c) => c,
                Err(Cancelled) => {
                    self.seen.set_status(candidate.txid(), SeenStatus::Cancelled).await?;
                    report
                        .reports
                        .push(CandidateReport::new(&candidate, CandidateOutcome::Cancelled));
                    break;
                }
            };

            log_deposit_event(
                "deposit_mature",
                candidate.txid(),
                candidate.utxo.value_sats,
                confirmations,
                self.config.required_confirmations,
            );

            let outcome = self.claim_candidate(&candidate).await;
            self.record_outcome(candidate.txid(), &outcome).await?;
            report.reports.push(CandidateReport::new(&candidate, outcome));
        }

        Ok(report)
    }

    /// Claim every matured candidate now; immature ones are reported as pending
    ///
    /// Matured candidates are claimed single-use addresses first, then by
    /// confirmation depth, deepest first.
    pub async fn run_once(&self) -> Result<CycleReport, TrackerError> {
        let addresses = self.watched_addresses().await?;
        let candidates = self.scanner.scan(&addresses).await;
        let required = self.config.required_confirmations;

        let mut report = CycleReport {
            scanned: candidates.len(),
            reports: Vec::new(),
        };

        let (mut matured, pending): (Vec<DepositCandidate>, Vec<DepositCandidate>) = candidates
            .into_iter()
            .partition(|c| is_mature(c.confirmations, required));

        for candidate in &pending {
            log_deposit_event(
                "deposit_pending",
                candidate.txid(),
                candidate.utxo.value_sats,
                candidate.confirmations,
                required,
            );
            report.reports.push(CandidateReport::new(
                candidate,
                CandidateOutcome::Pending {
                    confirmations: candidate.confirmations,
                    required,
                },
            ));
        }

        matured.sort_by(|a, b| match (a.kind, b.kind) {
            (AddressKind::Active, AddressKind::Static) => std::cmp::Ordering::Less,
            (AddressKind::Static, AddressKind::Active) => std::cmp::Ordering::Greater,
            _ => b.confirmations.cmp(&a.confirmations),
        });

        for candidate in matured {
            if !self.seen.mark_seen(candidate.txid()).await? {
                debug!(txid = %candidate.txid(), "already handled in this run");
                continue;
            }
            let outcome = self.claim_candidate(&candidate).await;
            self.record_outcome(candidate.txid(), &outcome).await?;
            report.reports.push(CandidateReport::new(&candidate, outcome));
        }

        Ok(report)
    }

    /// Claim one operator-specified deposit
    pub async fn claim_single(&self, mut deposit: DepositRef) -> Result<ClaimSuccess, TrackerError> {
        if deposit.tx_hex.is_none() {
            deposit.tx_hex = self.chain.get_tx_hex(&deposit.txid).await;
        }
        Ok(self.claimer.claim(&deposit).await?)
    }

    /// Snapshot of every deposit on the watched addresses
    pub async fn status_report(&self) -> Result<DepositStatusReport, TrackerError> {
        let addresses = self.watched_addresses().await?;
        let required = self.config.required_confirmations;
        let deposits = self
            .scanner
            .scan(&addresses)
            .await
            .into_iter()
            .map(|c| DepositStatusEntry::new(c, required))
            .collect();

        Ok(DepositStatusReport {
            network: self.network.clone(),
            min_confirmations: required,
            addresses,
            deposits,
        })
    }

    async fn wait_for_confirmations(
        &self,
        candidate: &DepositCandidate,
        shutdown: &Shutdown,
    ) -> Result<u32, Cancelled> {
        let required = self.config.required_confirmations;
        let mut confirmations = candidate.confirmations;

        while !is_mature(confirmations, required) {
            info!(
                txid = %candidate.txid(),
                confirmations,
                required,
                "waiting for confirmations"
            );
            shutdown.sleep(self.config.confirmation_poll_interval).await?;
            confirmations = self.chain.get_confirmations(candidate.txid()).await;
        }

        Ok(confirmations)
    }

    async fn claim_candidate(&self, candidate: &DepositCandidate) -> CandidateOutcome {
        let tx_hex = self.chain.get_tx_hex(candidate.txid()).await;
        if tx_hex.is_none() {
            debug!(txid = %candidate.txid(), "raw hex unavailable, claiming by txid only");
        }
        let deposit = DepositRef::from_txid(candidate.txid(), Some(candidate.utxo.vout)).with_hex(tx_hex);

        match self.claimer.claim_for(candidate.kind, &deposit).await {
            Ok(success) => {
                info!(txid = %candidate.txid(), method = %success.method, "deposit claimed");
                CandidateOutcome::Claimed {
                    method: success.method.wire_name().to_string(),
                    attempts: success.attempts,
                }
            }
            Err(e) => {
                warn!(txid = %candidate.txid(), error = %e, "claim failed");
                CandidateOutcome::ClaimFailed {
                    error: e.to_string(),
                    failures: e.failures().iter().map(ToString::to_string).collect(),
                }
            }
        }
    }

    async fn record_outcome(&self, txid: &str, outcome: &CandidateOutcome) -> Result<(), StorageError> {
        let status = match outcome {
            CandidateOutcome::Claimed { method, .. } => SeenStatus::Claimed {
                method: method.clone(),
            },
            CandidateOutcome::ClaimFailed { error, .. } => SeenStatus::Failed {
                error: error.clone(),
            },
            CandidateOutcome::Cancelled => SeenStatus::Cancelled,
            CandidateOutcome::Pending { .. } => SeenStatus::Waiting,
        };
        self.seen.set_status(txid, status).await
    }

    /// Hand claiming to the wallet's own loop when it has one
    async fn try_start_periodic_claim(&self) -> bool {
        let supported = match self.claimer.capabilities().await {
            Ok(caps) => caps.supports(methods::START_PERIODIC_CLAIM_TRANSFERS),
            Err(e) => {
                debug!(error = %e, "capabilities unavailable, skipping periodic claim");
                false
            }
        };
        if !supported {
            return false;
        }

        let interval_ms = self.config.confirmation_poll_interval.as_millis() as u64;
        let mut last_error = None;
        for options in PeriodicClaimOptions::candidates(interval_ms, self.config.max_fee_sats) {
            match self.wallet.start_periodic_claim(options).await {
                Ok(()) => return true,
                Err(e) => last_error = Some(e),
            }
        }

        if let Some(e) = last_error {
            warn!(error = %e, "could not start periodic auto-claim, falling back to explorer polling");
        }
        false
    }
}
