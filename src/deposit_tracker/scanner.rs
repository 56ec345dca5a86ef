//! Deposit Scanner
//!
//! Enumerates outputs paying the watched addresses. The explorer's UTXO
//! index is tried first; when it returns nothing the scanner rebuilds the
//! unspent set from the address history plus outspend flags.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use super::types::{DepositCandidate, UnknownOutspendPolicy, WatchedAddress};
use crate::esplora::{ChainSource, Utxo};

/// Confirmation gate
pub fn is_mature(confirmations: u32, required: u32) -> bool {
    confirmations >= required
}

/// Read-only deposit scanner
#[derive(Clone)]
pub struct DepositScanner {
    chain: Arc<dyn ChainSource>,
    unknown_outspend: UnknownOutspendPolicy,
}

impl DepositScanner {
    pub fn new(chain: Arc<dyn ChainSource>, unknown_outspend: UnknownOutspendPolicy) -> Self {
        Self {
            chain,
            unknown_outspend,
        }
    }

    /// Current candidates for the given addresses, in address then output order.
    ///
    /// A `(txid, vout)` pair appears at most once per scan.
    pub async fn scan(&self, addresses: &[WatchedAddress]) -> Vec<DepositCandidate> {
        let mut outputs_seen: HashSet<(String, u32)> = HashSet::new();
        let mut confirmations: HashMap<String, u32> = HashMap::new();
        let mut candidates = Vec::new();

        for watched in addresses {
            let mut utxos = self.chain.list_utxos(&watched.address).await;
            if utxos.is_empty() {
                utxos = self.reconstruct_unspent(&watched.address).await;
            }

            for utxo in utxos {
                if !outputs_seen.insert((utxo.txid.clone(), utxo.vout)) {
                    continue;
                }

                let confs = match confirmations.get(&utxo.txid) {
                    Some(c) => *c,
                    None => {
                        let c = self.chain.get_confirmations(&utxo.txid).await;
                        confirmations.insert(utxo.txid.clone(), c);
                        c
                    }
                };

                candidates.push(DepositCandidate {
                    kind: watched.kind,
                    address: watched.address.clone(),
                    utxo,
                    confirmations: confs,
                });
            }
        }

        candidates
    }

    /// Unspent outputs to `address` rebuilt from its transaction history
    pub async fn reconstruct_unspent(&self, address: &str) -> Vec<Utxo> {
        let txs = self.chain.list_address_txs(address).await;
        let mut utxos = Vec::new();

        for tx in txs {
            let paying: Vec<(usize, u64)> = tx
                .outputs
                .iter()
                .enumerate()
                .filter(|(_, out)| out.address.as_deref() == Some(address))
                .map(|(i, out)| (i, out.value_sats))
                .collect();
            if paying.is_empty() {
                continue;
            }

            let outspends = self.chain.get_outspends(&tx.txid).await;
            if outspends.is_none() {
                debug!(
                    txid = %tx.txid,
                    policy = ?self.unknown_outspend,
                    "spend status unavailable"
                );
            }

            for (index, value_sats) in paying {
                let known = outspends
                    .as_ref()
                    .and_then(|flags| flags.get(index).copied().flatten());
                let spent = match known {
                    Some(spent) => spent,
                    None => {
                        if outspends.is_some() {
                            debug!(txid = %tx.txid, vout = index, "spend status missing for output");
                        }
                        self.unknown_outspend == UnknownOutspendPolicy::Exclude
                    }
                };
                if spent {
                    continue;
                }
                let Ok(vout) = u32::try_from(index) else {
                    continue;
                };
                utxos.push(Utxo {
                    txid: tx.txid.clone(),
                    vout,
                    value_sats,
                });
            }
        }

        utxos
    }
}
