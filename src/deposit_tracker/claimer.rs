//! Claim Executor
//!
//! Turns a matured deposit into a credited wallet balance. The wallet
//! advertises which claim methods it exposes; the executor walks an ordered
//! list of claim calls, skips the ones the wallet does not support and
//! stops at the first success.
//!
//! Ordering, outermost key first:
//! 1. raw-hex reference before txid reference (hex only when fetched)
//! 2. no explicit fee before fee-qualified
//! 3. static-deposit methods, then generic, then taproot
//! 4. bare arguments before a structured request object

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::types::{AddressKind, ClaimStrategy, DepositRef};
use crate::common::logging::log_claim_attempt;
use crate::wallet::{
    methods, ClaimArgs, ClaimCall, ClaimMethod, ClaimRef, DepositWallet, WalletCapabilities,
    WalletError,
};

const NO_FEE_METHODS: [ClaimMethod; 3] = [
    ClaimMethod::ClaimStaticDeposit,
    ClaimMethod::ClaimDeposit,
    ClaimMethod::ClaimTaprootDeposit,
];

const FEE_METHODS: [ClaimMethod; 3] = [
    ClaimMethod::ClaimStaticDepositWithMaxFee,
    ClaimMethod::ClaimDeposit,
    ClaimMethod::ClaimTaprootDepositWithMaxFee,
];

/// One failed claim call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimFailure {
    pub call: String,
    pub error: String,
}

impl std::fmt::Display for ClaimFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.call, self.error)
    }
}

/// Claim executor errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClaimError {
    #[error("No compatible claim method")]
    NoCompatibleMethod,

    /// Every applicable call failed; `last` is the final attempt's message
    #[error("{last}")]
    Exhausted {
        last: String,
        failures: Vec<ClaimFailure>,
    },

    #[error("capability discovery failed: {0}")]
    Capabilities(#[from] WalletError),
}

impl ClaimError {
    /// Every failed attempt, in call order
    pub fn failures(&self) -> &[ClaimFailure] {
        match self {
            ClaimError::Exhausted { failures, .. } => failures,
            _ => &[],
        }
    }
}

/// Successful claim
#[derive(Debug, Clone, Serialize)]
pub struct ClaimSuccess {
    pub method: ClaimMethod,
    pub call: String,
    /// Calls issued, including the successful one
    pub attempts: usize,
    pub result: serde_json::Value,
}

/// Ordered, de-duplicated claim calls for a deposit
pub fn claim_candidates(deposit: &DepositRef, max_fee: Option<u64>) -> Vec<ClaimCall> {
    let mut references = Vec::with_capacity(2);
    if let Some(hex) = deposit.tx_hex.as_ref().filter(|h| !h.is_empty()) {
        references.push(ClaimRef::TxHex(hex.clone()));
    }
    if !deposit.txid.is_empty() {
        references.push(ClaimRef::TransactionId(deposit.txid.clone()));
    }

    let mut calls = Vec::new();
    for reference in references {
        let output_index = match reference {
            ClaimRef::TransactionId(_) => deposit.vout,
            ClaimRef::TxHex(_) => None,
        };

        for method in NO_FEE_METHODS {
            calls.push(ClaimCall::new(method, ClaimArgs::Reference(reference.clone())));
            calls.push(ClaimCall::new(
                method,
                ClaimArgs::Request {
                    reference: reference.clone(),
                    max_fee: None,
                    output_index,
                },
            ));
        }

        if let Some(fee) = max_fee {
            for method in FEE_METHODS {
                calls.push(ClaimCall::new(
                    method,
                    ClaimArgs::ReferenceWithFee(reference.clone(), fee),
                ));
                calls.push(ClaimCall::new(
                    method,
                    ClaimArgs::Request {
                        reference: reference.clone(),
                        max_fee: Some(fee),
                        output_index,
                    },
                ));
            }
        }
    }

    let mut unique = HashSet::new();
    calls.retain(|call| unique.insert(call.clone()));
    calls
}

/// Claims deposits against the wallet collaborator
pub struct ClaimExecutor {
    wallet: Arc<dyn DepositWallet>,
    max_fee: Option<u64>,
    strategy: ClaimStrategy,
    capabilities: OnceCell<WalletCapabilities>,
}

impl ClaimExecutor {
    pub fn new(wallet: Arc<dyn DepositWallet>, max_fee: Option<u64>, strategy: ClaimStrategy) -> Self {
        Self {
            wallet,
            max_fee,
            strategy,
            capabilities: OnceCell::new(),
        }
    }

    /// Wallet capabilities, discovered once
    pub async fn capabilities(&self) -> Result<&WalletCapabilities, ClaimError> {
        let caps = self
            .capabilities
            .get_or_try_init(|| async {
                let caps = self.wallet.capabilities().await?;
                debug!(claim_methods = ?caps.claim_methods(), "wallet capabilities discovered");
                Ok::<_, WalletError>(caps)
            })
            .await?;
        Ok(caps)
    }

    /// Claim a deposit found at an address of the given kind
    pub async fn claim_for(&self, kind: AddressKind, deposit: &DepositRef) -> Result<ClaimSuccess, ClaimError> {
        let caps = self.capabilities().await?;
        if self.strategy == ClaimStrategy::Quote
            && kind == AddressKind::Static
            && caps.supports(methods::GET_CLAIM_STATIC_DEPOSIT_QUOTE)
            && caps.supports_claim(ClaimMethod::ClaimStaticDeposit)
        {
            return self.claim_with_quote(deposit).await;
        }
        self.claim(deposit).await
    }

    /// Walk the ordered call list until one succeeds
    pub async fn claim(&self, deposit: &DepositRef) -> Result<ClaimSuccess, ClaimError> {
        let caps = self.capabilities().await?;
        let calls: Vec<ClaimCall> = claim_candidates(deposit, self.max_fee)
            .into_iter()
            .filter(|call| caps.supports_claim(call.method))
            .collect();

        let result = self.attempt(calls).await;
        self.log_result(deposit, &result);
        result
    }

    /// Static deposit: fetch a credit quote, then claim with it
    pub async fn claim_with_quote(&self, deposit: &DepositRef) -> Result<ClaimSuccess, ClaimError> {
        let quote = match self
            .wallet
            .get_claim_static_deposit_quote(&deposit.txid, deposit.vout)
            .await
        {
            Ok(quote) => quote,
            Err(e) => {
                let failure = ClaimFailure {
                    call: methods::GET_CLAIM_STATIC_DEPOSIT_QUOTE.to_string(),
                    error: e.to_string(),
                };
                let result = Err(ClaimError::Exhausted {
                    last: failure.error.clone(),
                    failures: vec![failure],
                });
                self.log_result(deposit, &result);
                return result;
            }
        };

        info!(
            txid = %deposit.txid,
            credit_amount_sats = quote.credit_amount_sats,
            "static deposit quote received"
        );

        let call = ClaimCall::new(ClaimMethod::ClaimStaticDeposit, ClaimArgs::Quoted(quote));
        let result = self.attempt(vec![call]).await;
        self.log_result(deposit, &result);
        result
    }

    async fn attempt(&self, calls: Vec<ClaimCall>) -> Result<ClaimSuccess, ClaimError> {
        let mut failures: Vec<ClaimFailure> = Vec::new();

        for call in calls {
            let described = call.describe();
            match self.wallet.invoke_claim(&call).await {
                Ok(result) => {
                    return Ok(ClaimSuccess {
                        method: call.method,
                        call: described,
                        attempts: failures.len() + 1,
                        result,
                    })
                }
                Err(WalletError::MethodUnavailable(_)) => {
                    debug!(call = %described, "claim method not exposed, skipping");
                }
                Err(e) => {
                    debug!(call = %described, error = %e, "claim call failed");
                    failures.push(ClaimFailure {
                        call: described,
                        error: e.to_string(),
                    });
                }
            }
        }

        match failures.last() {
            Some(last) => Err(ClaimError::Exhausted {
                last: last.error.clone(),
                failures,
            }),
            None => Err(ClaimError::NoCompatibleMethod),
        }
    }

    fn log_result(&self, deposit: &DepositRef, result: &Result<ClaimSuccess, ClaimError>) {
        match result {
            Ok(success) => {
                log_claim_attempt(&deposit.txid, Some(success.method.wire_name()), success.attempts, None)
            }
            Err(e) => {
                for failure in e.failures() {
                    warn!(txid = %deposit.txid, call = %failure.call, error = %failure.error, "claim attempt failed");
                }
                log_claim_attempt(&deposit.txid, None, e.failures().len(), Some(&e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::{MockDepositWallet, StaticDepositQuote};

    fn hex_deposit() -> DepositRef {
        DepositRef::from_txid("aa".repeat(32), Some(0)).with_hex(Some("02".repeat(120)))
    }

    fn all_claim_methods() -> WalletCapabilities {
        WalletCapabilities::from_methods([
            "claimDeposit",
            "claimStaticDeposit",
            "claimTaprootDeposit",
            "claimStaticDepositWithMaxFee",
            "claimTaprootDepositWithMaxFee",
        ])
    }

    #[test]
    fn test_candidate_order() {
        let calls = claim_candidates(&hex_deposit(), Some(2_000));
        assert_eq!(calls.len(), 24);

        let described: Vec<String> = calls.iter().map(ClaimCall::describe).collect();
        assert_eq!(described[0], "claimStaticDeposit(hex)");
        assert_eq!(described[1], "claimStaticDeposit({}hex)");
        assert_eq!(described[2], "claimDeposit(hex)");
        assert_eq!(described[4], "claimTaprootDeposit(hex)");
        assert_eq!(described[6], "claimStaticDepositWithMaxFee(hex+fee)");
        assert_eq!(described[8], "claimDeposit(hex+fee)");
        assert_eq!(described[10], "claimTaprootDepositWithMaxFee(hex+fee)");
        assert_eq!(described[12], "claimStaticDeposit(txid)");
        assert_eq!(described[23], "claimTaprootDepositWithMaxFee({}txid+fee)");

        // Every hex call precedes every txid call; no-fee precedes fee within a reference
        let first_txid = calls
            .iter()
            .position(|c| matches!(&c.args, ClaimArgs::Reference(ClaimRef::TransactionId(_))))
            .unwrap();
        assert!(calls[..first_txid].iter().all(|c| !c.describe().contains("txid")));
    }

    #[test]
    fn test_candidates_without_hex_or_fee() {
        let deposit = DepositRef::from_txid("bb".repeat(32), None);
        let calls = claim_candidates(&deposit, None);
        assert_eq!(calls.len(), 6);
        assert!(calls.iter().all(|c| !c.args.has_fee()));

        let unique: HashSet<_> = calls.iter().collect();
        assert_eq!(unique.len(), calls.len());
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let mut wallet = MockDepositWallet::new();
        wallet.expect_capabilities().times(1).returning(|| Ok(all_claim_methods()));
        wallet
            .expect_invoke_claim()
            .times(3)
            .returning(|call| match call.describe().as_str() {
                "claimDeposit(hex)" => Ok(serde_json::json!({"ok": true})),
                _ => Err(WalletError::Rejected(format!("{} rejected", call.method))),
            });

        let executor = ClaimExecutor::new(Arc::new(wallet), Some(2_000), ClaimStrategy::Probe);
        let success = executor.claim(&hex_deposit()).await.unwrap();
        assert_eq!(success.method, ClaimMethod::ClaimDeposit);
        assert_eq!(success.attempts, 3);

        // Capabilities are cached
        executor.capabilities().await.unwrap();
    }

    #[tokio::test]
    async fn test_unsupported_methods_are_skipped() {
        let mut wallet = MockDepositWallet::new();
        wallet
            .expect_capabilities()
            .returning(|| Ok(WalletCapabilities::from_methods(["claimTaprootDeposit"])));
        wallet
            .expect_invoke_claim()
            .times(1)
            .returning(|call| {
                assert_eq!(call.method, ClaimMethod::ClaimTaprootDeposit);
                Ok(serde_json::Value::Null)
            });

        let executor = ClaimExecutor::new(Arc::new(wallet), Some(2_000), ClaimStrategy::Probe);
        let success = executor.claim(&hex_deposit()).await.unwrap();
        assert_eq!(success.attempts, 1);
    }

    #[tokio::test]
    async fn test_no_compatible_method() {
        let mut wallet = MockDepositWallet::new();
        wallet
            .expect_capabilities()
            .returning(|| Ok(WalletCapabilities::from_methods(["getBalance"])));
        wallet.expect_invoke_claim().never();

        let executor = ClaimExecutor::new(Arc::new(wallet), Some(2_000), ClaimStrategy::Probe);
        let err = executor.claim(&hex_deposit()).await.unwrap_err();
        assert!(matches!(err, ClaimError::NoCompatibleMethod));
        assert_eq!(err.to_string(), "No compatible claim method");
    }

    #[tokio::test]
    async fn test_exhausted_keeps_every_failure() {
        let mut wallet = MockDepositWallet::new();
        wallet
            .expect_capabilities()
            .returning(|| Ok(WalletCapabilities::from_methods(["claimStaticDeposit"])));
        let mut n = 0;
        wallet.expect_invoke_claim().times(4).returning(move |_| {
            n += 1;
            Err(WalletError::Rejected(format!("failure {}", n)))
        });

        let executor = ClaimExecutor::new(Arc::new(wallet), Some(2_000), ClaimStrategy::Probe);
        let err = executor.claim(&hex_deposit()).await.unwrap_err();
        assert_eq!(err.to_string(), "failure 4");
        assert_eq!(err.failures().len(), 4);
        assert_eq!(err.failures()[0].error, "failure 1");
    }

    #[tokio::test]
    async fn test_quote_strategy_for_static_deposits() {
        let mut wallet = MockDepositWallet::new();
        wallet.expect_capabilities().returning(|| {
            Ok(WalletCapabilities::from_methods([
                "claimStaticDeposit",
                "getClaimStaticDepositQuote",
            ]))
        });
        wallet
            .expect_get_claim_static_deposit_quote()
            .times(1)
            .returning(|txid, vout| {
                Ok(StaticDepositQuote {
                    transaction_id: txid.to_string(),
                    output_index: vout.unwrap_or(0),
                    credit_amount_sats: 49_500,
                    signature: "sig".into(),
                })
            });
        wallet.expect_invoke_claim().times(1).returning(|call| {
            assert!(matches!(call.args, ClaimArgs::Quoted(_)));
            Ok(serde_json::json!({"credited": 49_500}))
        });

        let executor = ClaimExecutor::new(Arc::new(wallet), Some(2_000), ClaimStrategy::Quote);
        let success = executor
            .claim_for(AddressKind::Static, &hex_deposit())
            .await
            .unwrap();
        assert_eq!(success.call, "claimStaticDeposit(quote)");
    }

    #[tokio::test]
    async fn test_quote_failure_is_reported() {
        let mut wallet = MockDepositWallet::new();
        wallet.expect_capabilities().returning(|| {
            Ok(WalletCapabilities::from_methods([
                "claimStaticDeposit",
                "getClaimStaticDepositQuote",
            ]))
        });
        wallet
            .expect_get_claim_static_deposit_quote()
            .returning(|_, _| Err(WalletError::Rejected("utxo already claimed".into())));
        wallet.expect_invoke_claim().never();

        let executor = ClaimExecutor::new(Arc::new(wallet), Some(2_000), ClaimStrategy::Quote);
        let err = executor
            .claim_for(AddressKind::Static, &hex_deposit())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "utxo already claimed");
        assert_eq!(err.failures()[0].call, "getClaimStaticDepositQuote");
    }
}
