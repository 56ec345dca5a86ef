//! Hand-written collaborator fakes

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use flashclaim::amm::types::{PoolFilter, SimulateRequest, SwapIntent, SwapQuote, SwapReceipt};
use flashclaim::amm::{AmmClient, AmmError, CurveType, PoolDescriptor};
use flashclaim::esplora::{AddressTx, ChainSource, Utxo};
use flashclaim::wallet::{
    ClaimCall, ClaimMethod, DepositWallet, PeriodicClaimOptions, StaticDepositQuote, WalletBalance,
    WalletCapabilities, WalletError,
};

// ============================================================================
// Wallet
// ============================================================================

pub struct FakeWallet {
    pub methods: Vec<String>,
    pub static_address: String,
    /// Claim calls succeed only for this method
    pub accepts: Option<ClaimMethod>,
    pub calls: Mutex<Vec<ClaimCall>>,
}

impl FakeWallet {
    pub fn new(methods: &[&str], accepts: Option<ClaimMethod>) -> Self {
        Self {
            methods: methods.iter().map(|m| m.to_string()).collect(),
            static_address: "bcrt1qstatic".to_string(),
            accepts,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<ClaimCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DepositWallet for FakeWallet {
    async fn capabilities(&self) -> Result<WalletCapabilities, WalletError> {
        Ok(WalletCapabilities::from_methods(self.methods.clone()))
    }

    async fn get_static_deposit_address(&self) -> Result<String, WalletError> {
        Ok(self.static_address.clone())
    }

    async fn query_static_deposit_addresses(&self) -> Result<Vec<String>, WalletError> {
        Ok(vec![self.static_address.clone()])
    }

    async fn get_unused_deposit_addresses(&self) -> Result<Vec<String>, WalletError> {
        Ok(Vec::new())
    }

    async fn get_identity_public_key(&self) -> Result<String, WalletError> {
        Ok("02".repeat(33))
    }

    async fn get_balance(&self) -> Result<WalletBalance, WalletError> {
        Ok(WalletBalance::default())
    }

    async fn invoke_claim(&self, call: &ClaimCall) -> Result<Value, WalletError> {
        self.calls.lock().unwrap().push(call.clone());
        if !self.methods.iter().any(|m| m == call.method.wire_name()) {
            return Err(WalletError::MethodUnavailable(call.method.wire_name().into()));
        }
        match self.accepts {
            Some(method) if method == call.method => Ok(json!({ "transferId": "t-1" })),
            _ => Err(WalletError::Rejected(format!("{} rejected arguments", call.method))),
        }
    }

    async fn get_claim_static_deposit_quote(
        &self,
        _txid: &str,
        _vout: Option<u32>,
    ) -> Result<StaticDepositQuote, WalletError> {
        Err(WalletError::MethodUnavailable("getClaimStaticDepositQuote".into()))
    }

    async fn start_periodic_claim(&self, _options: Option<PeriodicClaimOptions>) -> Result<(), WalletError> {
        Err(WalletError::MethodUnavailable("startPeriodicClaimTransfers".into()))
    }
}

// ============================================================================
// Chain
// ============================================================================

/// Chain with one UTXO per address and scripted confirmation depths
#[derive(Default)]
pub struct FakeChain {
    pub utxos: HashMap<String, Vec<Utxo>>,
    /// Depths returned in order; the last one repeats
    pub confirmations: Mutex<VecDeque<u32>>,
    pub tx_hex: Option<String>,
}

impl FakeChain {
    pub fn with_utxo(address: &str, txid: &str, value_sats: u64, depths: &[u32]) -> Self {
        let mut utxos = HashMap::new();
        utxos.insert(
            address.to_string(),
            vec![Utxo {
                txid: txid.to_string(),
                vout: 0,
                value_sats,
            }],
        );
        Self {
            utxos,
            confirmations: Mutex::new(depths.iter().copied().collect()),
            tx_hex: None,
        }
    }
}

#[async_trait]
impl ChainSource for FakeChain {
    async fn list_utxos(&self, address: &str) -> Vec<Utxo> {
        self.utxos.get(address).cloned().unwrap_or_default()
    }

    async fn list_address_txs(&self, _address: &str) -> Vec<AddressTx> {
        Vec::new()
    }

    async fn get_outspends(&self, _txid: &str) -> Option<Vec<Option<bool>>> {
        None
    }

    async fn get_confirmations(&self, _txid: &str) -> u32 {
        let mut depths = self.confirmations.lock().unwrap();
        if depths.len() > 1 {
            depths.pop_front().unwrap_or(0)
        } else {
            depths.front().copied().unwrap_or(0)
        }
    }

    async fn get_tx_hex(&self, _txid: &str) -> Option<String> {
        self.tx_hex.clone()
    }
}

// ============================================================================
// AMM
// ============================================================================

pub fn pool(lp_key: &str, asset_a: &str, asset_b: &str, curve: CurveType) -> PoolDescriptor {
    PoolDescriptor {
        pool_id: lp_key.to_string(),
        asset_a_address: asset_a.to_string(),
        asset_b_address: asset_b.to_string(),
        curve_type: Some(curve),
        lp_public_key: lp_key.to_string(),
        host_name: None,
        created_at: None,
    }
}

pub struct FakeAmm {
    pub pools: Vec<PoolDescriptor>,
    /// Simulated output per pool; an error string is returned as a rejection
    pub quotes: HashMap<String, Result<u128, String>>,
    pub balance_sats: u64,
    pub executed: Mutex<Vec<SwapIntent>>,
}

impl FakeAmm {
    pub fn new(pools: Vec<PoolDescriptor>, balance_sats: u64) -> Self {
        Self {
            pools,
            quotes: HashMap::new(),
            balance_sats,
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn quote(mut self, pool_id: &str, result: Result<u128, &str>) -> Self {
        self.quotes.insert(pool_id.to_string(), result.map_err(str::to_string));
        self
    }

    pub fn executed(&self) -> Vec<SwapIntent> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl AmmClient for FakeAmm {
    async fn authenticate(&self) -> Result<(), AmmError> {
        Ok(())
    }

    async fn list_pools(&self, filter: &PoolFilter) -> Result<Vec<PoolDescriptor>, AmmError> {
        Ok(self
            .pools
            .iter()
            .filter(|p| filter.asset_a_address.as_ref().map_or(true, |a| &p.asset_a_address == a))
            .filter(|p| filter.asset_b_address.as_ref().map_or(true, |b| &p.asset_b_address == b))
            .take(filter.limit as usize)
            .cloned()
            .collect())
    }

    async fn get_pool(&self, pool_id: &str) -> Result<PoolDescriptor, AmmError> {
        self.pools
            .iter()
            .find(|p| p.lp_public_key == pool_id)
            .cloned()
            .ok_or_else(|| AmmError::NotFound(pool_id.to_string()))
    }

    async fn simulate_swap(&self, request: &SimulateRequest) -> Result<SwapQuote, AmmError> {
        match self.quotes.get(&request.pool_id) {
            Some(Ok(amount_out)) => Ok(SwapQuote {
                amount_out: *amount_out,
            }),
            Some(Err(message)) => Err(AmmError::Rejected(message.clone())),
            None => Ok(SwapQuote { amount_out: 0 }),
        }
    }

    async fn execute_swap(&self, intent: &SwapIntent) -> Result<SwapReceipt, AmmError> {
        self.executed.lock().unwrap().push(intent.clone());
        Ok(SwapReceipt {
            request_id: format!("swap-{}", intent.pool_id),
            accepted: true,
        })
    }

    async fn get_balance(&self) -> Result<WalletBalance, AmmError> {
        Ok(WalletBalance {
            balance_sats: self.balance_sats,
            tokens: Vec::new(),
        })
    }
}
