//! In-process fake block explorer
//!
//! Serves the Esplora routes the chain client reads from a mutable state so
//! tests can script responses and flip the whole endpoint into failure.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::task::JoinHandle;

#[derive(Default)]
pub struct ExplorerState {
    pub failing: AtomicBool,
    /// Only `/tx/:txid/outspends` answers 500
    pub outspends_failing: AtomicBool,
    pub tip: AtomicU64,
    pub hits: AtomicUsize,
    pub utxos: Mutex<HashMap<String, Value>>,
    pub statuses: Mutex<HashMap<String, Value>>,
    pub hex: Mutex<HashMap<String, String>>,
    pub txs: Mutex<HashMap<String, Value>>,
    pub address_txs: Mutex<HashMap<String, Value>>,
    pub outspends: Mutex<HashMap<String, Value>>,
}

impl ExplorerState {
    pub fn set_utxos(&self, address: &str, utxos: Value) {
        self.utxos.lock().unwrap().insert(address.to_string(), utxos);
    }

    pub fn set_status(&self, txid: &str, status: Value) {
        self.statuses.lock().unwrap().insert(txid.to_string(), status);
    }

    pub fn set_hex(&self, txid: &str, body: &str) {
        self.hex.lock().unwrap().insert(txid.to_string(), body.to_string());
    }

    pub fn set_tx(&self, txid: &str, body: Value) {
        self.txs.lock().unwrap().insert(txid.to_string(), body);
    }

    pub fn set_address_txs(&self, address: &str, txs: Value) {
        self.address_txs.lock().unwrap().insert(address.to_string(), txs);
    }

    pub fn set_outspends(&self, txid: &str, outspends: Value) {
        self.outspends.lock().unwrap().insert(txid.to_string(), outspends);
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    fn gate(&self) -> Option<Response> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            Some(StatusCode::INTERNAL_SERVER_ERROR.into_response())
        } else {
            None
        }
    }
}

type Shared = State<Arc<ExplorerState>>;

async fn tip(State(state): Shared) -> Response {
    if let Some(resp) = state.gate() {
        return resp;
    }
    state.tip.load(Ordering::SeqCst).to_string().into_response()
}

async fn utxos(State(state): Shared, Path(address): Path<String>) -> Response {
    if let Some(resp) = state.gate() {
        return resp;
    }
    let body = state.utxos.lock().unwrap().get(&address).cloned().unwrap_or_else(|| json!([]));
    Json(body).into_response()
}

async fn address_txs(State(state): Shared, Path(address): Path<String>) -> Response {
    if let Some(resp) = state.gate() {
        return resp;
    }
    let body = state.address_txs.lock().unwrap().get(&address).cloned().unwrap_or_else(|| json!([]));
    Json(body).into_response()
}

async fn outspends(State(state): Shared, Path(txid): Path<String>) -> Response {
    if let Some(resp) = state.gate() {
        return resp;
    }
    if state.outspends_failing.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    match state.outspends.lock().unwrap().get(&txid) {
        Some(body) => Json(body.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn status(State(state): Shared, Path(txid): Path<String>) -> Response {
    if let Some(resp) = state.gate() {
        return resp;
    }
    match state.statuses.lock().unwrap().get(&txid) {
        Some(body) => Json(body.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn hex(State(state): Shared, Path(txid): Path<String>) -> Response {
    if let Some(resp) = state.gate() {
        return resp;
    }
    match state.hex.lock().unwrap().get(&txid) {
        Some(body) => body.clone().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn tx(State(state): Shared, Path(txid): Path<String>) -> Response {
    if let Some(resp) = state.gate() {
        return resp;
    }
    match state.txs.lock().unwrap().get(&txid) {
        Some(body) => Json(body.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub struct FakeExplorer {
    pub base_url: String,
    pub state: Arc<ExplorerState>,
    handle: JoinHandle<()>,
}

impl FakeExplorer {
    pub async fn spawn() -> Self {
        let state = Arc::new(ExplorerState::default());
        let app = Router::new()
            .route("/blocks/tip/height", get(tip))
            .route("/address/:address/utxo", get(utxos))
            .route("/address/:address/txs", get(address_txs))
            .route("/tx/:txid/status", get(status))
            .route("/tx/:txid/hex", get(hex))
            .route("/tx/:txid/outspends", get(outspends))
            .route("/tx/:txid", get(tx))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}:{}", addr.ip(), addr.port());

        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url,
            state,
            handle,
        }
    }

    pub fn fail(&self) {
        self.state.failing.store(true, Ordering::SeqCst);
    }

    pub fn fail_outspends(&self) {
        self.state.outspends_failing.store(true, Ordering::SeqCst);
    }

    pub fn abort(self) {
        self.handle.abort();
    }
}
