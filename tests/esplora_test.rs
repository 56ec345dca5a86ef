//! ChainDataClient against an in-process explorer

mod mocks;

use flashclaim::deposit_tracker::{AddressKind, DepositScanner, UnknownOutspendPolicy, WatchedAddress};
use flashclaim::esplora::{ChainDataClient, ChainSource, Endpoint, Utxo};
use mocks::explorer::FakeExplorer;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;

const TXID: &str = "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";
const ADDRESS: &str = "bcrt1qhistory";

fn raw_tx() -> String {
    format!("02000000{}", "ab".repeat(60))
}

#[tokio::test]
async fn test_utxos_fail_over_to_next_endpoint() {
    let down = FakeExplorer::spawn().await;
    down.fail();
    let up = FakeExplorer::spawn().await;
    up.state.set_utxos(
        "bcrt1qaddr",
        json!([{ "txid": TXID, "vout": 1, "value": 50000, "status": { "confirmed": true } }]),
    );

    let client = ChainDataClient::new(vec![Endpoint::new(&down.base_url), Endpoint::new(&up.base_url)]);
    let utxos = client.list_utxos("bcrt1qaddr").await;

    assert_eq!(utxos.len(), 1);
    assert_eq!(utxos[0].txid, TXID);
    assert_eq!(utxos[0].vout, 1);
    assert_eq!(utxos[0].value_sats, 50_000);
    assert!(down.state.hits() >= 1);
}

#[tokio::test]
async fn test_all_endpoints_down_yields_unavailable() {
    let a = FakeExplorer::spawn().await;
    let b = FakeExplorer::spawn().await;
    a.fail();
    b.fail();

    let client = ChainDataClient::from_urls(&[a.base_url.as_str(), b.base_url.as_str()]);
    assert!(client.list_utxos("bcrt1qaddr").await.is_empty());
    assert_eq!(client.get_confirmations(TXID).await, 0);
    assert_eq!(client.get_tx_hex(TXID).await, None);
    assert_eq!(client.get_outspends(TXID).await, None);
}

#[tokio::test]
async fn test_confirmations_against_tip() {
    let explorer = FakeExplorer::spawn().await;
    explorer.state.tip.store(105, Ordering::SeqCst);
    explorer
        .state
        .set_status(TXID, json!({ "confirmed": true, "block_height": 103 }));
    explorer.state.set_status("unconfirmed", json!({ "confirmed": false }));
    explorer
        .state
        .set_status("future", json!({ "confirmed": true, "block_height": 200 }));

    let client = ChainDataClient::from_urls(&[explorer.base_url.as_str()]);
    assert_eq!(client.get_confirmations(TXID).await, 3);
    assert_eq!(client.get_confirmations("unconfirmed").await, 0);
    assert_eq!(client.get_confirmations("future").await, 0);
    assert_eq!(client.get_tip_height().await, Some(105));
}

#[tokio::test]
async fn test_raw_hex_rejects_error_pages_and_uses_json_body() {
    let explorer = FakeExplorer::spawn().await;
    explorer
        .state
        .set_hex(TXID, "<html><body>rate limited</body></html>");
    explorer.state.set_tx(TXID, json!({ "txid": TXID, "hex": raw_tx() }));

    let client = ChainDataClient::from_urls(&[explorer.base_url.as_str()]);
    assert_eq!(client.get_tx_hex(TXID).await, Some(raw_tx()));
}

#[tokio::test]
async fn test_raw_hex_plain_text_endpoint() {
    let explorer = FakeExplorer::spawn().await;
    explorer.state.set_hex(TXID, &raw_tx());

    let client = ChainDataClient::from_urls(&[explorer.base_url.as_str()]);
    assert_eq!(client.get_tx_hex(TXID).await, Some(raw_tx()));
}

fn paying_history() -> serde_json::Value {
    json!([{
        "txid": TXID,
        "vout": [
            { "scriptpubkey_address": ADDRESS, "value": 1000 },
            { "address": ADDRESS, "value": 2000 },
            { "scriptpubkey_address": "bcrt1qother", "value": 5 }
        ]
    }])
}

#[tokio::test]
async fn test_scanner_rebuilds_unspent_from_history() {
    let explorer = FakeExplorer::spawn().await;
    explorer.state.set_utxos(ADDRESS, json!([]));
    explorer.state.set_address_txs(ADDRESS, paying_history());
    explorer
        .state
        .set_outspends(TXID, json!([{ "spent": true }, { "spent": false }, { "spent": false }]));

    let client = ChainDataClient::from_urls(&[explorer.base_url.as_str()]);
    let scanner = DepositScanner::new(Arc::new(client), UnknownOutspendPolicy::Exclude);
    let candidates = scanner
        .scan(&[WatchedAddress::new(AddressKind::Static, ADDRESS)])
        .await;

    assert_eq!(candidates.len(), 1);
    assert_eq!(
        candidates[0].utxo,
        Utxo {
            txid: TXID.to_string(),
            vout: 1,
            value_sats: 2_000,
        }
    );
    assert_eq!(candidates[0].address, ADDRESS);
}

#[tokio::test]
async fn test_history_output_without_spent_flag_is_excluded() {
    let explorer = FakeExplorer::spawn().await;
    explorer.state.set_address_txs(ADDRESS, paying_history());
    explorer
        .state
        .set_outspends(TXID, json!([{ "spent": false }, { "status": "unknown" }]));

    let client = ChainDataClient::from_urls(&[explorer.base_url.as_str()]);
    let scanner = DepositScanner::new(Arc::new(client), UnknownOutspendPolicy::Exclude);
    let utxos = scanner.reconstruct_unspent(ADDRESS).await;

    assert_eq!(utxos.len(), 1);
    assert_eq!(utxos[0].vout, 0);
}

#[tokio::test]
async fn test_outspends_fail_over_to_next_endpoint() {
    let first = FakeExplorer::spawn().await;
    first.fail_outspends();
    first.state.set_address_txs(ADDRESS, paying_history());
    let second = FakeExplorer::spawn().await;
    second
        .state
        .set_outspends(TXID, json!([{ "spent": true }, { "spent": false }, {}]));

    let client = ChainDataClient::from_urls(&[first.base_url.as_str(), second.base_url.as_str()]);

    let history = client.list_address_txs(ADDRESS).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].outputs[1].address.as_deref(), Some(ADDRESS));
    assert_eq!(history[0].outputs[1].value_sats, 2_000);

    let first_hits = first.state.hits();
    let second_hits = second.state.hits();
    assert_eq!(
        client.get_outspends(TXID).await,
        Some(vec![Some(true), Some(false), None])
    );
    assert_eq!(first.state.hits(), first_hits + 1);
    assert_eq!(second.state.hits(), second_hits + 1);
}
