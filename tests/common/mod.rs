//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;
use wallet_bridge::host::{HostEvent, MemoryHost, PeerReply, PeerRequest};
use wallet_bridge::protocol::{PaymentTxn, TxnHeader};
use wallet_bridge::{SingleFlightPolicy, Transaction, Wallet};

pub const FRAME_URL: &str = "https://wallet.example.com/bridge";

/// Installs a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A well-behaved wallet UI: loads at once and approves everything.
pub fn approving_wallet(request: &PeerRequest) -> PeerReply {
    match request.method.as_str() {
        "status" => PeerReply::success(json!({ "isLocked": false })),
        "unlock" => PeerReply::success(json!({ "accounts": ["ADDR1", { "address": "ADDR2" }] })),
        "transaction" => PeerReply::success(sign(request.param("txn").unwrap_or(&Value::Null))),
        "logicsig" => PeerReply::success(json!({ "signedTeal": "c2lnbmVk" })),
        _ => PeerReply::error("Unsupported method"),
    }
}

/// Signs a single transaction object or an array of them.
pub fn sign(txn: &Value) -> Value {
    match txn {
        Value::Array(txns) => Value::Array(txns.iter().map(sign_one).collect()),
        other => sign_one(other),
    }
}

fn sign_one(txn: &Value) -> Value {
    let amount = txn["amount"].as_u64().unwrap_or_default();
    json!({ "txID": format!("TX{amount}"), "blob": "AQID" })
}

/// Builds a popup wallet with fast load probing.
pub fn wallet<F>(policy: SingleFlightPolicy, peer: F) -> (Arc<MemoryHost>, Wallet)
where
    F: Fn(&PeerRequest) -> PeerReply + Send + Sync + 'static,
{
    init_tracing();
    let (host, inbound) = MemoryHost::with_peer(peer);
    let wallet = Wallet::builder()
        .frame_url(FRAME_URL)
        .single_flight(policy)
        .build(host.clone(), inbound)
        .expect("wallet");
    (host, wallet)
}

/// A payment of `amount` microalgos.
pub fn payment(amount: u64) -> Transaction {
    Transaction::Payment(PaymentTxn {
        header: TxnHeader {
            from: "SENDER".into(),
            fee: 1000,
            first_round: 100,
            last_round: 1100,
            genesis_id: "testnet-v1.0".into(),
            genesis_hash: "SGO1GKSzyE7IEPItTxCByw9x8FmnrCDexi9/cOUJOiI=".into(),
            ..Default::default()
        },
        to: "RECEIVER".into(),
        amount,
        close_remainder_to: None,
    })
}

/// Number of popups the host opened.
pub fn opened(host: &MemoryHost) -> usize {
    host.events()
        .iter()
        .filter(|e| matches!(e, HostEvent::Opened { .. }))
        .count()
}

/// Lets spawned tasks and delayed replies run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
