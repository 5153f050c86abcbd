//! Hidden frame operations and update subscriptions.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio_test::assert_err;
use wallet_bridge::host::{HostEvent, MemoryHost, PeerReply, PeerRequest};
use wallet_bridge::wallet::DEFAULT_CHANNEL_NAME;
use wallet_bridge::{Error, FrameWallet, SubscriptionId, UpdateEvent, Wallet};

use common::{FRAME_URL, init_tracing, settle};

// ============================================================================
// Fixtures
// ============================================================================

fn frame_ui(request: &PeerRequest) -> PeerReply {
    match request.method.as_str() {
        "status" => PeerReply::success(json!({ "isLocked": true })),
        "unlock" => match request.param("password").and_then(Value::as_str) {
            Some("hunter2") => PeerReply::ok(),
            _ => PeerReply::error("Wrong password"),
        },
        "lock" | "subscribe" | "unsubscribe" => PeerReply::ok(),
        "list" => PeerReply::success(json!({
            "accounts": [
                { "address": "ADDR1", "id": "a1", "name": "Main", "type": "default" },
                { "address": "ADDR2", "id": "a2", "name": "Ledger", "type": "ledger" }
            ],
            "settings": { "network": "testnet", "autoLock": 15 }
        })),
        "accountInfo" => PeerReply::success(json!({
            "id": request.param("accountId").cloned().unwrap_or(Value::Null),
            "balance": 42
        })),
        _ => PeerReply::error("Unsupported method"),
    }
}

fn frame_with<F>(peer: F) -> (Arc<MemoryHost>, FrameWallet)
where
    F: Fn(&PeerRequest) -> PeerReply + Send + Sync + 'static,
{
    init_tracing();
    let (host, inbound) = MemoryHost::with_peer(peer);
    let frame = Wallet::builder()
        .frame_url(FRAME_URL)
        .build_frame(host.clone(), inbound)
        .expect("frame wallet");
    (host, frame)
}

fn frame() -> (Arc<MemoryHost>, FrameWallet) {
    frame_with(frame_ui)
}

fn push(host: &MemoryHost, frame: &FrameWallet, subscription: Option<SubscriptionId>, event: &str) {
    let mut params = json!({ "event": event, "data": { "source": "test" } });
    if let Some(id) = subscription {
        params["subscriptionId"] = json!(id);
    }
    host.inject(
        frame.window(),
        DEFAULT_CHANNEL_NAME,
        json!({ "method": "update", "params": params }),
    );
}

// ============================================================================
// Frame Requests
// ============================================================================

#[tokio::test]
async fn frame_attaches_at_frame_page_and_loads() -> anyhow::Result<()> {
    let (host, frame) = frame();

    let attached = host.events().into_iter().any(|e| {
        matches!(e, HostEvent::FrameAttached { window, ref frame_id }
            if window == frame.window() && frame_id == "wallet-bridge-frame")
    });
    assert!(attached);
    assert_eq!(
        host.url_of(frame.window()).map(String::from),
        Some("https://wallet.example.com/bridge/frame.html".to_string())
    );

    frame.on_load().await?;
    assert_eq!(frame.state(), wallet_bridge::window::PopupState::Loaded);
    Ok(())
}

#[tokio::test]
async fn is_locked_reads_status() -> anyhow::Result<()> {
    let (_host, frame) = frame();
    assert!(frame.is_locked().await?);
    Ok(())
}

#[tokio::test]
async fn unlock_sends_password() -> anyhow::Result<()> {
    let (host, frame) = frame();

    let err = assert_err!(frame.unlock("wrong").await);
    assert!(matches!(err, Error::Remote { .. }));

    frame.unlock("hunter2").await?;
    let last = host.posted().pop().expect("posted");
    assert_eq!(last.message["params"]["password"], "hunter2");

    let err = assert_err!(frame.unlock("").await);
    assert!(matches!(err, Error::InvalidArgument { .. }));
    Ok(())
}

#[tokio::test]
async fn account_queries() -> anyhow::Result<()> {
    let (host, frame) = frame();

    let accounts = frame.get_accounts().await?;
    assert_eq!(accounts.len(), 2);
    assert_eq!(accounts[1].kind, "ledger");

    let settings = frame.get_settings().await?;
    assert_eq!(settings["network"], "testnet");

    assert!(frame.has_account().await?);

    let info = frame.get_full_account_info("a2").await?;
    assert_eq!(info["id"], "a2");

    // Only the first fetch subscribed.
    let methods = host.posted_methods();
    assert_eq!(methods.iter().filter(|m| *m == "subscribe").count(), 1);
    assert_eq!(methods[0], "subscribe");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn silent_frame_times_out() {
    let (_host, frame) = frame_with(|_| PeerReply::Ignore);

    let started = tokio::time::Instant::now();
    let err = assert_err!(frame.is_locked().await);

    assert!(matches!(err, Error::RequestTimeout { timeout_ms: 4000, .. }));
    assert!(started.elapsed() >= Duration::from_millis(4000));
}

#[tokio::test]
async fn blocked_frame_is_invalid_window() {
    let (host, inbound) = MemoryHost::new();
    host.set_blocked(true);

    let err = Wallet::builder()
        .frame_url(FRAME_URL)
        .build_frame(host, inbound)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidWindow { .. }));
}

// ============================================================================
// Subscriptions
// ============================================================================

#[tokio::test]
async fn subscriber_receives_matching_updates() -> anyhow::Result<()> {
    let (host, frame) = frame();

    let mut updates = frame.subscribe().await?;
    let id = frame.subscription().expect("subscribed");

    push(&host, &frame, Some(id), "ACCOUNTS_UPDATE");
    push(&host, &frame, None, "ON_LOCK_WALLET");

    let first = updates.next_update().await.expect("update");
    assert_eq!(first.event, UpdateEvent::AccountsUpdate);
    assert_eq!(first.data["source"], "test");

    let second = updates.next_update().await.expect("update");
    assert_eq!(second.event, UpdateEvent::OnLockWallet);
    Ok(())
}

#[tokio::test]
async fn foreign_subscription_updates_dropped() -> anyhow::Result<()> {
    let (host, frame) = frame();
    let mut updates = frame.subscribe().await?;

    push(&host, &frame, Some(SubscriptionId::generate()), "SETTINGS_UPDATE");
    settle().await;

    assert!(updates.try_next_update().is_none());
    Ok(())
}

#[tokio::test]
async fn no_updates_after_unsubscribe() -> anyhow::Result<()> {
    let (host, frame) = frame();
    let mut updates = frame.subscribe().await?;
    let id = frame.subscription().expect("subscribed");

    frame.unsubscribe().await?;
    assert!(frame.subscription().is_none());

    push(&host, &frame, Some(id), "ACCOUNTS_UPDATE");
    settle().await;
    assert!(updates.try_next_update().is_none());

    // Unsubscribing twice is a no-op.
    frame.unsubscribe().await?;
    assert_eq!(
        host.posted_methods().iter().filter(|m| *m == "unsubscribe").count(),
        1
    );
    Ok(())
}

#[tokio::test]
async fn lock_resets_subscription() -> anyhow::Result<()> {
    let (_host, frame) = frame();

    frame.subscribe().await?;
    let before = frame.subscription().expect("subscribed");

    frame.lock().await?;
    assert!(frame.subscription().is_none());

    frame.get_accounts().await?;
    let after = frame.subscription().expect("resubscribed");
    assert_ne!(before, after);
    Ok(())
}

#[tokio::test]
async fn failed_subscribe_reverts_state() {
    let (_host, frame) = frame_with(|request| match request.method.as_str() {
        "subscribe" => PeerReply::error("Locked"),
        _ => frame_ui(request),
    });

    let err = assert_err!(frame.subscribe().await);
    assert!(err.is_remote());
    assert!(frame.subscription().is_none());
}

#[tokio::test]
async fn update_with_id_is_acknowledged() -> anyhow::Result<()> {
    let (host, frame) = frame();
    frame.subscribe().await?;
    let id = frame.subscription().expect("subscribed");

    let request_id = wallet_bridge::RequestId::generate();
    host.inject(
        frame.window(),
        DEFAULT_CHANNEL_NAME,
        json!({
            "id": request_id,
            "method": "update",
            "params": { "subscriptionId": id, "event": "SETTINGS_UPDATE", "data": {} }
        }),
    );
    settle().await;

    let reply = host.posted().pop().expect("reply");
    assert_eq!(reply.message["id"], request_id.to_string());
    assert_eq!(reply.message["status"], "success");
    Ok(())
}

#[tokio::test]
async fn update_stream_yields_pushes() -> anyhow::Result<()> {
    use futures_util::StreamExt;

    let (host, frame) = frame();
    let updates = frame.subscribe().await?.only([UpdateEvent::SettingsUpdate]);
    let id = frame.subscription();

    push(&host, &frame, id, "ACCOUNTS_UPDATE");
    push(&host, &frame, id, "SETTINGS_UPDATE");

    let mut stream = Box::pin(updates.into_stream());
    let update = stream.next().await.expect("update");
    assert_eq!(update.event, UpdateEvent::SettingsUpdate);
    Ok(())
}

#[tokio::test]
async fn dropping_frame_ends_subscriptions() -> anyhow::Result<()> {
    init_tracing();
    let (host, inbound) = MemoryHost::with_peer(frame_ui);
    let wallet = Wallet::builder().frame_url(FRAME_URL).build(host, inbound)?;

    let frame = FrameWallet::new(wallet.clone())?;
    let mut updates = frame.subscribe().await?;
    drop(frame);

    let next = tokio::time::timeout(Duration::from_secs(1), updates.next_update()).await;
    assert_eq!(next?, None);
    assert!(!wallet.channel().is_closed());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn concurrent_subscribers_see_failed_subscribe() {
    let (host, frame) = frame_with(|request| match request.method.as_str() {
        "subscribe" => PeerReply::error("Locked").after(Duration::from_millis(100)),
        _ => frame_ui(request),
    });

    let (first, second) = tokio::join!(frame.subscribe(), frame.subscribe());

    assert!(assert_err!(first).is_remote());
    assert!(assert_err!(second).is_remote());
    assert!(frame.subscription().is_none());
    assert_eq!(
        host.posted_methods().iter().filter(|m| *m == "subscribe").count(),
        2
    );
}

#[tokio::test(start_paused = true)]
async fn concurrent_subscribers_share_one_subscription() -> anyhow::Result<()> {
    let (host, frame) = frame_with(|request| match request.method.as_str() {
        "subscribe" => PeerReply::ok().after(Duration::from_millis(100)),
        _ => frame_ui(request),
    });

    let (first, second) = tokio::join!(frame.subscribe(), frame.subscribe());
    first?;
    second?;

    assert!(frame.subscription().is_some());
    assert_eq!(
        host.posted_methods().iter().filter(|m| *m == "subscribe").count(),
        1
    );
    Ok(())
}

#[tokio::test]
async fn failed_unsubscribe_keeps_subscription() -> anyhow::Result<()> {
    let (_host, frame) = frame_with(|request| match request.method.as_str() {
        "unsubscribe" => PeerReply::error("Busy"),
        _ => frame_ui(request),
    });

    frame.subscribe().await?;
    let id = frame.subscription();

    let err = assert_err!(frame.unsubscribe().await);
    assert!(err.is_remote());
    assert_eq!(frame.subscription(), id);
    Ok(())
}
