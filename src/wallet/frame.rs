//! Long-lived hidden frame operations.
//!
//! A [`FrameWallet`] keeps one hidden frame attached next to the popup
//! wallet. Frame requests use a short timeout and never open popups.
//!
//! The frame pushes updates (`ACCOUNTS_UPDATE`, `SETTINGS_UPDATE`,
//! `ON_LOCK_WALLET`) only while subscribed. The subscription starts on the
//! first [`subscribe`](FrameWallet::subscribe) or data fetch and ends on
//! [`lock`](FrameWallet::lock) or [`unsubscribe`](FrameWallet::unsubscribe).

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{Mutex as AsyncMutex, broadcast};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::{SubscriptionId, WindowId};
use crate::protocol::{Command, InboundRequest, Response, Update, data_field};
use crate::window::{OperationKind, PopupHandle, PopupState};

use super::account::StoredAccount;
use super::core::Wallet;
use super::subscription::Subscription;

// ============================================================================
// Constants
// ============================================================================

/// Updates buffered per listener before the oldest are dropped.
const UPDATE_CAPACITY: usize = 64;

// ============================================================================
// FrameWallet
// ============================================================================

/// Client for the wallet's hidden frame.
///
/// Cloning yields another handle to the same frame.
#[derive(Clone)]
pub struct FrameWallet {
    inner: Arc<FrameInner>,
}

struct FrameInner {
    wallet: Wallet,
    window: WindowId,
    handle: Arc<Mutex<PopupHandle>>,
    updates: broadcast::Sender<Update>,
    /// Held across `subscribe`/`unsubscribe`/`lock` round trips.
    subscribing: AsyncMutex<()>,
}

impl fmt::Debug for FrameWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameWallet")
            .field("window", &self.inner.window)
            .field("handle", &*self.inner.handle.lock())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// FrameWallet - Constructor
// ============================================================================

impl FrameWallet {
    /// Attaches the hidden frame and installs the update handler.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWindow`] if the host has no usable frame.
    pub fn new(wallet: Wallet) -> Result<Self> {
        let config = wallet.config();
        let url = config.page_url(OperationKind::Frame)?;

        let window = wallet
            .windows()
            .attach_frame(&url, &config.frame_id)
            .ok_or_else(|| Error::invalid_window(format!("Frame {} not found", config.frame_id)))?;

        let mut handle = PopupHandle::new(OperationKind::Frame);
        handle.opened(window)?;
        let handle = Arc::new(Mutex::new(handle));

        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);

        // Weak: subscriptions close once the frame wallet is dropped.
        let forward_handle = Arc::clone(&handle);
        let forward_updates = updates.downgrade();
        wallet.channel().on_message(Box::new(move |request| {
            forward_update(&forward_handle, &forward_updates, request)
        }));

        debug!(%window, %url, "Frame attached");

        Ok(Self {
            inner: Arc::new(FrameInner {
                wallet,
                window,
                handle,
                updates,
                subscribing: AsyncMutex::new(()),
            }),
        })
    }

    /// Returns the popup wallet sharing this frame's channel.
    #[inline]
    #[must_use]
    pub fn wallet(&self) -> &Wallet {
        &self.inner.wallet
    }

    /// Returns the frame window.
    #[inline]
    #[must_use]
    pub fn window(&self) -> WindowId {
        self.inner.window
    }

    /// Returns the frame lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> PopupState {
        self.inner.handle.lock().state()
    }

    /// Returns the active subscription, if any.
    #[inline]
    #[must_use]
    pub fn subscription(&self) -> Option<SubscriptionId> {
        self.inner.handle.lock().subscription()
    }
}

// ============================================================================
// FrameWallet - Operations
// ============================================================================

impl FrameWallet {
    /// Waits until the frame answers a liveness probe.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WindowNotLoaded`] if it never does.
    pub async fn on_load(&self) -> Result<()> {
        let wallet = &self.inner.wallet;
        wallet
            .windows()
            .wait_until_loaded(Some(self.inner.window), wallet.channel(), wallet.origin())
            .await?;

        let mut handle = self.inner.handle.lock();
        if handle.state() == PopupState::Opening {
            handle.transition(PopupState::Loaded)?;
        }
        Ok(())
    }

    /// Returns `true` if the wallet is locked.
    ///
    /// # Errors
    ///
    /// - [`Error::RequestTimeout`] if the frame did not answer in time
    /// - [`Error::Remote`] if the frame answered with an error
    pub async fn is_locked(&self) -> Result<bool> {
        let data = self.request(Command::Status).await?;
        data_field(&data, "isLocked")
    }

    /// Locks the wallet and ends the subscription.
    ///
    /// # Errors
    ///
    /// See [`is_locked`](Self::is_locked).
    pub async fn lock(&self) -> Result<()> {
        let _guard = self.inner.subscribing.lock().await;
        self.request(Command::Lock).await?;
        self.inner.handle.lock().set_subscription(None);
        debug!(window = %self.inner.window, "Frame locked");
        Ok(())
    }

    /// Unlocks the wallet with `password`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `password` is empty
    /// - See [`is_locked`](Self::is_locked)
    pub async fn unlock(&self, password: impl Into<String>) -> Result<()> {
        let password = password.into();
        if password.is_empty() {
            return Err(Error::invalid_argument("Password must not be empty"));
        }

        self.request(Command::Unlock {
            password: Some(password),
        })
        .await?;
        Ok(())
    }

    /// Registers a listener for frame updates, subscribing the frame first if
    /// needed.
    ///
    /// # Errors
    ///
    /// See [`is_locked`](Self::is_locked).
    pub async fn subscribe(&self) -> Result<Subscription> {
        let receiver = self.inner.updates.subscribe();
        self.ensure_subscribed().await?;
        Ok(Subscription::new(receiver))
    }

    /// Stops update pushes. A no-op if not subscribed.
    ///
    /// The subscription stays active if the frame refuses.
    ///
    /// # Errors
    ///
    /// See [`is_locked`](Self::is_locked).
    pub async fn unsubscribe(&self) -> Result<()> {
        let _guard = self.inner.subscribing.lock().await;
        let Some(subscription_id) = self.inner.handle.lock().subscription() else {
            return Ok(());
        };

        self.request(Command::Unsubscribe { subscription_id })
            .await?;

        let mut handle = self.inner.handle.lock();
        if handle.subscription() == Some(subscription_id) {
            handle.set_subscription(None);
        }
        debug!(%subscription_id, "Unsubscribed");
        Ok(())
    }

    /// Lists the stored accounts.
    ///
    /// # Errors
    ///
    /// See [`is_locked`](Self::is_locked).
    pub async fn get_accounts(&self) -> Result<Vec<StoredAccount>> {
        self.ensure_subscribed().await?;
        let data = self.request(Command::List).await?;
        data_field(&data, "accounts")
    }

    /// Returns the user's wallet settings.
    ///
    /// # Errors
    ///
    /// See [`is_locked`](Self::is_locked).
    pub async fn get_settings(&self) -> Result<Value> {
        self.ensure_subscribed().await?;
        let data = self.request(Command::List).await?;
        data_field(&data, "settings")
    }

    /// Returns `true` if the wallet stores at least one account.
    ///
    /// # Errors
    ///
    /// See [`is_locked`](Self::is_locked).
    pub async fn has_account(&self) -> Result<bool> {
        Ok(!self.get_accounts().await?.is_empty())
    }

    /// Returns everything the wallet knows about one stored account.
    ///
    /// # Errors
    ///
    /// See [`is_locked`](Self::is_locked).
    pub async fn get_full_account_info(&self, account_id: impl Into<String>) -> Result<Value> {
        self.request(Command::AccountInfo {
            account_id: account_id.into(),
        })
        .await
    }

    /// Detaches the update handler and closes the frame.
    pub fn close(&self) {
        let wallet = &self.inner.wallet;
        wallet.channel().clear_handler();
        wallet.windows().close(Some(self.inner.window));

        let mut handle = self.inner.handle.lock();
        if let Err(e) = handle.transition(PopupState::Closed) {
            debug!(error = %e, "Failed to close frame handle");
        }
    }
}

// ============================================================================
// FrameWallet - Internals
// ============================================================================

impl FrameWallet {
    /// Sends one frame request and returns the response data.
    async fn request(&self, command: Command) -> Result<Value> {
        let wallet = &self.inner.wallet;
        let timeout = wallet.config().frame_timeout;

        wallet
            .channel()
            .request(self.inner.window, command, timeout)
            .await?
            .into_result()
    }

    /// Subscribes the frame unless already subscribed.
    ///
    /// Concurrent callers queue on the same lock, so none returns before the
    /// frame acknowledged. The ID is recorded before the request goes out so
    /// pushes racing the acknowledgement are accepted, and cleared again if
    /// the request fails.
    async fn ensure_subscribed(&self) -> Result<()> {
        let _guard = self.inner.subscribing.lock().await;
        let subscription_id = {
            let mut handle = self.inner.handle.lock();
            if handle.subscription().is_some() {
                return Ok(());
            }
            let id = SubscriptionId::generate();
            handle.set_subscription(Some(id));
            id
        };

        match self.request(Command::Subscribe { subscription_id }).await {
            Ok(_) => {
                debug!(%subscription_id, "Subscribed");
                Ok(())
            }
            Err(e) => {
                let mut handle = self.inner.handle.lock();
                if handle.subscription() == Some(subscription_id) {
                    handle.set_subscription(None);
                }
                Err(e)
            }
        }
    }
}

/// Inbound handler: fans update pushes out to listeners.
fn forward_update(
    handle: &Mutex<PopupHandle>,
    updates: &broadcast::WeakSender<Update>,
    request: InboundRequest,
) -> Option<Response> {
    let Some(updates) = updates.upgrade() else {
        trace!(method = %request.method, "Frame wallet dropped, ignoring request");
        return None;
    };
    let Some(update) = Update::from_request(&request) else {
        trace!(method = %request.method, "Ignored inbound request");
        return None;
    };

    let active = handle.lock().subscription();
    let accepted = match (active, update.subscription_id) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(active), Some(id)) => active == id,
    };

    if !accepted {
        trace!(event = ?update.event, "Dropped update outside subscription");
        return None;
    }

    trace!(event = ?update.event, listeners = updates.receiver_count(), "Forwarding update");
    let _ = updates.send(update);
    request.reply_success(None)
}
