//! Popup-based wallet operations.
//!
//! Every operation follows the same path:
//!
//! 1. Claim the single-flight slot for its kind
//! 2. Open the popup page and probe it until it answers `status`
//! 3. Send one correlated request, racing it against the user closing the popup
//! 4. Close the popup and free the slot
//! 5. Shape the response data into the result type
//!
//! Step 4 runs on every path, including errors and a dropped future.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::host::{InboundReceiver, WindowHost};
use crate::protocol::{
    Address, Command, SignedTx, Transaction, TxnPayload, data_field, encoding,
};
use crate::transport::{Channel, Origin, SendOptions};
use crate::window::{Acquired, OperationKind, PopupLease, WindowManager};

use super::account::Account;
use super::builder::WalletBuilder;
use super::config::WalletConfig;

// ============================================================================
// OperationOptions
// ============================================================================

/// Per-call options for popup operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationOptions {
    /// Overrides the configured request timeout.
    pub timeout: Option<Duration>,
}

impl OperationOptions {
    /// Sets the request timeout.
    #[inline]
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

// ============================================================================
// Wallet
// ============================================================================

/// Client for a wallet UI served in popups.
///
/// Cloning yields another handle to the same channel and popup slots.
///
/// # Example
///
/// ```no_run
/// use wallet_bridge::Wallet;
/// use wallet_bridge::host::MemoryHost;
///
/// # async fn example() -> wallet_bridge::Result<()> {
/// let (host, inbound) = MemoryHost::new();
/// let wallet = Wallet::builder().build(host, inbound)?;
///
/// let accounts = wallet.connect().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Wallet {
    inner: Arc<WalletInner>,
}

struct WalletInner {
    config: WalletConfig,
    origin: Origin,
    channel: Channel,
    windows: WindowManager,
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("frame_url", &self.inner.config.frame_url.as_str())
            .field("channel", &self.inner.channel)
            .field("windows", &self.inner.windows)
            .finish()
    }
}

// ============================================================================
// Wallet - Constructor
// ============================================================================

impl Wallet {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> WalletBuilder {
        WalletBuilder::new()
    }

    /// Creates a wallet from validated configuration.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the frame URL has an opaque origin.
    pub fn new(
        config: WalletConfig,
        host: Arc<dyn WindowHost>,
        inbound: InboundReceiver,
    ) -> Result<Self> {
        let origin = config.origin()?;
        let channel = Channel::new(
            config.channel_name.as_str(),
            origin.clone(),
            Arc::clone(&host),
            inbound,
        );
        let windows = WindowManager::new(host, config.geometry, config.policy, config.load);

        debug!(frame_url = %config.frame_url, policy = ?config.policy, "Wallet created");

        Ok(Self {
            inner: Arc::new(WalletInner {
                config,
                origin,
                channel,
                windows,
            }),
        })
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &WalletConfig {
        &self.inner.config
    }

    /// Returns the wallet UI origin.
    #[inline]
    #[must_use]
    pub fn origin(&self) -> &Origin {
        &self.inner.origin
    }

    /// Returns the underlying channel.
    #[inline]
    #[must_use]
    pub fn channel(&self) -> &Channel {
        &self.inner.channel
    }

    /// Returns the window manager.
    #[inline]
    #[must_use]
    pub fn windows(&self) -> &WindowManager {
        &self.inner.windows
    }

    /// Stops the channel. Outstanding operations fail with
    /// [`Error::ChannelClosed`].
    pub fn close(&self) {
        self.inner.channel.close();
    }
}

// ============================================================================
// Wallet - Operations
// ============================================================================

impl Wallet {
    /// Asks the user to unlock the wallet and share accounts.
    ///
    /// # Errors
    ///
    /// - [`Error::WindowAlreadyOpen`] if a connect popup is already open
    /// - [`Error::InvalidWindow`] if the popup could not be opened
    /// - [`Error::WindowNotLoaded`] if the popup never answered
    /// - [`Error::WindowClosed`] if the user closed the popup
    /// - [`Error::Remote`] if the wallet refused
    pub async fn connect(&self) -> Result<Vec<Account>> {
        self.connect_with(OperationOptions::default()).await
    }

    /// [`connect`](Self::connect) with per-call options.
    ///
    /// # Errors
    ///
    /// See [`connect`](Self::connect).
    pub async fn connect_with(&self, options: OperationOptions) -> Result<Vec<Account>> {
        let data = self
            .run_popup(
                OperationKind::Connect,
                Command::Unlock { password: None },
                options,
            )
            .await?;
        data_field(&data, "accounts")
    }

    /// Asks the user to sign one transaction.
    ///
    /// # Errors
    ///
    /// See [`connect`](Self::connect); [`Error::Json`] if the signed result is
    /// malformed.
    pub async fn sign_transaction(&self, txn: Transaction) -> Result<SignedTx> {
        self.sign_transaction_with(txn, OperationOptions::default())
            .await
    }

    /// [`sign_transaction`](Self::sign_transaction) with per-call options.
    ///
    /// # Errors
    ///
    /// See [`sign_transaction`](Self::sign_transaction).
    pub async fn sign_transaction_with(
        &self,
        txn: Transaction,
        options: OperationOptions,
    ) -> Result<SignedTx> {
        let command = Command::Transaction {
            txn: TxnPayload::Single(Box::new(txn)),
        };
        let data = self
            .run_popup(OperationKind::SignTransaction, command, options)
            .await?;
        Ok(serde_json::from_value(data)?)
    }

    /// Asks the user to sign a batch of transactions in one popup.
    ///
    /// Results are in request order.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `txns` is empty
    /// - [`Error::Protocol`] if the wallet returned a different count
    /// - See [`connect`](Self::connect)
    pub async fn sign_transactions(&self, txns: Vec<Transaction>) -> Result<Vec<SignedTx>> {
        self.sign_transactions_with(txns, OperationOptions::default())
            .await
    }

    /// [`sign_transactions`](Self::sign_transactions) with per-call options.
    ///
    /// # Errors
    ///
    /// See [`sign_transactions`](Self::sign_transactions).
    pub async fn sign_transactions_with(
        &self,
        txns: Vec<Transaction>,
        options: OperationOptions,
    ) -> Result<Vec<SignedTx>> {
        if txns.is_empty() {
            return Err(Error::invalid_argument(
                "At least one transaction is required",
            ));
        }

        let expected = txns.len();
        let command = Command::Transaction {
            txn: TxnPayload::Batch(txns),
        };
        let data = self
            .run_popup(OperationKind::SignTransaction, command, options)
            .await?;

        let signed: Vec<SignedTx> = serde_json::from_value(data)?;
        if signed.len() != expected {
            return Err(Error::protocol(format!(
                "Expected {expected} signed transactions, got {}",
                signed.len()
            )));
        }
        Ok(signed)
    }

    /// Asks the user to sign a logic signature program.
    ///
    /// Returns the signed program bytes.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `logic` is empty
    /// - [`Error::Decode`] if the signed program is not base64
    /// - See [`connect`](Self::connect)
    pub async fn sign_logic_sig(&self, logic: &[u8], address: impl Into<Address>) -> Result<Vec<u8>> {
        self.sign_logic_sig_with(logic, address, OperationOptions::default())
            .await
    }

    /// [`sign_logic_sig`](Self::sign_logic_sig) with per-call options.
    ///
    /// # Errors
    ///
    /// See [`sign_logic_sig`](Self::sign_logic_sig).
    pub async fn sign_logic_sig_with(
        &self,
        logic: &[u8],
        address: impl Into<Address>,
        options: OperationOptions,
    ) -> Result<Vec<u8>> {
        if logic.is_empty() {
            return Err(Error::invalid_argument("Logic program must not be empty"));
        }

        let command = Command::LogicSig {
            logic: logic.to_vec(),
            address: address.into(),
        };
        let data = self
            .run_popup(OperationKind::SignLogicSig, command, options)
            .await?;

        let signed: String = data_field(&data, "signedTeal")?;
        encoding::decode("signedTeal", &signed)
    }
}

// ============================================================================
// Wallet - Popup Flow
// ============================================================================

impl Wallet {
    /// Runs one popup operation and returns the raw response data.
    async fn run_popup(
        &self,
        kind: OperationKind,
        command: Command,
        options: OperationOptions,
    ) -> Result<Value> {
        let fingerprint = serde_json::to_string(&command)?;

        let mut lease = match self.inner.windows.acquire(kind, fingerprint)? {
            Acquired::Leader(lease) => lease,
            Acquired::Follower(follower) => return follower.outcome().await,
        };

        let timeout = options.timeout.unwrap_or(self.inner.config.request_timeout);
        let outcome = self.drive(&mut lease, command, timeout).await;
        if let Err(e) = &outcome {
            debug!(%kind, error = %e, "Popup operation failed");
        }
        lease.finish(outcome)
    }

    /// Opens, probes and queries the popup held by `lease`.
    async fn drive(
        &self,
        lease: &mut PopupLease,
        command: Command,
        timeout: Duration,
    ) -> Result<Value> {
        let inner = &self.inner;

        let url = inner.config.page_url(lease.kind())?;
        let window = lease.open(&url)?;
        lease.wait_until_loaded(&inner.channel, &inner.origin).await?;
        lease.mark_in_use()?;

        debug!(%window, method = command.method(), "Sending popup request");

        let request = inner.channel.send(
            window,
            command,
            &inner.origin,
            SendOptions::with_timeout(timeout),
        );

        let response = tokio::select! {
            response = request => response?.ok_or(Error::ChannelClosed)?,
            () = inner.windows.closed(window) => return Err(Error::window_closed(window)),
        };

        response.into_result()
    }
}
