//! Wallet Bridge - Cross-window request/response bridge for wallet UIs.
//!
//! This library lets a client talk to a remote wallet UI living in a popup or
//! a hidden frame it does not control, over a postMessage-style channel.
//!
//! # Architecture
//!
//! The bridge follows a client-peer model:
//!
//! - **Local End (Rust)**: Opens popups, sends correlated requests
//! - **Remote End (Wallet UI)**: Answers `status` probes, asks the user, replies
//!
//! Key design principles:
//!
//! - The windowing environment is injected through the [`WindowHost`] trait
//! - Every request carries a fresh ID; responses are matched by ID only
//! - Frames from foreign origins or other channels are dropped silently
//! - At most one popup per operation kind is in flight
//! - Every failure path closes the popup before the error is returned
//!
//! # Quick Start
//!
//! ```no_run
//! use serde_json::json;
//! use wallet_bridge::host::{MemoryHost, PeerReply};
//! use wallet_bridge::{Result, Wallet};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // A scripted wallet UI standing in for a real browser host
//!     let (host, inbound) = MemoryHost::with_peer(|request| match request.method.as_str() {
//!         "status" => PeerReply::ok(),
//!         "unlock" => PeerReply::success(json!({ "accounts": ["ADDRESS"] })),
//!         _ => PeerReply::error("unsupported"),
//!     });
//!
//!     let wallet = Wallet::builder()
//!         .frame_url("https://wallet.example.com/bridge")
//!         .build(host, inbound)?;
//!
//!     let accounts = wallet.connect().await?;
//!     println!("Connected: {}", accounts[0].address);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`wallet`] | Operation façade: [`Wallet`], [`FrameWallet`] |
//! | [`window`] | Popup lifecycle and single-flight slots |
//! | [`transport`] | Channel, correlation and origin checks |
//! | [`host`] | [`WindowHost`] trait and [`MemoryHost`](host::MemoryHost) |
//! | [`protocol`] | Wire message types |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Window host abstraction.
///
/// Implement [`WindowHost`] to run the bridge in a real windowing
/// environment.
pub mod host;

/// Type-safe identifiers for bridge entities.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Wire protocol message types.
pub mod protocol;

/// Cross-window transport layer.
pub mod transport;

/// Wallet operation façade.
///
/// Use [`Wallet::builder()`] to create a configured wallet.
pub mod wallet;

/// Popup and frame lifecycle.
pub mod window;

// ============================================================================
// Re-exports
// ============================================================================

// Error types
pub use error::{Error, Result};

// Host types
pub use host::{InboundFrame, PopupGeometry, WindowHost};

// Identifier types
pub use identifiers::{RequestId, SubscriptionId, WindowId};

// Protocol types
pub use protocol::{Address, SignedTx, Transaction, Update, UpdateEvent};

// Wallet types
pub use wallet::{
    Account, FrameWallet, OperationOptions, StoredAccount, Subscription, Wallet, WalletBuilder,
    WalletConfig,
};

// Window types
pub use window::{OperationKind, SingleFlightPolicy};
