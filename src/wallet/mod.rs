//! Wallet operation façade.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Wallet`] | Popup operations: connect, sign transactions, sign logic sigs |
//! | [`FrameWallet`] | Hidden frame operations and update subscriptions |
//! | [`WalletBuilder`] | Fluent, validating configuration builder |
//! | [`WalletConfig`] | Validated configuration |
//! | [`Subscription`] | Stream of frame updates |

// ============================================================================
// Submodules
// ============================================================================

/// Account shapes.
pub mod account;

/// Fluent builder pattern for wallet configuration.
pub mod builder;

/// Validated configuration and defaults.
pub mod config;

/// Popup-based operations.
pub mod core;

/// Hidden frame operations.
pub mod frame;

/// Frame update subscriptions.
pub mod subscription;

// ============================================================================
// Re-exports
// ============================================================================

pub use account::{Account, StoredAccount};
pub use builder::{MAX_LOAD_INTERVAL, WalletBuilder};
pub use config::{
    DEFAULT_CHANNEL_NAME, DEFAULT_FRAME_ID, DEFAULT_FRAME_TIMEOUT, DEFAULT_FRAME_URL, WalletConfig,
};
pub use core::{OperationOptions, Wallet};
pub use frame::FrameWallet;
pub use subscription::Subscription;
