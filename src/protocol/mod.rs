//! Wire protocol message types.
//!
//! This module defines the frames exchanged between the local end (this
//! crate) and the remote wallet window.
//!
//! # Protocol Overview
//!
//! Every frame travels inside an [`Envelope`] naming the channel:
//!
//! ```json
//! { "channel": "wallet-bridge-communication-channel", "message": { ... } }
//! ```
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | [`Request`] | Local → Remote | Correlated command |
//! | [`Response`] | Remote → Local | Command result (`success` / `error`) |
//! | [`InboundRequest`] | Remote → Local | Peer-initiated message (update pushes) |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Command definitions (`status`, `unlock`, `transaction`, ...) |
//! | `encoding` | Base64 helpers for byte fields |
//! | `request` | Envelope, Request and Response types |
//! | `transaction` | Transaction model and signed results |
//! | `update` | Frame update pushes |

// ============================================================================
// Submodules
// ============================================================================

/// Command definitions.
pub mod command;

/// Base64 helpers for raw byte fields.
pub mod encoding;

/// Envelope, Request and Response message types.
pub mod request;

/// Transaction model.
pub mod transaction;

/// Frame update pushes.
pub mod update;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{Command, TxnPayload};
pub use request::{
    Envelope, InboundRequest, Message, Request, Response, ResponseStatus, data_field,
};
pub use transaction::{
    Address, ApplicationCallTxn, AssetConfigTxn, AssetFreezeTxn, AssetTransferTxn, KeyRegTxn,
    PaymentTxn, SignedTx, Transaction, TxnHeader,
};
pub use update::{UPDATE_METHOD, Update, UpdateEvent};
