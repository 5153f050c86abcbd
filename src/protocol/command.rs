//! Command definitions.
//!
//! Each command serializes to a `method` name plus optional `params`,
//! flattened into [`Request`](super::Request).
//!
//! # Commands
//!
//! | Method | Used by | Params |
//! |--------|---------|--------|
//! | `status` | liveness probe, lock state | - |
//! | `unlock` | connect popup, frame unlock | `{password?}` |
//! | `transaction` | sign-transaction popup | `{txn}` (object or array) |
//! | `logicsig` | sign-logicsig popup | `{logic, address}` |
//! | `lock` | frame | - |
//! | `subscribe` / `unsubscribe` | frame | `{subscriptionId}` |
//! | `list` | frame | - |
//! | `accountInfo` | frame | `{accountId}` |

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;

use crate::identifiers::SubscriptionId;

use super::encoding::base64_bytes;
use super::transaction::{Address, Transaction};

// ============================================================================
// Command
// ============================================================================

/// All protocol commands understood by the remote wallet window.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "method", content = "params")]
pub enum Command {
    /// Liveness probe / lock state query.
    #[serde(rename = "status")]
    Status,

    /// Unlock the wallet and list the accounts the user allows.
    ///
    /// The popup variant sends no password; the frame variant does.
    #[serde(rename = "unlock")]
    Unlock {
        /// Wallet password (frame variant only).
        #[serde(skip_serializing_if = "Option::is_none")]
        password: Option<String>,
    },

    /// Sign one transaction or a batch.
    #[serde(rename = "transaction")]
    Transaction {
        /// Transaction or transaction batch.
        txn: TxnPayload,
    },

    /// Sign a logic signature program.
    #[serde(rename = "logicsig")]
    LogicSig {
        /// Program bytes (base64 on the wire).
        #[serde(with = "base64_bytes")]
        logic: Vec<u8>,
        /// Signer address.
        address: Address,
    },

    /// Lock the frame.
    #[serde(rename = "lock")]
    Lock,

    /// Start receiving update pushes.
    #[serde(rename = "subscribe")]
    Subscribe {
        /// Subscription the pushes will carry.
        #[serde(rename = "subscriptionId")]
        subscription_id: SubscriptionId,
    },

    /// Stop receiving update pushes.
    #[serde(rename = "unsubscribe")]
    Unsubscribe {
        /// Subscription to cancel.
        #[serde(rename = "subscriptionId")]
        subscription_id: SubscriptionId,
    },

    /// Fetch stored accounts and settings.
    #[serde(rename = "list")]
    List,

    /// Fetch the full record of one stored account.
    #[serde(rename = "accountInfo")]
    AccountInfo {
        /// Stored account ID.
        #[serde(rename = "accountId")]
        account_id: String,
    },
}

impl Command {
    /// Returns the wire method name.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Unlock { .. } => "unlock",
            Self::Transaction { .. } => "transaction",
            Self::LogicSig { .. } => "logicsig",
            Self::Lock => "lock",
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe { .. } => "unsubscribe",
            Self::List => "list",
            Self::AccountInfo { .. } => "accountInfo",
        }
    }
}

// ============================================================================
// TxnPayload
// ============================================================================

/// Transaction parameter: a single object or an array for batches.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TxnPayload {
    /// One transaction, signed into one result.
    Single(Box<Transaction>),
    /// A batch, signed into an array of results in the same order.
    Batch(Vec<Transaction>),
}

impl TxnPayload {
    /// Number of transactions carried.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Batch(txns) => txns.len(),
        }
    }

    /// Returns `true` for an empty batch.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Tests
// ============================================================================
