//! Frame update pushes.
//!
//! A subscribed frame pushes updates as peer-initiated requests:
//!
//! ```json
//! {
//!   "method": "update",
//!   "params": { "subscriptionId": "uuid", "event": "ACCOUNTS_UPDATE", "data": { ... } }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::SubscriptionId;

use super::InboundRequest;

/// Method name of update pushes.
pub const UPDATE_METHOD: &str = "update";

/// Kind of update pushed by the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateEvent {
    /// Stored accounts changed.
    AccountsUpdate,
    /// User settings changed.
    SettingsUpdate,
    /// The wallet locked itself.
    OnLockWallet,
}

/// A single update pushed by the frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Update {
    /// Subscription the push belongs to, when the frame tags it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<SubscriptionId>,

    /// Update kind.
    pub event: UpdateEvent,

    /// Event payload.
    #[serde(default)]
    pub data: Value,
}

impl Update {
    /// Extracts an update from an inbound request, if it is one.
    #[must_use]
    pub fn from_request(request: &InboundRequest) -> Option<Self> {
        if request.method != UPDATE_METHOD {
            return None;
        }
        let params = request.params.clone()?;
        serde_json::from_value(params).ok()
    }
}
