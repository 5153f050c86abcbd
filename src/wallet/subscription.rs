//! Frame update subscriptions.

// ============================================================================
// Imports
// ============================================================================

use futures_util::Stream;
use futures_util::stream;
use tokio::sync::broadcast;
use tracing::debug;

use crate::protocol::{Update, UpdateEvent};

// ============================================================================
// Subscription
// ============================================================================

/// A listener for updates pushed by the frame.
///
/// Receives every update delivered while the frame is subscribed. Dropping the
/// subscription detaches the listener; it does not unsubscribe the frame.
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<Update>,
    events: Option<Vec<UpdateEvent>>,
}

impl Subscription {
    pub(crate) fn new(receiver: broadcast::Receiver<Update>) -> Self {
        Self {
            receiver,
            events: None,
        }
    }

    /// Restricts the subscription to the given events.
    #[must_use]
    pub fn only(mut self, events: impl IntoIterator<Item = UpdateEvent>) -> Self {
        self.events = Some(events.into_iter().collect());
        self
    }

    /// Receives the next matching update.
    ///
    /// Returns `None` once the frame wallet is gone.
    pub async fn next_update(&mut self) -> Option<Update> {
        loop {
            let update = match self.receiver.recv().await {
                Ok(update) => update,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, "Subscriber lagged, some updates dropped");
                    continue;
                }
            };

            if self.matches(&update) {
                return Some(update);
            }
        }
    }

    /// Returns the next matching update if one is already queued.
    pub fn try_next_update(&mut self) -> Option<Update> {
        loop {
            match self.receiver.try_recv() {
                Ok(update) if self.matches(&update) => return Some(update),
                Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => return None,
            }
        }
    }

    /// Converts the subscription into a stream of updates.
    pub fn into_stream(self) -> impl Stream<Item = Update> + Send + 'static {
        stream::unfold(self, |mut subscription| async move {
            subscription
                .next_update()
                .await
                .map(|update| (update, subscription))
        })
    }

    fn matches(&self, update: &Update) -> bool {
        self.events
            .as_ref()
            .is_none_or(|events| events.contains(&update.event))
    }
}

// ============================================================================
// Tests
// ============================================================================
