//! Request/response correlation.
//!
//! Every waiting request owns one entry in the [`CorrelationTable`], keyed by
//! its [`RequestId`]. The entry is removed exactly once:
//!
//! - by [`CorrelationTable::resolve`] when the matching response arrives, or
//! - by the waiting side when its timeout expires (or it is dropped).
//!
//! Whoever removes the entry wins. A response arriving after the entry is gone
//! is unmatched and discarded; a timeout firing after the response already
//! removed the entry returns that response instead of failing.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::Response;

// ============================================================================
// Constants
// ============================================================================

/// Maximum outstanding requests before rejecting new ones.
pub const MAX_PENDING_REQUESTS: usize = 256;

// ============================================================================
// Types
// ============================================================================

/// Map of request IDs to response channels.
type PendingMap = FxHashMap<RequestId, oneshot::Sender<Response>>;

// ============================================================================
// CorrelationTable
// ============================================================================

/// Table of outstanding requests.
///
/// Cloning yields another handle to the same table.
#[derive(Clone)]
pub struct CorrelationTable {
    pending: Arc<Mutex<PendingMap>>,
    max_pending: usize,
}

impl Default for CorrelationTable {
    fn default() -> Self {
        Self::new(MAX_PENDING_REQUESTS)
    }
}

impl CorrelationTable {
    /// Creates an empty table accepting up to `max_pending` entries.
    #[must_use]
    pub fn new(max_pending: usize) -> Self {
        Self {
            pending: Arc::new(Mutex::new(PendingMap::default())),
            max_pending,
        }
    }

    /// Registers a new outstanding request under a fresh ID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if too many requests are outstanding.
    pub fn register(&self) -> Result<Pending> {
        let mut pending = self.pending.lock();

        if pending.len() >= self.max_pending {
            warn!(
                pending = pending.len(),
                max = self.max_pending,
                "Too many pending requests"
            );
            return Err(Error::protocol(format!(
                "Too many pending requests: {}/{}",
                pending.len(),
                self.max_pending
            )));
        }

        let id = loop {
            let id = RequestId::generate();
            if !pending.contains_key(&id) {
                break id;
            }
        };

        let (tx, rx) = oneshot::channel();
        pending.insert(id, tx);

        Ok(Pending {
            id,
            rx,
            table: self.clone(),
        })
    }

    /// Completes the request matching `response.id`.
    ///
    /// Returns `false` if no such request is outstanding; the response is
    /// discarded.
    pub fn resolve(&self, response: Response) -> bool {
        let tx = self.pending.lock().remove(&response.id);

        match tx {
            Some(tx) => {
                let id = response.id;
                if tx.send(response).is_err() {
                    trace!(%id, "Waiter gone before response was delivered");
                }
                true
            }
            None => {
                debug!(id = %response.id, "Response for unknown request discarded");
                false
            }
        }
    }

    /// Removes an entry without completing it.
    ///
    /// Returns `true` if this call removed it.
    pub fn cancel(&self, id: RequestId) -> bool {
        self.pending.lock().remove(&id).is_some()
    }

    /// Drops every entry; their waiters fail with [`Error::ChannelClosed`].
    pub fn clear(&self) {
        let drained: Vec<_> = self.pending.lock().drain().collect();
        if !drained.is_empty() {
            debug!(count = drained.len(), "Failed pending requests");
        }
    }

    /// Returns `true` if `id` is outstanding.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: RequestId) -> bool {
        self.pending.lock().contains_key(&id)
    }

    /// Returns the number of outstanding requests.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns `true` if nothing is outstanding.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

// ============================================================================
// Pending
// ============================================================================

/// The waiting side of one outstanding request.
///
/// Dropping it removes the entry, so an abandoned wait leaves nothing behind.
pub struct Pending {
    id: RequestId,
    rx: oneshot::Receiver<Response>,
    table: CorrelationTable,
}

impl Pending {
    /// Returns the request ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Waits for the matching response, up to `limit`.
    ///
    /// # Errors
    ///
    /// - [`Error::RequestTimeout`] if no response arrived in time
    /// - [`Error::ChannelClosed`] if the table was cleared
    pub async fn wait(mut self, limit: Duration) -> Result<Response> {
        match timeout(limit, &mut self.rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(Error::ChannelClosed),
            Err(_) => {
                if self.table.cancel(self.id) {
                    trace!(id = %self.id, "Request timed out");
                    let timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
                    return Err(Error::request_timeout(self.id, timeout_ms));
                }

                // The response removed the entry first; it wins.
                self.rx.try_recv().map_err(|_| Error::ChannelClosed)
            }
        }
    }
}

impl Drop for Pending {
    fn drop(&mut self) {
        self.table.cancel(self.id);
    }
}

// ============================================================================
// Tests
// ============================================================================
