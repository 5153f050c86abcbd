//! In-memory window host.
//!
//! [`MemoryHost`] implements [`WindowHost`] without any real windows. Every
//! popup or frame it opens is backed by a scriptable peer closure that sees
//! each posted request and decides how to answer. It records everything it
//! is asked to do, so it doubles as a spy in tests and benches.
//!
//! # Example
//!
//! ```ignore
//! use serde_json::json;
//! use wallet_bridge::host::{MemoryHost, PeerReply};
//!
//! let (host, inbound) = MemoryHost::with_peer(|request| match request.method.as_str() {
//!     "status" => PeerReply::ok(),
//!     "unlock" => PeerReply::success(json!({ "accounts": ["ADDR"] })),
//!     _ => PeerReply::error("unsupported"),
//! });
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::{RequestId, WindowId};
use crate::protocol::{Envelope, InboundRequest, Response, ResponseStatus};

use super::{
    InboundFrame, InboundReceiver, InboundSender, PopupGeometry, WindowHost, inbound_channel,
};

// ============================================================================
// Constants
// ============================================================================

/// Entries kept in each activity log before the oldest are discarded.
pub const LOG_CAPACITY: usize = 1024;

// ============================================================================
// Types
// ============================================================================

/// Peer behaviour callback.
type PeerFn = dyn Fn(&PeerRequest) -> PeerReply + Send + Sync;

/// A request as seen by the scripted peer.
#[derive(Debug, Clone)]
pub struct PeerRequest {
    /// Window the request was posted to.
    pub window: WindowId,
    /// URL the window was opened at.
    pub url: Url,
    /// Correlation ID, if the sender waits for a reply.
    pub id: Option<RequestId>,
    /// Method name.
    pub method: String,
    /// Method params.
    pub params: Option<Value>,
}

impl PeerRequest {
    /// Returns a named param.
    #[inline]
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.as_ref().and_then(|p| p.get(key))
    }
}

/// What the scripted peer does with a request.
#[derive(Debug, Clone)]
pub enum PeerReply {
    /// Never answer.
    Ignore,
    /// Answer with a response after `delay`.
    Respond {
        /// Response status.
        status: ResponseStatus,
        /// Optional message.
        message: Option<String>,
        /// Optional data.
        data: Option<Value>,
        /// Delivery delay.
        delay: Duration,
    },
}

impl PeerReply {
    /// Success with no data.
    #[must_use]
    pub fn ok() -> Self {
        Self::Respond {
            status: ResponseStatus::Success,
            message: None,
            data: None,
            delay: Duration::ZERO,
        }
    }

    /// Success carrying `data`.
    #[must_use]
    pub fn success(data: Value) -> Self {
        Self::Respond {
            status: ResponseStatus::Success,
            message: None,
            data: Some(data),
            delay: Duration::ZERO,
        }
    }

    /// Error carrying `message`.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Respond {
            status: ResponseStatus::Error,
            message: Some(message.into()),
            data: None,
            delay: Duration::ZERO,
        }
    }

    /// Delays delivery of the reply.
    #[must_use]
    pub fn after(self, delay: Duration) -> Self {
        match self {
            Self::Respond {
                status,
                message,
                data,
                ..
            } => Self::Respond {
                status,
                message,
                data,
                delay,
            },
            Self::Ignore => Self::Ignore,
        }
    }
}

/// Something the host was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// A popup was opened.
    Opened {
        /// New window.
        window: WindowId,
        /// URL it was opened at.
        url: String,
    },
    /// A frame was created.
    FrameAttached {
        /// New frame.
        window: WindowId,
        /// Frame element ID.
        frame_id: String,
    },
    /// A message was posted.
    Posted {
        /// Target window.
        window: WindowId,
        /// Method, for requests.
        method: Option<String>,
    },
    /// A window was focused.
    Focused(WindowId),
    /// A window was closed by the local end.
    Closed(WindowId),
    /// A window was closed by the user.
    ClosedByUser(WindowId),
}

/// A message posted through the host.
#[derive(Debug, Clone)]
pub struct PostedMessage {
    /// Target window.
    pub window: WindowId,
    /// Origin the sender restricted delivery to.
    pub target_origin: String,
    /// Channel named in the envelope.
    pub channel: String,
    /// Wrapped message.
    pub message: Value,
}

impl PostedMessage {
    /// Method name, for requests.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        self.message.get("method").and_then(Value::as_str)
    }

    /// Correlation ID, if present.
    #[must_use]
    pub fn request_id(&self) -> Option<RequestId> {
        self.message
            .get("id")
            .and_then(|id| serde_json::from_value(id.clone()).ok())
    }
}

/// A simulated window or frame.
struct MemoryWindow {
    url: Url,
    origin: String,
    frame_id: Option<String>,
    closed: bool,
}

#[derive(Default)]
struct MemoryState {
    windows: FxHashMap<WindowId, MemoryWindow>,
    events: VecDeque<HostEvent>,
    posted: VecDeque<PostedMessage>,
    blocked: bool,
}

impl MemoryState {
    fn record(&mut self, event: HostEvent) {
        if self.events.len() == LOG_CAPACITY {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    fn record_posted(&mut self, posted: PostedMessage) {
        if self.posted.len() == LOG_CAPACITY {
            self.posted.pop_front();
        }
        self.posted.push_back(posted);
    }
}

// ============================================================================
// MemoryHost
// ============================================================================

/// In-memory [`WindowHost`] backed by a scripted peer.
pub struct MemoryHost {
    /// Delivery path back to the channel.
    inbound: InboundSender,
    /// Peer behaviour.
    peer: RwLock<Arc<PeerFn>>,
    /// Windows and recorded activity.
    state: Mutex<MemoryState>,
}

impl fmt::Debug for MemoryHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryHost")
            .field("windows", &state.windows.len())
            .field("events", &state.events.len())
            .field("blocked", &state.blocked)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// MemoryHost - Constructor
// ============================================================================

impl MemoryHost {
    /// Creates a host whose peer never answers.
    #[must_use]
    pub fn new() -> (Arc<Self>, InboundReceiver) {
        Self::with_peer(|_| PeerReply::Ignore)
    }

    /// Creates a host with the given peer behaviour.
    #[must_use]
    pub fn with_peer<F>(peer: F) -> (Arc<Self>, InboundReceiver)
    where
        F: Fn(&PeerRequest) -> PeerReply + Send + Sync + 'static,
    {
        let (inbound, inbound_rx) = inbound_channel();
        let host = Arc::new(Self {
            inbound,
            peer: RwLock::new(Arc::new(peer)),
            state: Mutex::new(MemoryState::default()),
        });
        (host, inbound_rx)
    }
}

// ============================================================================
// MemoryHost - Scripting
// ============================================================================

impl MemoryHost {
    /// Replaces the peer behaviour.
    pub fn set_peer<F>(&self, peer: F)
    where
        F: Fn(&PeerRequest) -> PeerReply + Send + Sync + 'static,
    {
        *self.peer.write() = Arc::new(peer);
    }

    /// Makes `open` and `attach_frame` fail, like a popup blocker.
    pub fn set_blocked(&self, blocked: bool) {
        self.state.lock().blocked = blocked;
    }

    /// Simulates the user closing a window.
    pub fn close_by_user(&self, window: WindowId) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if let Some(entry) = state.windows.get_mut(&window)
            && !entry.closed
        {
            entry.closed = true;
            state.record(HostEvent::ClosedByUser(window));
            debug!(%window, "Window closed by user");
        }
    }

    /// Delivers `message` on `channel` as if posted by `window`.
    ///
    /// The frame carries the window's real origin.
    pub fn inject(&self, window: WindowId, channel: &str, message: Value) {
        let origin = self
            .state
            .lock()
            .windows
            .get(&window)
            .map(|w| w.origin.clone())
            .unwrap_or_else(|| "null".to_string());

        let data = serde_json::to_string(&Envelope::new(channel, message)).unwrap_or_default();
        self.inject_raw(Some(window), &origin, data);
    }

    /// Delivers a raw frame with an arbitrary origin.
    pub fn inject_raw(&self, source: Option<WindowId>, origin: &str, data: impl Into<String>) {
        let _ = self.inbound.send(InboundFrame {
            source,
            origin: origin.to_string(),
            data: data.into(),
        });
    }
}

// ============================================================================
// MemoryHost - Inspection
// ============================================================================

impl MemoryHost {
    /// Returns everything the host was asked to do, in order.
    #[must_use]
    pub fn events(&self) -> Vec<HostEvent> {
        self.state.lock().events.iter().cloned().collect()
    }

    /// Returns every message posted through the host, in order.
    #[must_use]
    pub fn posted(&self) -> Vec<PostedMessage> {
        self.state.lock().posted.iter().cloned().collect()
    }

    /// Forgets recorded events and posted messages. Windows are kept.
    pub fn clear_log(&self) {
        let mut state = self.state.lock();
        state.events.clear();
        state.posted.clear();
    }

    /// Returns the methods of posted requests, in order.
    #[must_use]
    pub fn posted_methods(&self) -> Vec<String> {
        self.state
            .lock()
            .posted
            .iter()
            .filter_map(|p| p.method().map(str::to_string))
            .collect()
    }

    /// Returns the windows that are currently open.
    #[must_use]
    pub fn open_windows(&self) -> Vec<WindowId> {
        let state = self.state.lock();
        let mut open: Vec<_> = state
            .windows
            .iter()
            .filter(|(_, w)| !w.closed)
            .map(|(id, _)| *id)
            .collect();
        open.sort_unstable();
        open
    }

    /// Returns the URL a window was opened at.
    #[must_use]
    pub fn url_of(&self, window: WindowId) -> Option<Url> {
        self.state.lock().windows.get(&window).map(|w| w.url.clone())
    }

    /// Sends a reply frame, after `delay` if non-zero.
    fn deliver(&self, frame: InboundFrame, delay: Duration) {
        if delay.is_zero() {
            let _ = self.inbound.send(frame);
            return;
        }

        let inbound = self.inbound.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = inbound.send(frame);
        });
    }

    fn insert_window(state: &mut MemoryState, url: &Url, frame_id: Option<String>) -> WindowId {
        let window = WindowId::next();
        state.windows.insert(
            window,
            MemoryWindow {
                url: url.clone(),
                origin: url.origin().ascii_serialization(),
                frame_id,
                closed: false,
            },
        );
        window
    }
}

// ============================================================================
// MemoryHost - WindowHost
// ============================================================================

impl WindowHost for MemoryHost {
    fn open(&self, url: &Url, geometry: PopupGeometry) -> Option<WindowId> {
        let mut state = self.state.lock();
        if state.blocked {
            debug!(%url, "Popup blocked");
            return None;
        }

        let window = Self::insert_window(&mut state, url, None);
        state.record(HostEvent::Opened {
            window,
            url: url.to_string(),
        });
        debug!(%window, %url, width = geometry.width, height = geometry.height, "Popup opened");
        Some(window)
    }

    fn attach_frame(&self, url: &Url, frame_id: &str) -> Option<WindowId> {
        let mut state = self.state.lock();
        if state.blocked {
            return None;
        }

        let existing = state
            .windows
            .iter()
            .find(|(_, w)| !w.closed && w.frame_id.as_deref() == Some(frame_id))
            .map(|(id, _)| *id);
        if let Some(window) = existing {
            return Some(window);
        }

        let window = Self::insert_window(&mut state, url, Some(frame_id.to_string()));
        state.record(HostEvent::FrameAttached {
            window,
            frame_id: frame_id.to_string(),
        });
        debug!(%window, %url, frame_id, "Frame attached");
        Some(window)
    }

    fn post_message(&self, target: WindowId, message: &str, target_origin: &str) -> Result<()> {
        let envelope: Envelope<Value> = serde_json::from_str(message)?;

        let (url, origin) = {
            let mut state = self.state.lock();
            let (url, origin) = state
                .windows
                .get(&target)
                .filter(|w| !w.closed)
                .map(|w| (w.url.clone(), w.origin.clone()))
                .ok_or_else(|| Error::invalid_window(format!("Window {target} is closed")))?;

            let posted = PostedMessage {
                window: target,
                target_origin: target_origin.to_string(),
                channel: envelope.channel.clone(),
                message: envelope.message.clone(),
            };
            state.record(HostEvent::Posted {
                window: target,
                method: posted.method().map(str::to_string),
            });
            state.record_posted(posted);
            (url, origin)
        };

        if origin != target_origin {
            trace!(window = %target, %origin, target_origin, "Target origin mismatch, message not delivered");
            return Ok(());
        }

        // Responses posted back to the peer need no scripted reaction.
        let Ok(inbound) = serde_json::from_value::<InboundRequest>(envelope.message) else {
            return Ok(());
        };

        let request = PeerRequest {
            window: target,
            url,
            id: inbound.id,
            method: inbound.method,
            params: inbound.params,
        };

        let peer = Arc::clone(&*self.peer.read());
        let reply = peer(&request);

        if let PeerReply::Respond {
            status,
            message,
            data,
            delay,
        } = reply
            && let Some(id) = request.id
        {
            let response = Response {
                id,
                status,
                message,
                data,
            };
            let data = serde_json::to_string(&Envelope::new(envelope.channel, response))?;
            trace!(window = %target, method = %request.method, ?delay, "Peer replying");
            self.deliver(
                InboundFrame {
                    source: Some(target),
                    origin,
                    data,
                },
                delay,
            );
        }

        Ok(())
    }

    fn focus(&self, target: WindowId) {
        let mut state = self.state.lock();
        if state.windows.get(&target).is_some_and(|w| !w.closed) {
            state.record(HostEvent::Focused(target));
        }
    }

    fn close(&self, target: WindowId) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if let Some(entry) = state.windows.get_mut(&target)
            && !entry.closed
        {
            entry.closed = true;
            state.record(HostEvent::Closed(target));
            debug!(window = %target, "Window closed");
        }
    }

    fn is_closed(&self, target: WindowId) -> bool {
        self.state
            .lock()
            .windows
            .get(&target)
            .is_none_or(|w| w.closed)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn url() -> Url {
        Url::parse("https://wallet.example.com/bridge/unlock.html").expect("url")
    }

    #[test]
    fn test_open_and_close_idempotent() {
        let (host, _rx) = MemoryHost::new();
        let window = host.open(&url(), PopupGeometry::default()).expect("open");

        assert!(!host.is_closed(window));
        host.close(window);
        host.close(window);
        assert!(host.is_closed(window));

        let closes = host
            .events()
            .iter()
            .filter(|e| matches!(e, HostEvent::Closed(_)))
            .count();
        assert_eq!(closes, 1);
    }

    #[test]
    fn test_activity_log_is_bounded_and_clearable() {
        let (host, _rx) = MemoryHost::new();
        let window = host.open(&url(), PopupGeometry::default()).expect("open");

        for _ in 0..LOG_CAPACITY + 10 {
            host.focus(window);
        }
        let events = host.events();
        assert_eq!(events.len(), LOG_CAPACITY);
        assert!(events.iter().all(|e| *e == HostEvent::Focused(window)));

        host.clear_log();
        assert!(host.events().is_empty());
        assert!(host.posted().is_empty());
        assert_eq!(host.open_windows(), vec![window]);
    }

    #[test]
    fn test_blocked_popup() {
        let (host, _rx) = MemoryHost::new();
        host.set_blocked(true);
        assert!(host.open(&url(), PopupGeometry::default()).is_none());
        assert!(host.open_windows().is_empty());
    }

    #[test]
    fn test_attach_frame_reuses_existing() {
        let (host, _rx) = MemoryHost::new();
        let first = host.attach_frame(&url(), "Wallet").expect("frame");
        let second = host.attach_frame(&url(), "Wallet").expect("frame");
        assert_eq!(first, second);
    }

    #[test]
    fn test_post_to_closed_window_fails() {
        let (host, _rx) = MemoryHost::new();
        let window = host.open(&url(), PopupGeometry::default()).expect("open");
        host.close_by_user(window);

        let message = json!({ "channel": "c", "message": { "method": "status" } }).to_string();
        let result = host.post_message(window, &message, "https://wallet.example.com");
        assert!(matches!(result, Err(Error::InvalidWindow { .. })));
    }

    #[tokio::test]
    async fn test_peer_reply_delivered_with_window_origin() {
        let (host, mut rx) = MemoryHost::with_peer(|_| PeerReply::success(json!({ "ok": true })));
        let window = host.open(&url(), PopupGeometry::default()).expect("open");

        let id = RequestId::generate();
        let message = json!({ "channel": "c", "message": { "id": id, "method": "status" } });
        host.post_message(window, &message.to_string(), "https://wallet.example.com")
            .expect("post");

        let frame = rx.recv().await.expect("frame");
        assert_eq!(frame.source, Some(window));
        assert_eq!(frame.origin, "https://wallet.example.com");

        let envelope: Envelope<Response> = serde_json::from_str(&frame.data).expect("envelope");
        assert_eq!(envelope.channel, "c");
        assert_eq!(envelope.message.id, id);
        assert!(envelope.message.is_success());
        assert_eq!(host.posted_methods(), vec!["status"]);
    }

    #[tokio::test]
    async fn test_wrong_target_origin_not_delivered() {
        let (host, mut rx) = MemoryHost::with_peer(|_| PeerReply::ok());
        let window = host.open(&url(), PopupGeometry::default()).expect("open");

        let message = json!({ "channel": "c", "message": { "id": RequestId::generate(), "method": "status" } });
        host.post_message(window, &message.to_string(), "https://evil.example.com")
            .expect("post");

        assert!(rx.try_recv().is_err());
    }
}
