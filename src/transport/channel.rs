//! Named, origin-aware message channel and its event loop.
//!
//! A [`Channel`] wraps the host's postMessage primitive. Outbound requests are
//! posted through [`WindowHost::post_message`]; inbound frames arrive on the
//! host's [`InboundReceiver`] and are consumed by a spawned event loop that:
//!
//! - drops frames from unexpected origins or other channels,
//! - matches responses to outstanding requests by ID,
//! - hands peer-initiated requests to the registered handler and posts its
//!   reply back to the source window.
//!
//! # Example
//!
//! ```ignore
//! let channel = Channel::new(CHANNEL_NAME, origin, host, inbound_rx);
//! let response = channel.request(window, Command::Status, Duration::from_millis(300)).await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::host::{InboundFrame, InboundReceiver, WindowHost};
use crate::identifiers::WindowId;
use crate::protocol::{Command, Envelope, InboundRequest, Message, Request, Response};

use super::correlation::CorrelationTable;
use super::origin::Origin;

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for a correlated request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(1_600_000);

// ============================================================================
// Types
// ============================================================================

/// Inbound request handler.
///
/// Called for each peer-initiated request. Return `Some(Response)` to answer
/// a request that carries an ID.
pub type InboundHandler = Box<dyn Fn(InboundRequest) -> Option<Response> + Send + Sync>;

/// Shared handler slot.
type HandlerSlot = Arc<Mutex<Option<InboundHandler>>>;

// ============================================================================
// SendOptions
// ============================================================================

/// Options for [`Channel::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    /// Wait for the correlated response.
    pub wait_for_reply: bool,
    /// Upper bound on the wait.
    pub timeout: Duration,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            wait_for_reply: true,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl SendOptions {
    /// Posts without waiting for a reply.
    #[inline]
    #[must_use]
    pub fn no_reply() -> Self {
        Self {
            wait_for_reply: false,
            ..Self::default()
        }
    }

    /// Waits for a reply for at most `timeout`.
    #[inline]
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

// ============================================================================
// ChannelCommand
// ============================================================================

/// Internal commands for the event loop.
enum ChannelCommand {
    /// Stop the event loop.
    Shutdown,
}

// ============================================================================
// Channel
// ============================================================================

/// A named channel to one or more windows sharing an origin.
///
/// Cloning yields another handle to the same channel. The event loop stops on
/// [`close`](Self::close) or when the host drops its inbound sender.
#[derive(Clone)]
pub struct Channel {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    /// Channel name carried in every envelope.
    name: String,
    /// Origin inbound frames must come from, and outbound frames target.
    origin: Origin,
    /// Window host.
    host: Arc<dyn WindowHost>,
    /// Outstanding requests (shared with event loop).
    correlation: CorrelationTable,
    /// Inbound handler (shared with event loop).
    handler: HandlerSlot,
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ChannelCommand>,
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.inner.name)
            .field("origin", &self.inner.origin)
            .field("pending", &self.inner.correlation.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Channel - Constructor
// ============================================================================

impl Channel {
    /// Creates a channel and spawns its event loop.
    ///
    /// Must be called within a tokio runtime.
    pub fn new(
        name: impl Into<String>,
        origin: Origin,
        host: Arc<dyn WindowHost>,
        inbound_rx: InboundReceiver,
    ) -> Self {
        let name = name.into();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let correlation = CorrelationTable::default();
        let handler: HandlerSlot = Arc::new(Mutex::new(None));

        tokio::spawn(run_event_loop(
            EventLoop {
                name: name.clone(),
                origin: origin.clone(),
                host: Arc::clone(&host),
                correlation: correlation.clone(),
                handler: Arc::clone(&handler),
            },
            inbound_rx,
            command_rx,
        ));

        debug!(channel = %name, %origin, "Channel opened");

        Self {
            inner: Arc::new(ChannelInner {
                name,
                origin,
                host,
                correlation,
                handler,
                command_tx,
            }),
        }
    }
}

// ============================================================================
// Channel - Sending
// ============================================================================

impl Channel {
    /// Posts `command` to `target`, restricted to `target_origin`.
    ///
    /// Returns `Ok(None)` right after posting when `options.wait_for_reply` is
    /// false, otherwise the correlated response. An error response is still
    /// `Ok`; use [`Response::into_result`] to surface it.
    ///
    /// # Errors
    ///
    /// - [`Error::ChannelClosed`] if the event loop has stopped
    /// - [`Error::InvalidWindow`] if the host cannot deliver to `target`
    /// - [`Error::RequestTimeout`] if no response arrived in time
    /// - [`Error::Protocol`] if too many requests are outstanding
    pub async fn send(
        &self,
        target: WindowId,
        command: Command,
        target_origin: &Origin,
        options: SendOptions,
    ) -> Result<Option<Response>> {
        if self.is_closed() {
            return Err(Error::ChannelClosed);
        }

        let method = command.method();

        if !options.wait_for_reply {
            let request = Request::new(command);
            self.post(target, &request, target_origin)?;
            trace!(window = %target, method, id = %request.id, "Posted without reply");
            return Ok(None);
        }

        let pending = self.inner.correlation.register()?;
        let request = Request::with_id(pending.id(), command);
        self.post(target, &request, target_origin)?;
        trace!(window = %target, method, id = %request.id, "Posted request");

        let response = pending.wait(options.timeout).await?;
        trace!(window = %target, method, id = %response.id, status = ?response.status, "Received response");
        Ok(Some(response))
    }

    /// Sends `command` to `target` on the channel's origin and waits for the
    /// response.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send).
    pub async fn request(
        &self,
        target: WindowId,
        command: Command,
        timeout: Duration,
    ) -> Result<Response> {
        let origin = self.inner.origin.clone();
        self.send(target, command, &origin, SendOptions::with_timeout(timeout))
            .await?
            .ok_or(Error::ChannelClosed)
    }

    fn post(&self, target: WindowId, request: &Request, target_origin: &Origin) -> Result<()> {
        let json = serde_json::to_string(&Envelope::new(self.inner.name.as_str(), request))?;
        self.inner
            .host
            .post_message(target, &json, target_origin.as_str())
    }
}

// ============================================================================
// Channel - Handler & Lifecycle
// ============================================================================

impl Channel {
    /// Registers the inbound request handler, replacing any previous one.
    pub fn on_message(&self, handler: InboundHandler) {
        *self.inner.handler.lock() = Some(handler);
    }

    /// Removes the inbound request handler.
    pub fn clear_handler(&self) {
        *self.inner.handler.lock() = None;
    }

    /// Stops the event loop. Outstanding requests fail with
    /// [`Error::ChannelClosed`].
    pub fn close(&self) {
        let _ = self.inner.command_tx.send(ChannelCommand::Shutdown);
    }

    /// Returns `true` once the event loop has stopped.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.command_tx.is_closed()
    }

    /// Returns the channel name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the expected peer origin.
    #[inline]
    #[must_use]
    pub fn origin(&self) -> &Origin {
        &self.inner.origin
    }

    /// Returns the window host.
    #[inline]
    #[must_use]
    pub fn host(&self) -> &Arc<dyn WindowHost> {
        &self.inner.host
    }

    /// Returns the number of outstanding requests.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.correlation.len()
    }
}

// ============================================================================
// Event Loop
// ============================================================================

/// State shared between the channel handles and its event loop.
struct EventLoop {
    name: String,
    origin: Origin,
    host: Arc<dyn WindowHost>,
    correlation: CorrelationTable,
    handler: HandlerSlot,
}

async fn run_event_loop(
    state: EventLoop,
    mut inbound_rx: InboundReceiver,
    mut command_rx: mpsc::UnboundedReceiver<ChannelCommand>,
) {
    loop {
        tokio::select! {
            frame = inbound_rx.recv() => {
                match frame {
                    Some(frame) => state.handle_frame(frame),
                    None => {
                        debug!(channel = %state.name, "Inbound stream ended");
                        break;
                    }
                }
            }

            command = command_rx.recv() => {
                match command {
                    Some(ChannelCommand::Shutdown) => {
                        debug!(channel = %state.name, "Shutdown command received");
                        break;
                    }
                    None => {
                        debug!(channel = %state.name, "All channel handles dropped");
                        break;
                    }
                }
            }
        }
    }

    command_rx.close();
    state.correlation.clear();

    debug!(channel = %state.name, "Event loop terminated");
}

impl EventLoop {
    /// Filters and dispatches one inbound frame.
    fn handle_frame(&self, frame: InboundFrame) {
        if !self.origin.matches(&frame.origin) {
            trace!(origin = %frame.origin, expected = %self.origin, "Dropped frame from foreign origin");
            return;
        }

        let Ok(envelope) = serde_json::from_str::<Envelope<Value>>(&frame.data) else {
            trace!("Dropped frame without envelope");
            return;
        };

        if envelope.channel != self.name {
            trace!(channel = %envelope.channel, "Dropped frame for another channel");
            return;
        }

        match Message::parse(envelope.message) {
            Some(Message::Response(response)) => {
                self.correlation.resolve(response);
            }
            Some(Message::Request(request)) => self.handle_request(frame.source, request),
            None => trace!("Dropped frame with invalid message shape"),
        }
    }

    /// Hands a peer-initiated request to the handler and posts its reply.
    fn handle_request(&self, source: Option<WindowId>, request: InboundRequest) {
        let method = request.method.clone();
        let reply = {
            let guard = self.handler.lock();
            match guard.as_ref() {
                Some(handler) => handler(request),
                None => {
                    trace!(method = %method, "No handler for inbound request");
                    return;
                }
            }
        };

        let Some(reply) = reply else {
            return;
        };

        let Some(source) = source else {
            warn!(method = %method, "Cannot reply to a request without source window");
            return;
        };

        let result = serde_json::to_string(&Envelope::new(self.name.as_str(), &reply))
            .map_err(Error::from)
            .and_then(|json| self.host.post_message(source, &json, self.origin.as_str()));

        if let Err(e) = result {
            warn!(window = %source, method = %method, error = %e, "Failed to post reply");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};
    use url::Url;

    use crate::host::{MemoryHost, PeerReply, PopupGeometry};
    use crate::identifiers::RequestId;

    const NAME: &str = "test-channel";
    const PEER: &str = "https://wallet.example.com/bridge/";

    fn setup<F>(peer: F) -> (Arc<MemoryHost>, Channel, WindowId)
    where
        F: Fn(&crate::host::PeerRequest) -> PeerReply + Send + Sync + 'static,
    {
        let (host, inbound) = MemoryHost::with_peer(peer);
        let url = Url::parse(PEER).expect("url");
        let window = host.open(&url, PopupGeometry::default()).expect("window");
        let origin = Origin::from_url(&url).expect("origin");
        let channel = Channel::new(NAME, origin, host.clone(), inbound);
        (host, channel, window)
    }

    #[tokio::test]
    async fn test_request_round_trip() {
        let (_host, channel, window) = setup(|request| match request.method.as_str() {
            "status" => PeerReply::success(json!({ "isLocked": true })),
            _ => PeerReply::error("unsupported"),
        });

        let response = assert_ok!(
            channel
                .request(window, Command::Status, Duration::from_secs(1))
                .await
        );
        assert!(response.is_success());
        assert!(response.get_bool("isLocked"));
        assert_eq!(channel.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_error_response_is_delivered() {
        let (_host, channel, window) = setup(|_| PeerReply::error("Rejected by user"));

        let response = assert_ok!(
            channel
                .request(window, Command::Lock, Duration::from_secs(1))
                .await
        );
        let err = assert_err!(response.into_result());
        assert!(matches!(err, Error::Remote { message } if message == "Rejected by user"));
    }

    #[tokio::test]
    async fn test_send_without_reply() {
        let (host, channel, window) = setup(|_| PeerReply::Ignore);
        let origin = channel.origin().clone();

        let response = assert_ok!(
            channel
                .send(window, Command::Lock, &origin, SendOptions::no_reply())
                .await
        );
        assert!(response.is_none());
        assert_eq!(host.posted_methods(), vec!["lock"]);
        assert_eq!(channel.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_when_peer_silent() {
        let (_host, channel, window) = setup(|_| PeerReply::Ignore);

        let err = assert_err!(
            channel
                .request(window, Command::Status, Duration::from_millis(300))
                .await
        );
        assert!(err.is_timeout());
        assert_eq!(channel.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_resolve_out_of_order() {
        let (_host, channel, window) = setup(|request| match request.method.as_str() {
            "status" => PeerReply::success(json!("status")).after(Duration::from_millis(200)),
            "list" => PeerReply::success(json!("list")).after(Duration::from_millis(50)),
            _ => PeerReply::ok(),
        });

        let (status, list) = tokio::join!(
            channel.request(window, Command::Status, Duration::from_secs(1)),
            channel.request(window, Command::List, Duration::from_secs(1)),
        );

        assert_eq!(status.expect("status").data, Some(json!("status")));
        assert_eq!(list.expect("list").data, Some(json!("list")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreign_origin_dropped() {
        let (host, channel, window) = setup(|_| PeerReply::Ignore);

        let fut = channel.request(window, Command::Status, Duration::from_millis(500));
        tokio::pin!(fut);

        // Let the request register, then forge a response from elsewhere.
        tokio::select! {
            _ = &mut fut => panic!("request completed early"),
            () = tokio::time::sleep(Duration::from_millis(10)) => {}
        }
        let id = host.posted()[0].request_id().expect("id");
        let forged = Envelope::new(NAME, Response::success(id, None));
        host.inject_raw(
            Some(window),
            "https://evil.example.com",
            serde_json::to_string(&forged).expect("json"),
        );

        let err = assert_err!(fut.await);
        assert!(err.is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_channel_dropped() {
        let (host, channel, window) = setup(|_| PeerReply::Ignore);

        let fut = channel.request(window, Command::Status, Duration::from_millis(500));
        tokio::pin!(fut);
        tokio::select! {
            _ = &mut fut => panic!("request completed early"),
            () = tokio::time::sleep(Duration::from_millis(10)) => {}
        }

        let id = host.posted()[0].request_id().expect("id");
        host.inject(
            window,
            "another-channel",
            json!({ "id": id, "status": "success" }),
        );

        let err = assert_err!(fut.await);
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_handler_reply_posted_to_source() {
        let (host, channel, window) = setup(|_| PeerReply::Ignore);
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        channel.on_message(Box::new(move |request| {
            counter.fetch_add(1, Ordering::SeqCst);
            request.reply_success(Some(json!({ "pong": true })))
        }));

        let id = RequestId::generate();
        host.inject(window, NAME, json!({ "id": id, "method": "ping" }));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let posted = host.posted();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].message["id"], id.to_string());
        assert_eq!(posted[0].message["status"], "success");
    }

    #[tokio::test]
    async fn test_replaced_handler_takes_effect() {
        let (host, channel, window) = setup(|_| PeerReply::Ignore);
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&first);
        channel.on_message(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            None
        }));
        let counter = Arc::clone(&second);
        channel.on_message(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            None
        }));

        host.inject(window, NAME, json!({ "method": "update", "params": {} }));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_close_fails_pending_and_rejects_sends() {
        let (_host, channel, window) = setup(|_| PeerReply::Ignore);

        let pending = {
            let channel = channel.clone();
            tokio::spawn(async move {
                channel
                    .request(window, Command::Status, Duration::from_secs(60))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        channel.close();
        let err = assert_err!(pending.await.expect("join"));
        assert!(matches!(err, Error::ChannelClosed));

        assert!(channel.is_closed());
        let err = assert_err!(
            channel
                .request(window, Command::Status, Duration::from_secs(1))
                .await
        );
        assert!(matches!(err, Error::ChannelClosed));
    }

    #[tokio::test]
    async fn test_send_to_closed_window_fails() {
        let (host, channel, window) = setup(|_| PeerReply::ok());
        host.close(window);

        let err = assert_err!(
            channel
                .request(window, Command::Status, Duration::from_secs(1))
                .await
        );
        assert!(matches!(err, Error::InvalidWindow { .. }));
        assert_eq!(channel.pending_count(), 0);
    }
}
