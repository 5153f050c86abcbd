//! Window host abstraction.
//!
//! The bridge never touches a real windowing system. Everything it needs from
//! the environment (opening a popup, posting a message, focusing, closing)
//! goes through the [`WindowHost`] trait, and inbound messages arrive as
//! [`InboundFrame`]s on an unbounded channel.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   post_message(target, json, origin)   ┌─────────────────┐
//! │  Channel (Rust)  │ ─────────────────────────────────────► │  WindowHost     │
//! │                  │                                         │  (popup/iframe) │
//! │  event loop      │ ◄───────────────────────────────────── │                 │
//! └──────────────────┘     InboundFrame { source, origin }     └─────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `memory` | In-memory host with a scriptable peer |

// ============================================================================
// Submodules
// ============================================================================

/// In-memory host with a scriptable peer.
pub mod memory;

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::mpsc;
use url::Url;

use crate::error::Result;
use crate::identifiers::WindowId;

// ============================================================================
// Re-exports
// ============================================================================

pub use memory::{HostEvent, LOG_CAPACITY, MemoryHost, PeerReply, PeerRequest, PostedMessage};

// ============================================================================
// Inbound Frames
// ============================================================================

/// A raw message delivered by the host to the local end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    /// Window the message came from, if the host knows it.
    pub source: Option<WindowId>,
    /// Origin of the sender, as reported by the host.
    pub origin: String,
    /// Serialized message.
    pub data: String,
}

/// Sending half used by hosts to deliver inbound frames.
pub type InboundSender = mpsc::UnboundedSender<InboundFrame>;

/// Receiving half consumed by the channel event loop.
pub type InboundReceiver = mpsc::UnboundedReceiver<InboundFrame>;

/// Creates a new inbound frame channel.
#[inline]
#[must_use]
pub fn inbound_channel() -> (InboundSender, InboundReceiver) {
    mpsc::unbounded_channel()
}

// ============================================================================
// PopupGeometry
// ============================================================================

/// Popup dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupGeometry {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl PopupGeometry {
    /// Creates a geometry.
    #[inline]
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Validates the dimensions.
    ///
    /// # Errors
    ///
    /// Returns error message if validation fails.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err("Popup dimensions must be greater than zero".to_string());
        }
        Ok(())
    }
}

impl Default for PopupGeometry {
    fn default() -> Self {
        Self::new(400, 600)
    }
}

// ============================================================================
// WindowHost
// ============================================================================

/// The windowing environment the bridge runs in.
///
/// All methods are synchronous, mirroring the browser primitives they wrap.
pub trait WindowHost: Send + Sync {
    /// Opens a popup at `url`. Returns `None` if the environment blocked it.
    fn open(&self, url: &Url, geometry: PopupGeometry) -> Option<WindowId>;

    /// Finds the frame with `frame_id`, creating it at `url` if missing.
    ///
    /// Returns `None` if no usable frame could be obtained.
    fn attach_frame(&self, url: &Url, frame_id: &str) -> Option<WindowId>;

    /// Posts a serialized message to `target`, restricted to `target_origin`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWindow`](crate::Error::InvalidWindow) if the
    /// target is unknown or already closed.
    fn post_message(&self, target: WindowId, message: &str, target_origin: &str) -> Result<()>;

    /// Brings `target` to the foreground.
    fn focus(&self, target: WindowId);

    /// Closes `target`. Closing a closed or unknown window is a no-op.
    fn close(&self, target: WindowId);

    /// Returns `true` if `target` is closed or unknown.
    fn is_closed(&self, target: WindowId) -> bool;
}

// ============================================================================
// Tests
// ============================================================================
