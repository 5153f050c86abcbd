//! Error types for the wallet bridge.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use wallet_bridge::{Result, Wallet};
//!
//! async fn example(wallet: &Wallet) -> Result<()> {
//!     let accounts = wallet.connect().await?;
//!     println!("{} accounts", accounts.len());
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidArgument`] |
//! | Window | [`Error::WindowNotLoaded`], [`Error::WindowAlreadyOpen`], [`Error::InvalidWindow`], [`Error::WindowClosed`], [`Error::Aborted`] |
//! | Protocol | [`Error::Remote`], [`Error::Protocol`], [`Error::Decode`] |
//! | Correlation | [`Error::RequestTimeout`], [`Error::ChannelClosed`] |
//! | External | [`Error::Json`], [`Error::Url`] |
//!
//! [`Error`] is `Clone`: a popup shared between several callers hands the
//! same outcome to each of them.

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;
use std::sync::Arc;

use thiserror::Error;

use crate::identifiers::{RequestId, WindowId};
use crate::window::OperationKind;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug, Clone)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when the wallet builder is given invalid settings.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Invalid argument passed to an operation.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // Window Errors
    // ========================================================================
    /// The window never answered a liveness probe.
    #[error("Window not loaded after {attempts} attempts")]
    WindowNotLoaded {
        /// Number of probe attempts made.
        attempts: u32,
    },

    /// A popup for this operation kind is already in flight.
    ///
    /// The existing popup has been brought to the foreground.
    #[error("Window already open for {kind}")]
    WindowAlreadyOpen {
        /// Operation kind holding the slot.
        kind: OperationKind,
    },

    /// The host could not provide a usable window (popup blocked, frame missing).
    #[error("Invalid window: {message}")]
    InvalidWindow {
        /// Description of the failure.
        message: String,
    },

    /// The window was closed before the operation completed.
    #[error("Window {window} was closed")]
    WindowClosed {
        /// The closed window.
        window: WindowId,
    },

    /// The operation driving a shared popup was dropped before finishing.
    #[error("Operation {kind} was aborted")]
    Aborted {
        /// Operation kind that was aborted.
        kind: OperationKind,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// The remote window answered with `status: "error"`.
    #[error("Remote error: {message}")]
    Remote {
        /// Message supplied by the remote window.
        message: String,
    },

    /// Protocol violation or unexpected response shape.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// A byte field could not be decoded.
    #[error("Failed to decode {field}: {message}")]
    Decode {
        /// Name of the field.
        field: String,
        /// Decoder message.
        message: String,
    },

    // ========================================================================
    // Correlation Errors
    // ========================================================================
    /// No matching response arrived before the deadline.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// The channel was closed while a request was outstanding.
    #[error("Channel closed")]
    ChannelClosed,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(Arc<serde_json::Error>),

    /// URL parse error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(Arc::new(err))
    }
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a window not loaded error.
    #[inline]
    pub fn window_not_loaded(attempts: u32) -> Self {
        Self::WindowNotLoaded { attempts }
    }

    /// Creates a window already open error.
    #[inline]
    pub fn window_already_open(kind: OperationKind) -> Self {
        Self::WindowAlreadyOpen { kind }
    }

    /// Creates an invalid window error.
    #[inline]
    pub fn invalid_window(message: impl Into<String>) -> Self {
        Self::InvalidWindow {
            message: message.into(),
        }
    }

    /// Creates a window closed error.
    #[inline]
    pub fn window_closed(window: WindowId) -> Self {
        Self::WindowClosed { window }
    }

    /// Creates an aborted error.
    #[inline]
    pub fn aborted(kind: OperationKind) -> Self {
        Self::Aborted { kind }
    }

    /// Creates a remote error.
    #[inline]
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a decode error.
    #[inline]
    pub fn decode(field: impl Into<String>, message: impl ToString) -> Self {
        Self::Decode {
            field: field.into(),
            message: message.to_string(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RequestTimeout { .. })
    }

    /// Returns `true` if this error concerns the popup or frame itself.
    #[inline]
    #[must_use]
    pub fn is_window_error(&self) -> bool {
        matches!(
            self,
            Self::WindowNotLoaded { .. }
                | Self::WindowAlreadyOpen { .. }
                | Self::InvalidWindow { .. }
                | Self::WindowClosed { .. }
                | Self::Aborted { .. }
        )
    }

    /// Returns `true` if the remote window rejected the request.
    #[inline]
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed when the operation is started again.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::RequestTimeout { .. }
                | Self::WindowNotLoaded { .. }
                | Self::WindowAlreadyOpen { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
