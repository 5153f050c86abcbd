//! Popup handle and its lifecycle state machine.
//!
//! ```text
//! Closed ──► Opening ──► Loaded ──► InUse
//!    ▲          │           │  ◄──────┘ │
//!    └──────────┴───────────┴───────────┘
//! ```
//!
//! Any state may return to `Closed`; closing twice is a no-op.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use tracing::trace;

use crate::error::{Error, Result};
use crate::identifiers::{SubscriptionId, WindowId};

// ============================================================================
// OperationKind
// ============================================================================

/// The operation a popup or frame serves.
///
/// At most one popup per kind is in flight at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Account connection (`unlock`).
    Connect,
    /// Transaction signing (`transaction`).
    SignTransaction,
    /// Logic signature signing (`logicsig`).
    SignLogicSig,
    /// Long-lived hidden frame.
    Frame,
}

impl OperationKind {
    /// Returns the page the wallet UI serves for this kind.
    #[inline]
    #[must_use]
    pub const fn page(self) -> &'static str {
        match self {
            Self::Connect => "unlock.html",
            Self::SignTransaction => "signtx.html",
            Self::SignLogicSig => "logicsig.html",
            Self::Frame => "frame.html",
        }
    }

    /// Returns the snake_case name of the kind.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::SignTransaction => "sign_transaction",
            Self::SignLogicSig => "sign_logic_sig",
            Self::Frame => "frame",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// PopupState
// ============================================================================

/// Lifecycle state of a popup or frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PopupState {
    /// No window, or the window is gone.
    #[default]
    Closed,
    /// Window requested, not yet answering probes.
    Opening,
    /// Window answered a liveness probe.
    Loaded,
    /// The operation request is outstanding.
    InUse,
}

impl PopupState {
    /// Returns `true` if `self -> next` is a legal transition.
    #[must_use]
    pub const fn can_transition(self, next: Self) -> bool {
        matches!(
            (self, next),
            (_, Self::Closed)
                | (Self::Closed, Self::Opening)
                | (Self::Opening, Self::Loaded)
                | (Self::Loaded, Self::InUse)
                | (Self::InUse, Self::Loaded)
        )
    }
}

// ============================================================================
// PopupHandle
// ============================================================================

/// A window reference plus its lifecycle state.
#[derive(Debug, Clone)]
pub struct PopupHandle {
    kind: OperationKind,
    window: Option<WindowId>,
    state: PopupState,
    subscription: Option<SubscriptionId>,
}

impl PopupHandle {
    /// Creates a closed handle.
    #[must_use]
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            window: None,
            state: PopupState::Closed,
            subscription: None,
        }
    }

    /// Returns the operation kind.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Returns the window, if one was opened.
    #[inline]
    #[must_use]
    pub fn window(&self) -> Option<WindowId> {
        self.window
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> PopupState {
        self.state
    }

    /// Returns the active subscription (frame only).
    #[inline]
    #[must_use]
    pub fn subscription(&self) -> Option<SubscriptionId> {
        self.subscription
    }

    /// Sets or clears the active subscription.
    pub fn set_subscription(&mut self, subscription: Option<SubscriptionId>) {
        self.subscription = subscription;
    }

    /// Records the window the host opened and enters `Opening`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWindow`] if the handle is not closed.
    pub fn opened(&mut self, window: WindowId) -> Result<()> {
        self.transition(PopupState::Opening)?;
        self.window = Some(window);
        Ok(())
    }

    /// Moves to `next`.
    ///
    /// Entering `Closed` also forgets the window and subscription.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWindow`] for illegal transitions.
    pub fn transition(&mut self, next: PopupState) -> Result<()> {
        if !self.state.can_transition(next) {
            return Err(Error::invalid_window(format!(
                "Illegal {} popup transition {:?} -> {:?}",
                self.kind, self.state, next
            )));
        }

        trace!(kind = %self.kind, from = ?self.state, to = ?next, "Popup transition");
        self.state = next;
        if next == PopupState::Closed {
            self.window = None;
            self.subscription = None;
        }
        Ok(())
    }

    /// Returns `true` unless the handle is closed.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state != PopupState::Closed
    }
}

// ============================================================================
// Tests
// ============================================================================
