//! Popup and frame lifecycle.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `manager` | Opening, liveness probing, single-flight slots |
//! | `popup` | Popup handle and lifecycle state machine |

// ============================================================================
// Submodules
// ============================================================================

/// Opening, liveness probing and single-flight slots.
pub mod manager;

/// Popup handle and lifecycle state machine.
pub mod popup;

// ============================================================================
// Re-exports
// ============================================================================

pub use manager::{
    Acquired, DEFAULT_LOAD_INTERVAL, DEFAULT_LOAD_RETRIES, Follower, LoadOptions, PopupLease,
    SingleFlightPolicy, WindowManager,
};
pub use popup::{OperationKind, PopupHandle, PopupState};
