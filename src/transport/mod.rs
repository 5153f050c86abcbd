//! Cross-window transport layer.
//!
//! This module turns the host's postMessage primitive into correlated
//! request/response exchanges.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                              ┌─────────────────┐
//! │  Wallet (Rust)   │                              │  Wallet UI      │
//! │                  │   {channel, message} JSON    │  (popup/iframe) │
//! │  Channel         │◄────────────────────────────►│                 │
//! │  → Correlation   │    origin-checked frames     │  same channel   │
//! └──────────────────┘                              └─────────────────┘
//! ```
//!
//! # Request Lifecycle
//!
//! 1. `CorrelationTable::register` - Reserve a fresh request ID
//! 2. `WindowHost::post_message` - Post the envelope to the target window
//! 3. Event loop matches the response by ID
//! 4. `Pending::wait` - Resolve, or time out and remove the entry
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `channel` | Named channel and inbound event loop |
//! | `correlation` | Outstanding request table |
//! | `origin` | Origin parsing and matching |

// ============================================================================
// Submodules
// ============================================================================

/// Named channel and inbound event loop.
pub mod channel;

/// Outstanding request table.
pub mod correlation;

/// Origin parsing and matching.
pub mod origin;

// ============================================================================
// Re-exports
// ============================================================================

pub use channel::{Channel, DEFAULT_REQUEST_TIMEOUT, InboundHandler, SendOptions};
pub use correlation::{CorrelationTable, MAX_PENDING_REQUESTS, Pending};
pub use origin::Origin;
