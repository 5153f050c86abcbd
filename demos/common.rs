//! Shared utilities for demos.
//!
//! Provides:
//! - Command-line argument parsing
//! - Logging initialization
//! - A scripted wallet UI for `MemoryHost`

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use serde_json::json;
use tracing_subscriber::EnvFilter;
use wallet_bridge::host::{PeerReply, PeerRequest};

// ============================================================================
// Constants
// ============================================================================

/// Base URL the demo wallet UI is served from.
pub const FRAME_URL: &str = "https://wallet.example.com/bridge";

// ============================================================================
// Types
// ============================================================================

/// Command-line arguments for demos.
#[derive(Debug, Clone)]
pub struct Args {
    pub debug: bool,
    pub reject: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self {
            debug: args.iter().any(|a| a == "--debug"),
            reject: args.iter().any(|a| a == "--reject"),
        }
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging.
pub fn init_logging(debug: bool) {
    let filter = if debug {
        "wallet_bridge=trace"
    } else {
        "wallet_bridge=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

/// A wallet UI that approves everything, or refuses if `reject` is set.
pub fn wallet_ui(reject: bool) -> impl Fn(&PeerRequest) -> PeerReply + Send + Sync + 'static {
    move |request| match request.method.as_str() {
        "status" => PeerReply::success(json!({ "isLocked": false })),
        _ if reject => PeerReply::error("User rejected the request"),
        "unlock" => PeerReply::success(json!({
            "accounts": ["DEMOADDRESS1", { "address": "DEMOADDRESS2" }]
        })),
        _ => PeerReply::error("Unsupported method"),
    }
}
