//! Validated wallet configuration.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::host::PopupGeometry;
use crate::transport::{DEFAULT_REQUEST_TIMEOUT, Origin};
use crate::window::{LoadOptions, OperationKind, SingleFlightPolicy};

// ============================================================================
// Constants
// ============================================================================

/// Default base URL of the wallet UI.
pub const DEFAULT_FRAME_URL: &str = "https://wallet.myalgo.com/bridge";

/// Channel name shared with the wallet UI.
pub const DEFAULT_CHANNEL_NAME: &str = "wallet-bridge-communication-channel";

/// Element ID of the hidden frame.
pub const DEFAULT_FRAME_ID: &str = "wallet-bridge-frame";

/// Default per-request timeout for frame operations.
pub const DEFAULT_FRAME_TIMEOUT: Duration = Duration::from_millis(4000);

// ============================================================================
// WalletConfig
// ============================================================================

/// Configuration produced by [`WalletBuilder`](super::WalletBuilder).
#[derive(Debug, Clone)]
pub struct WalletConfig {
    /// Base URL of the wallet UI; popup pages live below it.
    pub frame_url: Url,
    /// Element ID of the hidden frame.
    pub frame_id: String,
    /// Channel name shared with the wallet UI.
    pub channel_name: String,
    /// Popup dimensions.
    pub geometry: PopupGeometry,
    /// Behaviour when a popup of the same kind is already open.
    pub policy: SingleFlightPolicy,
    /// Liveness probe pacing.
    pub load: LoadOptions,
    /// Default timeout for popup operations.
    pub request_timeout: Duration,
    /// Default timeout for frame operations.
    pub frame_timeout: Duration,
}

impl WalletConfig {
    /// Creates a configuration with defaults for everything but the URL.
    #[must_use]
    pub fn new(frame_url: Url) -> Self {
        Self {
            frame_url,
            frame_id: DEFAULT_FRAME_ID.to_string(),
            channel_name: DEFAULT_CHANNEL_NAME.to_string(),
            geometry: PopupGeometry::default(),
            policy: SingleFlightPolicy::default(),
            load: LoadOptions::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            frame_timeout: DEFAULT_FRAME_TIMEOUT,
        }
    }

    /// Returns the origin every frame must come from.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the frame URL has an opaque origin.
    pub fn origin(&self) -> Result<Origin> {
        Origin::from_url(&self.frame_url)
    }

    /// Returns the page URL serving `kind`, e.g. `<frame_url>/signtx.html`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the frame URL cannot carry a path.
    pub fn page_url(&self, kind: OperationKind) -> Result<Url> {
        let mut url = self.frame_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::config(format!("Frame URL cannot be a base: {}", self.frame_url)))?
            .pop_if_empty()
            .push(kind.page());
        Ok(url)
    }
}

// ============================================================================
// Tests
// ============================================================================
