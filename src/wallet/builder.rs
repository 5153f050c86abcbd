//! Builder pattern for wallet configuration.
//!
//! Provides a fluent API for configuring and creating [`Wallet`] and
//! [`FrameWallet`] instances.
//!
//! # Example
//!
//! ```no_run
//! use wallet_bridge::Wallet;
//! use wallet_bridge::host::MemoryHost;
//!
//! # async fn example() -> wallet_bridge::Result<()> {
//! let (host, inbound) = MemoryHost::new();
//! let wallet = Wallet::builder()
//!     .frame_url("https://wallet.example.com/bridge")
//!     .reuse_popups()
//!     .build(host, inbound)?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::host::{InboundReceiver, PopupGeometry, WindowHost};
use crate::window::{LoadOptions, SingleFlightPolicy};

use super::config::{DEFAULT_FRAME_URL, WalletConfig};
use super::core::Wallet;
use super::frame::FrameWallet;

// ============================================================================
// Constants
// ============================================================================

/// Longest accepted liveness probe interval.
pub const MAX_LOAD_INTERVAL: Duration = Duration::from_secs(60);

// ============================================================================
// WalletBuilder
// ============================================================================

/// Builder for configuring a [`Wallet`].
///
/// Use [`Wallet::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct WalletBuilder {
    /// Base URL of the wallet UI.
    frame_url: Option<String>,
    /// Element ID of the hidden frame.
    frame_id: Option<String>,
    /// Channel name.
    channel_name: Option<String>,
    /// Popup dimensions.
    geometry: Option<PopupGeometry>,
    /// Single-flight behaviour.
    policy: SingleFlightPolicy,
    /// Liveness probe attempts.
    load_retries: Option<u32>,
    /// Liveness probe interval.
    load_interval: Option<Duration>,
    /// Popup operation timeout.
    request_timeout: Option<Duration>,
    /// Frame operation timeout.
    frame_timeout: Option<Duration>,
}

// ============================================================================
// WalletBuilder Implementation
// ============================================================================

impl WalletBuilder {
    /// Creates a builder with default configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the wallet UI base URL.
    #[inline]
    #[must_use]
    pub fn frame_url(mut self, url: impl Into<String>) -> Self {
        self.frame_url = Some(url.into());
        self
    }

    /// Overrides the hidden frame's element ID.
    #[inline]
    #[must_use]
    pub fn frame_id(mut self, id: impl Into<String>) -> Self {
        self.frame_id = Some(id.into());
        self
    }

    /// Overrides the channel name.
    #[inline]
    #[must_use]
    pub fn channel_name(mut self, name: impl Into<String>) -> Self {
        self.channel_name = Some(name.into());
        self
    }

    /// Sets the popup size in pixels.
    #[inline]
    #[must_use]
    pub fn popup_size(mut self, width: u32, height: u32) -> Self {
        self.geometry = Some(PopupGeometry::new(width, height));
        self
    }

    /// Sets the single-flight policy.
    #[inline]
    #[must_use]
    pub fn single_flight(mut self, policy: SingleFlightPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Shares the outcome of an identical in-flight popup instead of
    /// rejecting the second call.
    #[inline]
    #[must_use]
    pub fn reuse_popups(self) -> Self {
        self.single_flight(SingleFlightPolicy::Reuse)
    }

    /// Sets the number of liveness probes.
    #[inline]
    #[must_use]
    pub fn load_retries(mut self, retries: u32) -> Self {
        self.load_retries = Some(retries);
        self
    }

    /// Sets the liveness probe interval.
    #[inline]
    #[must_use]
    pub fn load_interval(mut self, interval: Duration) -> Self {
        self.load_interval = Some(interval);
        self
    }

    /// Sets the default timeout of popup operations.
    #[inline]
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the default timeout of frame operations.
    #[inline]
    #[must_use]
    pub fn frame_timeout(mut self, timeout: Duration) -> Self {
        self.frame_timeout = Some(timeout);
        self
    }

    /// Validates the configuration without building anything.
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] if the frame URL does not parse
    /// - [`Error::Config`] for any other invalid setting
    pub fn config(&self) -> Result<WalletConfig> {
        let mut config = WalletConfig::new(self.validate_frame_url()?);

        if let Some(frame_id) = &self.frame_id {
            config.frame_id = non_empty("Frame ID", frame_id)?;
        }
        if let Some(name) = &self.channel_name {
            config.channel_name = non_empty("Channel name", name)?;
        }
        if let Some(geometry) = self.geometry {
            geometry.validate().map_err(Error::config)?;
            config.geometry = geometry;
        }

        config.policy = self.policy;
        config.load = self.validate_load()?;

        if let Some(timeout) = self.request_timeout {
            config.request_timeout = positive("Request timeout", timeout)?;
        }
        if let Some(timeout) = self.frame_timeout {
            config.frame_timeout = positive("Frame timeout", timeout)?;
        }

        Ok(config)
    }

    /// Builds a popup wallet on `host`.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// See [`config`](Self::config).
    pub fn build(self, host: Arc<dyn WindowHost>, inbound: InboundReceiver) -> Result<Wallet> {
        Wallet::new(self.config()?, host, inbound)
    }

    /// Builds a frame wallet on `host`, attaching the hidden frame.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - See [`config`](Self::config)
    /// - [`Error::InvalidWindow`] if the frame could not be attached
    pub fn build_frame(
        self,
        host: Arc<dyn WindowHost>,
        inbound: InboundReceiver,
    ) -> Result<FrameWallet> {
        FrameWallet::new(self.build(host, inbound)?)
    }
}

// ============================================================================
// Validation
// ============================================================================

impl WalletBuilder {
    /// Validates the frame URL.
    fn validate_frame_url(&self) -> Result<Url> {
        let raw = self.frame_url.as_deref().unwrap_or(DEFAULT_FRAME_URL);
        let url = Url::parse(raw)?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "Frame URL must use http or https: {url}"
            )));
        }
        if url.cannot_be_a_base() {
            return Err(Error::config(format!("Frame URL cannot be a base: {url}")));
        }

        Ok(url)
    }

    /// Validates liveness probe pacing.
    fn validate_load(&self) -> Result<LoadOptions> {
        let defaults = LoadOptions::default();
        let retries = self.load_retries.unwrap_or(defaults.retries);
        if retries == 0 {
            return Err(Error::config("Load retries must be greater than zero"));
        }

        let interval = positive(
            "Load interval",
            self.load_interval.unwrap_or(defaults.interval),
        )?;
        if interval > MAX_LOAD_INTERVAL {
            return Err(Error::config(format!(
                "Load interval must not exceed {}s",
                MAX_LOAD_INTERVAL.as_secs()
            )));
        }

        Ok(LoadOptions { retries, interval })
    }
}

fn non_empty(what: &str, value: &str) -> Result<String> {
    if value.trim().is_empty() {
        return Err(Error::config(format!("{what} must not be empty")));
    }
    Ok(value.to_string())
}

fn positive(what: &str, value: Duration) -> Result<Duration> {
    if value.is_zero() {
        return Err(Error::config(format!("{what} must be greater than zero")));
    }
    Ok(value)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_builder_uses_default_url() {
        let config = WalletBuilder::new().config().expect("config");
        assert_eq!(config.frame_url.as_str(), "https://wallet.myalgo.com/bridge");
        assert_eq!(config.origin().expect("origin").as_str(), "https://wallet.myalgo.com");
    }

    #[test]
    fn test_overrides_apply() {
        let config = WalletBuilder::new()
            .frame_url("http://localhost:3000/bridge")
            .frame_id("my-frame")
            .channel_name("custom")
            .popup_size(500, 700)
            .reuse_popups()
            .load_retries(3)
            .load_interval(Duration::from_millis(50))
            .request_timeout(Duration::from_secs(5))
            .frame_timeout(Duration::from_secs(1))
            .config()
            .expect("config");

        assert_eq!(config.frame_id, "my-frame");
        assert_eq!(config.channel_name, "custom");
        assert_eq!(config.geometry, PopupGeometry::new(500, 700));
        assert_eq!(config.policy, SingleFlightPolicy::Reuse);
        assert_eq!(config.load.retries, 3);
        assert_eq!(config.load.interval, Duration::from_millis(50));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.frame_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_url_rejected() {
        let err = WalletBuilder::new().frame_url("not a url").config().unwrap_err();
        assert!(matches!(err, Error::Url(_)));

        let err = WalletBuilder::new()
            .frame_url("data:text/html,hi")
            .config()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_zero_values_rejected() {
        assert!(WalletBuilder::new().popup_size(0, 600).config().is_err());
        assert!(WalletBuilder::new().load_retries(0).config().is_err());
        assert!(WalletBuilder::new().load_interval(Duration::ZERO).config().is_err());
        assert!(WalletBuilder::new().request_timeout(Duration::ZERO).config().is_err());
        assert!(WalletBuilder::new().frame_timeout(Duration::ZERO).config().is_err());
    }

    #[test]
    fn test_oversized_load_interval_rejected() {
        let err = WalletBuilder::new()
            .load_interval(Duration::MAX)
            .config()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));

        let config = WalletBuilder::new()
            .load_interval(MAX_LOAD_INTERVAL)
            .config()
            .expect("config");
        assert_eq!(config.load.interval, MAX_LOAD_INTERVAL);
    }

    #[test]
    fn test_empty_names_rejected() {
        assert!(WalletBuilder::new().channel_name("  ").config().is_err());
        assert!(WalletBuilder::new().frame_id("").config().is_err());
    }
}
