//! Popup lifecycle and single-flight coordination.
//!
//! The [`WindowManager`] owns one slot per [`OperationKind`]. A call that finds
//! the slot free becomes the leader and receives a [`PopupLease`]; a call that
//! finds it taken is handled according to the [`SingleFlightPolicy`].
//!
//! The lease closes its window and frees the slot exactly once, either in
//! [`PopupLease::finish`] or when dropped, and always before the outcome is
//! handed to anyone.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::host::{PopupGeometry, WindowHost};
use crate::identifiers::WindowId;
use crate::protocol::Command;
use crate::transport::{Channel, Origin, SendOptions};

use super::popup::{OperationKind, PopupHandle, PopupState};

// ============================================================================
// Constants
// ============================================================================

/// Default number of liveness probes.
pub const DEFAULT_LOAD_RETRIES: u32 = 25;

/// Default liveness probe interval.
pub const DEFAULT_LOAD_INTERVAL: Duration = Duration::from_millis(300);

// ============================================================================
// Types
// ============================================================================

/// Outcome shared with reuse followers. `None` until the leader finishes.
type Outcome = Option<Result<Value>>;

// ============================================================================
// SingleFlightPolicy
// ============================================================================

/// What a call does when a popup of its kind is already in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SingleFlightPolicy {
    /// Focus the existing popup and fail with
    /// [`Error::WindowAlreadyOpen`].
    #[default]
    Reject,
    /// Focus the existing popup and share its outcome, provided the request
    /// is identical.
    Reuse,
}

// ============================================================================
// LoadOptions
// ============================================================================

/// Liveness probe pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Maximum probe attempts.
    pub retries: u32,
    /// Duration of each attempt.
    pub interval: Duration,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            retries: DEFAULT_LOAD_RETRIES,
            interval: DEFAULT_LOAD_INTERVAL,
        }
    }
}

impl LoadOptions {
    /// Upper bound on a failing [`WindowManager::wait_until_loaded`].
    #[inline]
    #[must_use]
    pub fn budget(&self) -> Duration {
        self.interval
            .checked_mul(self.retries)
            .unwrap_or(Duration::MAX)
    }
}

// ============================================================================
// Slot
// ============================================================================

/// An in-flight popup of one kind.
struct Slot {
    generation: u64,
    window: Option<WindowId>,
    fingerprint: String,
    outcome: watch::Receiver<Outcome>,
}

// ============================================================================
// WindowManager
// ============================================================================

/// Opens, probes, focuses and closes popups through a [`WindowHost`].
///
/// Cloning yields another handle to the same manager.
#[derive(Clone)]
pub struct WindowManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    host: Arc<dyn WindowHost>,
    geometry: PopupGeometry,
    policy: SingleFlightPolicy,
    load: LoadOptions,
    slots: Mutex<FxHashMap<OperationKind, Slot>>,
    next_generation: AtomicU64,
}

impl fmt::Debug for WindowManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowManager")
            .field("geometry", &self.inner.geometry)
            .field("policy", &self.inner.policy)
            .field("load", &self.inner.load)
            .field("in_flight", &self.inner.slots.lock().len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// WindowManager - Constructor
// ============================================================================

impl WindowManager {
    /// Creates a manager.
    #[must_use]
    pub fn new(
        host: Arc<dyn WindowHost>,
        geometry: PopupGeometry,
        policy: SingleFlightPolicy,
        load: LoadOptions,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                host,
                geometry,
                policy,
                load,
                slots: Mutex::new(FxHashMap::default()),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// Returns the single-flight policy.
    #[inline]
    #[must_use]
    pub fn policy(&self) -> SingleFlightPolicy {
        self.inner.policy
    }

    /// Returns the probe pacing.
    #[inline]
    #[must_use]
    pub fn load_options(&self) -> LoadOptions {
        self.inner.load
    }

    /// Returns `true` if a popup of `kind` is in flight.
    #[inline]
    #[must_use]
    pub fn is_in_flight(&self, kind: OperationKind) -> bool {
        self.inner.slots.lock().contains_key(&kind)
    }
}

// ============================================================================
// WindowManager - Single Flight
// ============================================================================

/// Result of [`WindowManager::acquire`].
#[derive(Debug)]
pub enum Acquired {
    /// The slot was free; drive the popup.
    Leader(PopupLease),
    /// An identical request is in flight; await its outcome.
    Follower(Follower),
}

impl WindowManager {
    /// Claims the slot for `kind`.
    ///
    /// `fingerprint` identifies the request; under
    /// [`SingleFlightPolicy::Reuse`] only identical requests share an outcome.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WindowAlreadyOpen`] if the slot is taken and the
    /// policy (or a differing fingerprint) forbids sharing. The existing popup
    /// is focused either way.
    pub fn acquire(&self, kind: OperationKind, fingerprint: impl Into<String>) -> Result<Acquired> {
        let fingerprint = fingerprint.into();
        let mut slots = self.inner.slots.lock();

        if let Some(slot) = slots.get(&kind) {
            let window = slot.window;
            let shared = (self.inner.policy == SingleFlightPolicy::Reuse
                && slot.fingerprint == fingerprint)
                .then(|| slot.outcome.clone());
            drop(slots);

            if let Some(window) = window {
                self.focus(window);
            }

            return match shared {
                Some(outcome) => {
                    debug!(%kind, "Joining in-flight popup");
                    Ok(Acquired::Follower(Follower { kind, outcome }))
                }
                None => {
                    debug!(%kind, "Popup already in flight");
                    Err(Error::window_already_open(kind))
                }
            };
        }

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let (outcome_tx, outcome_rx) = watch::channel(None);
        slots.insert(
            kind,
            Slot {
                generation,
                window: None,
                fingerprint,
                outcome: outcome_rx,
            },
        );
        trace!(%kind, generation, "Slot acquired");

        Ok(Acquired::Leader(PopupLease {
            manager: self.clone(),
            handle: PopupHandle::new(kind),
            generation,
            outcome_tx: Some(outcome_tx),
        }))
    }

    fn record_window(&self, kind: OperationKind, generation: u64, window: WindowId) {
        if let Some(slot) = self.inner.slots.lock().get_mut(&kind)
            && slot.generation == generation
        {
            slot.window = Some(window);
        }
    }

    fn release(&self, kind: OperationKind, generation: u64) {
        let mut slots = self.inner.slots.lock();
        if slots.get(&kind).is_some_and(|s| s.generation == generation) {
            slots.remove(&kind);
            trace!(%kind, generation, "Slot released");
        }
    }
}

// ============================================================================
// WindowManager - Window Operations
// ============================================================================

impl WindowManager {
    /// Opens a popup at `url` with the configured geometry.
    ///
    /// Returns `None` if the host blocked it.
    #[must_use]
    pub fn open(&self, url: &Url) -> Option<WindowId> {
        let window = self.inner.host.open(url, self.inner.geometry);
        match window {
            Some(window) => debug!(%window, %url, "Popup opened"),
            None => warn!(%url, "Popup blocked"),
        }
        window
    }

    /// Finds or creates the frame `frame_id` at `url`.
    #[must_use]
    pub fn attach_frame(&self, url: &Url, frame_id: &str) -> Option<WindowId> {
        self.inner.host.attach_frame(url, frame_id)
    }

    /// Probes `window` with `status` until it answers successfully.
    ///
    /// Each attempt lasts exactly one interval, so a window that never answers
    /// fails after `retries × interval` and not earlier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WindowNotLoaded`] when the attempts run out, or at once
    /// if `window` is missing or closed.
    pub async fn wait_until_loaded(
        &self,
        window: Option<WindowId>,
        channel: &Channel,
        origin: &Origin,
    ) -> Result<()> {
        let LoadOptions { retries, interval } = self.inner.load;

        let Some(window) = window else {
            return Err(Error::window_not_loaded(0));
        };

        for attempt in 1..=retries {
            if self.inner.host.is_closed(window) {
                debug!(%window, attempt, "Window closed while loading");
                return Err(Error::window_not_loaded(attempt - 1));
            }

            let started = Instant::now();
            let probe = channel
                .send(window, Command::Status, origin, SendOptions::with_timeout(interval))
                .await;

            match probe {
                Ok(Some(response)) if response.is_success() => {
                    debug!(%window, attempt, "Window loaded");
                    return Ok(());
                }
                Ok(_) => trace!(%window, attempt, "Window not ready"),
                Err(e) => trace!(%window, attempt, error = %e, "Liveness probe failed"),
            }

            match started.checked_add(interval) {
                Some(deadline) => sleep_until(deadline).await,
                None => sleep(interval).await,
            }
        }

        debug!(%window, retries, "Window never answered");
        Err(Error::window_not_loaded(retries))
    }

    /// Closes `window`. Closing a closed or absent window is a no-op.
    pub fn close(&self, window: Option<WindowId>) {
        if let Some(window) = window
            && !self.inner.host.is_closed(window)
        {
            self.inner.host.close(window);
            debug!(%window, "Popup closed");
        }
    }

    /// Brings `window` to the foreground.
    pub fn focus(&self, window: WindowId) {
        self.inner.host.focus(window);
    }

    /// Returns `true` if `window` is closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self, window: WindowId) -> bool {
        self.inner.host.is_closed(window)
    }

    /// Resolves once the host reports `window` closed.
    ///
    /// Polled every probe interval.
    pub async fn closed(&self, window: WindowId) {
        while !self.inner.host.is_closed(window) {
            sleep(self.inner.load.interval).await;
        }
        debug!(%window, "Popup closed by user");
    }
}

// ============================================================================
// PopupLease
// ============================================================================

/// Exclusive right to drive the popup of one kind.
///
/// Dropping the lease closes the window and frees the slot; reuse followers
/// then fail with [`Error::Aborted`].
pub struct PopupLease {
    manager: WindowManager,
    handle: PopupHandle,
    generation: u64,
    outcome_tx: Option<watch::Sender<Outcome>>,
}

impl fmt::Debug for PopupLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PopupLease")
            .field("handle", &self.handle)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl PopupLease {
    /// Returns the operation kind.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        self.handle.kind()
    }

    /// Returns the window, once opened.
    #[inline]
    #[must_use]
    pub fn window(&self) -> Option<WindowId> {
        self.handle.window()
    }

    /// Returns the lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> PopupState {
        self.handle.state()
    }

    /// Opens the popup at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWindow`] if the host blocked the popup.
    pub fn open(&mut self, url: &Url) -> Result<WindowId> {
        let window = self.manager.open(url).ok_or_else(|| {
            Error::invalid_window(format!("Could not open {} popup", self.handle.kind()))
        })?;

        self.handle.opened(window)?;
        self.manager
            .record_window(self.handle.kind(), self.generation, window);
        Ok(window)
    }

    /// Probes the popup until it answers.
    ///
    /// # Errors
    ///
    /// See [`WindowManager::wait_until_loaded`].
    pub async fn wait_until_loaded(&mut self, channel: &Channel, origin: &Origin) -> Result<()> {
        self.manager
            .wait_until_loaded(self.handle.window(), channel, origin)
            .await?;
        self.handle.transition(PopupState::Loaded)
    }

    /// Marks the operation request as outstanding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWindow`] unless the popup is loaded.
    pub fn mark_in_use(&mut self) -> Result<()> {
        self.handle.transition(PopupState::InUse)
    }

    /// Closes the popup, frees the slot, then publishes `outcome` to reuse
    /// followers and returns it.
    pub fn finish(mut self, outcome: Result<Value>) -> Result<Value> {
        self.release();
        if let Some(tx) = self.outcome_tx.take() {
            tx.send_replace(Some(outcome.clone()));
        }
        outcome
    }

    fn release(&mut self) {
        let kind = self.handle.kind();
        self.manager.close(self.handle.window());
        if let Err(e) = self.handle.transition(PopupState::Closed) {
            warn!(%kind, error = %e, "Failed to close popup handle");
        }
        self.manager.release(kind, self.generation);
    }
}

impl Drop for PopupLease {
    fn drop(&mut self) {
        if self.outcome_tx.is_some() {
            debug!(kind = %self.handle.kind(), "Popup lease dropped before finishing");
            self.release();
        }
    }
}

// ============================================================================
// Follower
// ============================================================================

/// A call sharing the outcome of an identical in-flight popup.
#[derive(Debug)]
pub struct Follower {
    kind: OperationKind,
    outcome: watch::Receiver<Outcome>,
}

impl Follower {
    /// Returns the operation kind.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Waits for the leader's outcome.
    ///
    /// # Errors
    ///
    /// Returns the leader's error, or [`Error::Aborted`] if the leader was
    /// dropped without finishing.
    pub async fn outcome(mut self) -> Result<Value> {
        match self.outcome.wait_for(Option::is_some).await {
            Ok(outcome) => outcome
                .clone()
                .unwrap_or_else(|| Err(Error::aborted(self.kind))),
            Err(_) => Err(Error::aborted(self.kind)),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
