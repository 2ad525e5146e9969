//! Subscription window tracking for simulated sources.
//!
//! Every simulated source owns a [`SubscriptionTracker`]. Each subscribe
//! opens a window at the current frame; the matching unsubscribe closes it.
//!
//! # Window Lifecycle
//!
//! 1. A consumer subscribes: `open(now)` records a new window
//! 2. The consumer unsubscribes (explicitly, via a terminal notification, or
//!    because a downstream operator tore the chain down): `close(id, now)`
//! 3. A window never closed stays open-ended and renders as a bare `^`
//!
//! Repeated subscribe/unsubscribe cycles produce separate, non-overlapping
//! windows in subscription order.

use crate::diagram::{Frame, render_subscription};

/// Frame range during which a consumer was attached to a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionWindow {
    pub start: Frame,
    /// `None` while the consumer is still attached.
    pub end: Option<Frame>,
}

impl SubscriptionWindow {
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.end.is_none()
    }
}

/// Identifier of a window within one tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(usize);

/// Per-source window bookkeeping.
#[derive(Debug, Default)]
pub struct SubscriptionTracker {
    windows: Vec<SubscriptionWindow>,
}

impl SubscriptionTracker {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            windows: Vec::new(),
        }
    }

    /// Record a subscription starting at `frame`.
    pub fn open(&mut self, frame: Frame) -> WindowId {
        self.windows.push(SubscriptionWindow {
            start: frame,
            end: None,
        });
        WindowId(self.windows.len() - 1)
    }

    /// Record the end of a subscription.
    ///
    /// # Errors
    ///
    /// Returns `SubscriptionError::NotFound` for an unknown window and
    /// `SubscriptionError::AlreadyClosed` if the window already ended.
    pub fn close(&mut self, id: WindowId, frame: Frame) -> Result<(), SubscriptionError> {
        let window = self
            .windows
            .get_mut(id.0)
            .ok_or(SubscriptionError::NotFound(id.0))?;
        if window.end.is_some() {
            return Err(SubscriptionError::AlreadyClosed(id.0));
        }
        debug_assert!(frame >= window.start, "window cannot end before it starts");
        window.end = Some(frame);
        Ok(())
    }

    #[must_use]
    pub fn windows(&self) -> &[SubscriptionWindow] {
        &self.windows
    }

    /// Number of windows still open.
    #[must_use]
    pub fn active(&self) -> usize {
        self.windows.iter().filter(|w| w.is_open()).count()
    }

    /// Copy the windows out, tagged with the factor needed to render them.
    #[must_use]
    pub fn snapshot(&self, frame_time_factor: u32) -> SubscriptionLog {
        SubscriptionLog {
            windows: self.windows.clone(),
            frame_time_factor,
        }
    }
}

/// Immutable copy of a source's windows at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionLog {
    windows: Vec<SubscriptionWindow>,
    frame_time_factor: u32,
}

impl SubscriptionLog {
    #[must_use]
    pub fn windows(&self) -> &[SubscriptionWindow] {
        &self.windows
    }

    #[must_use]
    pub const fn frame_time_factor(&self) -> u32 {
        self.frame_time_factor
    }

    /// One diagram per window, e.g. `"--^---!"`.
    #[must_use]
    pub fn render(&self) -> Vec<String> {
        self.windows
            .iter()
            .map(|window| render_subscription(window, self.frame_time_factor))
            .collect()
    }
}

/// Errors from window bookkeeping.
#[derive(Debug, PartialEq, Eq)]
pub enum SubscriptionError {
    /// No window with this index exists.
    NotFound(usize),
    /// The window was already closed.
    AlreadyClosed(usize),
}

impl std::fmt::Display for SubscriptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "subscription window {id} not found"),
            Self::AlreadyClosed(id) => write!(f, "subscription window {id} already closed"),
        }
    }
}

impl std::error::Error for SubscriptionError {}
