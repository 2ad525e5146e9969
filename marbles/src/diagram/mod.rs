//! Marble diagram grammar.
//!
//! A marble diagram is a compact textual timeline. Each character occupies
//! one column, and each column is `frame_time_factor` frames of virtual time.
//!
//! # Grammar
//!
//! - `-` or space: an empty column (time passes, nothing happens)
//! - `|`: completion (terminal)
//! - `#`: error (terminal)
//! - `^`: subscription point of a hot source; frame 0 of the timeline
//! - `!`: unsubscription point
//! - `( ... )`: synchronous group; every event inside shares the frame of
//!   the opening parenthesis, but every character still occupies a column
//! - anything else: a value marker, resolved through a [`ValueMap`]
//!
//! # Usage
//!
//! ```
//! use marbles::diagram::{Notification, parse};
//!
//! let parsed = parse::<char>("-a-(bc)-|", None).unwrap();
//! let frames: Vec<_> = parsed.timeline.entries().iter().map(|e| e.frame).collect();
//! assert_eq!(frames, vec![1, 3, 3, 8]);
//! assert_eq!(parsed.timeline.entries()[3].notification, Notification::Complete);
//! ```

mod parser;
mod render;
mod values;

pub use parser::{DiagramParser, ParseError, ParsedDiagram, SubscriptionMarkers, parse};
pub use render::{render, render_diagram, render_subscription};
pub use values::{MarkerValue, ValueMap};

/// A point in virtual time.
///
/// Signed because hot diagrams place their pre-subscription history at
/// negative frames. The clock itself never runs below zero.
pub type Frame = i64;

/// Error payload carried by an `Error` notification.
///
/// Compared structurally, so an expected `#` matches any actual error with
/// the same message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SimulatedError {
    message: String,
}

impl SimulatedError {
    /// Message used by a bare `#` marker.
    pub const GENERIC_MESSAGE: &'static str = "error";

    /// Create an error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error a `#` marker produces when no other payload is supplied.
    #[must_use]
    pub fn generic() -> Self {
        Self::new(Self::GENERIC_MESSAGE)
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Default for SimulatedError {
    fn default() -> Self {
        Self::generic()
    }
}

impl std::fmt::Display for SimulatedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SimulatedError {}

/// One event on a timeline. Frames are attached externally by
/// [`TimelineEntry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification<T> {
    Next(T),
    Error(SimulatedError),
    Complete,
}

impl<T> Notification<T> {
    /// Whether this notification ends the stream.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Error(_) | Self::Complete)
    }

    /// Short name of the notification kind, for reports.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Next(_) => "next",
            Self::Error(_) => "error",
            Self::Complete => "complete",
        }
    }
}

/// A notification stamped with the frame it occurred on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEntry<T> {
    pub frame: Frame,
    pub notification: Notification<T>,
}

impl<T: std::fmt::Debug> std::fmt::Display for TimelineEntry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.notification {
            Notification::Next(value) => write!(f, "next({value:?}) @ {}", self.frame),
            Notification::Error(error) => write!(f, "error({error}) @ {}", self.frame),
            Notification::Complete => write!(f, "complete @ {}", self.frame),
        }
    }
}

/// An ordered sequence of timestamped notifications.
///
/// # Invariants
///
/// - Frames never decrease. Equal frames only occur for synchronous bursts.
/// - At most one terminal notification, and only as the last entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline<T> {
    entries: Vec<TimelineEntry<T>>,
}

impl<T> Timeline<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a notification.
    ///
    /// Callers are responsible for the ordering invariants; they are only
    /// checked in debug builds.
    pub fn push(&mut self, frame: Frame, notification: Notification<T>) {
        debug_assert!(
            !self.is_terminated(),
            "no notification may follow a terminal one"
        );
        debug_assert!(
            self.entries.last().is_none_or(|last| last.frame <= frame),
            "timeline frames must not decrease"
        );
        self.entries.push(TimelineEntry {
            frame,
            notification,
        });
    }

    #[must_use]
    pub fn entries(&self) -> &[TimelineEntry<T>] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The terminal entry, if the timeline has ended.
    #[must_use]
    pub fn terminal(&self) -> Option<&TimelineEntry<T>> {
        self.entries
            .last()
            .filter(|entry| entry.notification.is_terminal())
    }

    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminal().is_some()
    }

    /// Iterate over the values of every `Next` entry, in order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().filter_map(|entry| match &entry.notification {
            Notification::Next(value) => Some(value),
            Notification::Error(_) | Notification::Complete => None,
        })
    }
}

impl<T> Default for Timeline<T> {
    fn default() -> Self {
        Self::new()
    }
}
