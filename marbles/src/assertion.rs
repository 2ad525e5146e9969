//! Comparing recorded output against expected diagrams.
//!
//! Timelines are compared structurally: frame, notification kind, then
//! value equality, so composite values match field by field. The rendered
//! diagrams are only used to make a failure readable.
//!
//! # Failure report
//!
//! ```text
//! timeline mismatch at frame 30: expected next('c') @ 30, got next('x') @ 30
//! expected: -a-c|
//! actual:   -a-x|
//!              ^
//! ```

use std::fmt::Debug;

use crate::diagram::{
    DiagramParser, Frame, MarkerValue, ParseError, SimulatedError, Timeline, TimelineEntry,
    ValueMap, render,
};
use crate::harness::RecordedOutput;
use crate::subscription::{SubscriptionLog, SubscriptionWindow};

/// First difference between an expectation and what was recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// What was compared, e.g. `"timeline"` or `"subscription"`.
    pub subject: &'static str,
    /// Frame of the first diverging entry.
    pub frame: Frame,
    /// The expected entry at that point, `None` if the expectation ended.
    pub expected: Option<String>,
    /// The recorded entry at that point, `None` if the recording ended.
    pub actual: Option<String>,
    pub expected_diagram: String,
    pub actual_diagram: String,
    /// Column of the first difference in the rendered diagrams.
    pub column: usize,
}

impl std::fmt::Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let expected = self.expected.as_deref().unwrap_or("nothing");
        let actual = self.actual.as_deref().unwrap_or("nothing");
        writeln!(
            f,
            "{} mismatch at frame {}: expected {expected}, got {actual}",
            self.subject, self.frame
        )?;
        writeln!(f, "expected: {}", self.expected_diagram)?;
        writeln!(f, "actual:   {}", self.actual_diagram)?;
        write!(f, "          {}^", " ".repeat(self.column))
    }
}

/// Why an assertion failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssertionError {
    /// The expectation itself is malformed.
    Parse(ParseError),
    /// The recording differs from the expectation.
    Mismatch(Box<Mismatch>),
}

impl std::fmt::Display for AssertionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "malformed expectation: {e}"),
            Self::Mismatch(m) => write!(f, "{m}"),
        }
    }
}

impl std::error::Error for AssertionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(e) => Some(e),
            Self::Mismatch(_) => None,
        }
    }
}

impl From<ParseError> for AssertionError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

/// Column of the first character where two diagrams differ.
fn first_difference(expected: &str, actual: &str) -> Option<usize> {
    let mut expected_chars = expected.chars();
    let mut actual_chars = actual.chars();
    let mut column = 0;
    loop {
        match (expected_chars.next(), actual_chars.next()) {
            (None, None) => return None,
            (e, a) if e != a => return Some(column),
            _ => column += 1,
        }
    }
}

fn column_of(frame: Frame, frame_time_factor: u32) -> usize {
    usize::try_from(frame.max(0) / Frame::from(frame_time_factor.max(1))).unwrap_or(0)
}

/// Index of the first entry that differs between two timelines.
fn first_divergence<T: PartialEq>(expected: &Timeline<T>, actual: &Timeline<T>) -> Option<usize> {
    let expected = expected.entries();
    let actual = actual.entries();
    expected
        .iter()
        .zip(actual)
        .position(|(e, a)| e != a)
        .or_else(|| (expected.len() != actual.len()).then(|| expected.len().min(actual.len())))
}

/// Assert that `actual` matches `expected`.
///
/// `values` names the markers of `expected`; markers not in the map fall
/// back to [`MarkerValue::from_marker`]. `error` is the payload expected
/// for `#`, the generic error if `None`.
///
/// # Errors
///
/// Returns `AssertionError::Parse` if `expected` is malformed or has `!`,
/// and `AssertionError::Mismatch` describing the first diverging frame
/// otherwise.
pub fn assert_timeline<T>(
    actual: &RecordedOutput<T>,
    expected: &str,
    values: Option<&ValueMap<T>>,
    error: Option<&SimulatedError>,
) -> Result<(), AssertionError>
where
    T: Clone + PartialEq + Debug + MarkerValue,
{
    let factor = actual.frame_time_factor();
    let parsed = DiagramParser::new(factor).parse(expected, values, error)?;
    if parsed.unsubscription_frame.is_some() {
        return Err(ParseError::UnsubscriptionMarkerInSource.into());
    }
    let expected_timeline = parsed.timeline;
    let actual_timeline = actual.timeline();

    let Some(index) = first_divergence(&expected_timeline, actual_timeline) else {
        return Ok(());
    };

    let describe = |entry: Option<&TimelineEntry<T>>| entry.map(ToString::to_string);
    let expected_entry = expected_timeline.entries().get(index);
    let actual_entry = actual_timeline.entries().get(index);
    let frame = match (expected_entry, actual_entry) {
        (Some(e), Some(a)) => e.frame.min(a.frame),
        (Some(entry), None) | (None, Some(entry)) => entry.frame,
        (None, None) => 0,
    };

    let marker = |value: &T| {
        values
            .map_or_else(|| value.to_marker(), |values| values.marker_for(value))
            .unwrap_or('?')
    };
    let expected_diagram = render(&expected_timeline, factor, marker);
    let actual_diagram = render(actual_timeline, factor, marker);
    let column = first_difference(&expected_diagram, &actual_diagram)
        .unwrap_or_else(|| column_of(frame, factor));

    let mismatch = Mismatch {
        subject: "timeline",
        frame,
        expected: describe(expected_entry),
        actual: describe(actual_entry),
        expected_diagram,
        actual_diagram,
        column,
    };
    tracing::debug!(%mismatch, "timeline assertion failed");
    Err(AssertionError::Mismatch(Box::new(mismatch)))
}

fn describe_window(window: &SubscriptionWindow) -> String {
    match window.end {
        Some(end) => format!("window {} to {end}", window.start),
        None => format!("window from {} (open)", window.start),
    }
}

/// Assert that `actual` holds exactly one window per diagram, in order.
///
/// Each diagram is a subscription diagram such as `"--^---!"`, `"^"` for a
/// window that never closed, or `"(^!)"` for a zero-length one.
///
/// # Errors
///
/// Returns `AssertionError::Parse` if a diagram is malformed or has no `^`,
/// and `AssertionError::Mismatch` for the first window that differs.
pub fn assert_subscriptions(actual: &SubscriptionLog, expected: &[&str]) -> Result<(), AssertionError> {
    let factor = actual.frame_time_factor();
    let parser = DiagramParser::new(factor);
    let expected_windows = expected
        .iter()
        .map(|diagram| {
            let markers = parser.parse_subscription(diagram)?;
            let start = markers
                .subscribed_at
                .ok_or(ParseError::MissingSubscriptionMarker)?;
            Ok(SubscriptionWindow {
                start,
                end: markers.unsubscribed_at,
            })
        })
        .collect::<Result<Vec<_>, ParseError>>()?;

    let actual_windows = actual.windows();
    let Some(index) = expected_windows
        .iter()
        .zip(actual_windows)
        .position(|(e, a)| e != a)
        .or_else(|| {
            (expected_windows.len() != actual_windows.len())
                .then(|| expected_windows.len().min(actual_windows.len()))
        })
    else {
        return Ok(());
    };

    let expected_window = expected_windows.get(index);
    let actual_window = actual_windows.get(index);
    let render_window = |window: Option<&SubscriptionWindow>| {
        window.map_or_else(String::new, |w| crate::diagram::render_subscription(w, factor))
    };
    let expected_diagram = render_window(expected_window);
    let actual_diagram = render_window(actual_window);
    let frame = expected_window
        .or(actual_window)
        .map_or(0, |window| window.start);

    let mismatch = Mismatch {
        subject: "subscription",
        frame,
        column: first_difference(&expected_diagram, &actual_diagram)
            .unwrap_or_else(|| column_of(frame, factor)),
        expected: expected_window.map(describe_window),
        actual: actual_window.map(describe_window),
        expected_diagram,
        actual_diagram,
    };
    tracing::debug!(%mismatch, index, "subscription assertion failed");
    Err(AssertionError::Mismatch(Box::new(mismatch)))
}
