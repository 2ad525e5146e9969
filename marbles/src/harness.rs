//! Pipeline harness: runs an operator chain against a simulated source on a
//! fresh virtual clock and records what comes out.
//!
//! # Life of a run
//!
//! 1. Parse the optional unsubscription diagram (fails before anything runs)
//! 2. Schedule the unsubscription, then subscribe at the current frame.
//!    Cold replays scheduled by the subscription land after an
//!    unsubscription on the same frame; hot events already queued for the
//!    current frame still reach the new subscriber
//! 3. Flush the clock until the output terminates, the unsubscription
//!    fires, or nothing is left to run
//! 4. Return the recorded timeline with the source's subscription windows
//!
//! A [`TestContext`] owns one clock. Nothing is shared between contexts, so
//! tests stay independent.

// Recorder handles are shared between the harness and the pipeline
#![allow(clippy::disallowed_methods)]

use std::cell::RefCell;
use std::rc::Rc;

use crate::clock::{ClockError, TimeSource, VirtualClock};
use crate::config::HarnessConfig;
use crate::diagram::{
    DiagramParser, Frame, MarkerValue, Notification, ParseError, SimulatedError, Timeline, ValueMap,
};
use crate::observable::{Observable, Observer, Subscriber, Subscription};
use crate::source::SimulatedSource;
use crate::subscription::SubscriptionLog;

/// Observer that stamps every notification with the clock frame at which it
/// arrived.
pub struct Recorder<T> {
    clock: VirtualClock,
    timeline: Rc<RefCell<Timeline<T>>>,
}

impl<T> Recorder<T> {
    #[must_use]
    pub fn new(clock: VirtualClock) -> Self {
        Self {
            clock,
            timeline: Rc::new(RefCell::new(Timeline::new())),
        }
    }

    fn record(&self, notification: Notification<T>) {
        self.timeline
            .borrow_mut()
            .push(self.clock.now(), notification);
    }

    /// Take the recorded entries out, leaving the recorder empty.
    fn take(&self) -> Timeline<T> {
        std::mem::take(&mut *self.timeline.borrow_mut())
    }
}

impl<T: Clone> Recorder<T> {
    /// Copy of what has been recorded so far.
    #[must_use]
    pub fn timeline(&self) -> Timeline<T> {
        self.timeline.borrow().clone()
    }
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            clock: self.clock.clone(),
            timeline: Rc::clone(&self.timeline),
        }
    }
}

impl<T> Observer<T> for Recorder<T> {
    fn next(&mut self, value: T) {
        self.record(Notification::Next(value));
    }

    fn error(&mut self, error: SimulatedError) {
        self.record(Notification::Error(error));
    }

    fn complete(&mut self) {
        self.record(Notification::Complete);
    }
}

/// Output of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedOutput<T> {
    timeline: Timeline<T>,
    subscriptions: SubscriptionLog,
    frame_time_factor: u32,
}

impl<T> RecordedOutput<T> {
    /// Everything the pipeline emitted, stamped with emission frames.
    #[must_use]
    pub const fn timeline(&self) -> &Timeline<T> {
        &self.timeline
    }

    /// Windows of the upstream source, as of the end of the run.
    #[must_use]
    pub const fn subscriptions(&self) -> &SubscriptionLog {
        &self.subscriptions
    }

    #[must_use]
    pub const fn frame_time_factor(&self) -> u32 {
        self.frame_time_factor
    }
}

impl<T: PartialEq + MarkerValue> RecordedOutput<T> {
    /// Render the output as a diagram, naming values through `values`.
    /// Values with no marker render as `?`.
    #[must_use]
    pub fn render(&self, values: Option<&ValueMap<T>>) -> String {
        crate::diagram::render(&self.timeline, self.frame_time_factor, |value| {
            values
                .map_or_else(|| value.to_marker(), |values| values.marker_for(value))
                .unwrap_or('?')
        })
    }
}

/// Errors raised by the harness itself, as opposed to mismatches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarnessError {
    /// A diagram given to the harness is malformed.
    Parse(ParseError),
    /// The unsubscription diagram has no `!`.
    MissingUnsubscription,
    /// The unsubscription diagram puts `!` before `^`.
    UnsubscribeBeforeSubscribe {
        subscribed_at: Frame,
        unsubscribed_at: Frame,
    },
    /// The unsubscription diagram's `^` lies past the clock's frame limit.
    BeyondFrameLimit { frame: Frame, frame_limit: Frame },
    /// The clock refused to schedule an action.
    Clock(ClockError),
}

impl std::fmt::Display for HarnessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "malformed diagram: {e}"),
            Self::MissingUnsubscription => {
                write!(f, "unsubscription diagram has no '!' marker")
            }
            Self::UnsubscribeBeforeSubscribe {
                subscribed_at,
                unsubscribed_at,
            } => write!(
                f,
                "unsubscription at frame {unsubscribed_at} precedes subscription at frame {subscribed_at}"
            ),
            Self::BeyondFrameLimit { frame, frame_limit } => {
                write!(f, "subscription at frame {frame} is past the frame limit {frame_limit}")
            }
            Self::Clock(e) => write!(f, "scheduling failed: {e}"),
        }
    }
}

impl std::error::Error for HarnessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(e) => Some(e),
            Self::Clock(e) => Some(e),
            Self::MissingUnsubscription
            | Self::UnsubscribeBeforeSubscribe { .. }
            | Self::BeyondFrameLimit { .. } => None,
        }
    }
}

impl From<ParseError> for HarnessError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

impl From<ClockError> for HarnessError {
    fn from(e: ClockError) -> Self {
        Self::Clock(e)
    }
}

/// Per-test simulation context: one clock, one configuration.
///
/// # Example
///
/// ```
/// use marbles::assertion::{assert_subscriptions, assert_timeline};
/// use marbles::harness::TestContext;
/// use marbles::operators::take;
///
/// let ctx = TestContext::new();
/// let source = ctx.cold::<char>("-a-b-c-|", None).unwrap();
/// let output = ctx.run_pipeline(&source, |s| take(s, 2), None).unwrap();
///
/// assert_timeline(&output, "-a-(b|)", None, None).unwrap();
/// assert_subscriptions(output.subscriptions(), &["^--!"]).unwrap();
/// ```
#[derive(Debug)]
pub struct TestContext {
    clock: VirtualClock,
    parser: DiagramParser,
    config: HarnessConfig,
}

impl TestContext {
    /// Create a context with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(HarnessConfig::default())
    }

    #[must_use]
    pub fn with_config(config: HarnessConfig) -> Self {
        Self {
            clock: VirtualClock::with_frame_limit(config.frame_limit()),
            parser: DiagramParser::new(config.frame_time_factor),
            config,
        }
    }

    #[must_use]
    pub const fn clock(&self) -> &VirtualClock {
        &self.clock
    }

    #[must_use]
    pub const fn parser(&self) -> DiagramParser {
        self.parser
    }

    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Build a hot source from a diagram.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` for a malformed diagram.
    pub fn hot<T: Clone + MarkerValue + 'static>(
        &self,
        diagram: &str,
        values: Option<&ValueMap<T>>,
    ) -> Result<SimulatedSource<T>, ParseError> {
        self.hot_with_error(diagram, values, None)
    }

    /// Build a hot source whose `#` carries `error`.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` for a malformed diagram.
    pub fn hot_with_error<T: Clone + MarkerValue + 'static>(
        &self,
        diagram: &str,
        values: Option<&ValueMap<T>>,
        error: Option<&SimulatedError>,
    ) -> Result<SimulatedSource<T>, ParseError> {
        let parsed = self.parser.parse(diagram, values, error)?;
        SimulatedSource::hot(&self.clock, parsed, self.config.frame_time_factor)
    }

    /// Build a cold source from a diagram.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` for a malformed diagram or one containing `^`.
    pub fn cold<T: Clone + MarkerValue + 'static>(
        &self,
        diagram: &str,
        values: Option<&ValueMap<T>>,
    ) -> Result<SimulatedSource<T>, ParseError> {
        self.cold_with_error(diagram, values, None)
    }

    /// Build a cold source whose `#` carries `error`.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` for a malformed diagram or one containing `^`.
    pub fn cold_with_error<T: Clone + MarkerValue + 'static>(
        &self,
        diagram: &str,
        values: Option<&ValueMap<T>>,
        error: Option<&SimulatedError>,
    ) -> Result<SimulatedSource<T>, ParseError> {
        let parsed = self.parser.parse(diagram, values, error)?;
        SimulatedSource::cold(&self.clock, parsed, self.config.frame_time_factor)
    }

    /// Wire `source` through `operators`, run the clock, and record the
    /// output.
    ///
    /// `unsubscribe` is a subscription diagram whose `!` marks the frame at
    /// which the consumer unsubscribes, e.g. `"-----!"`. Without `^` the
    /// consumer subscribes at the current frame. With `^`, as in `"--^--!"`,
    /// the clock first runs up to that frame.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError` if the unsubscription diagram is malformed,
    /// has no `!`, puts `!` before `^`, or points into the past.
    pub fn run_pipeline<T, U>(
        &self,
        source: &SimulatedSource<T>,
        operators: impl FnOnce(Rc<dyn Observable<T>>) -> Rc<dyn Observable<U>>,
        unsubscribe: Option<&str>,
    ) -> Result<RecordedOutput<U>, HarnessError>
    where
        T: Clone + 'static,
        U: 'static,
    {
        let output = operators(source.as_observable());
        let timeline = self.record(&*output, unsubscribe)?;
        Ok(RecordedOutput {
            timeline,
            subscriptions: source.subscriptions(),
            frame_time_factor: self.config.frame_time_factor,
        })
    }

    /// Run an arbitrary observable and record its output. The returned
    /// subscription log is empty since there is no simulated source.
    ///
    /// # Errors
    ///
    /// Same as [`run_pipeline`](Self::run_pipeline).
    pub fn run_observable<U: 'static>(
        &self,
        observable: &dyn Observable<U>,
        unsubscribe: Option<&str>,
    ) -> Result<RecordedOutput<U>, HarnessError> {
        let timeline = self.record(observable, unsubscribe)?;
        Ok(RecordedOutput {
            timeline,
            subscriptions: crate::subscription::SubscriptionTracker::new()
                .snapshot(self.config.frame_time_factor),
            frame_time_factor: self.config.frame_time_factor,
        })
    }

    fn record<U: 'static>(
        &self,
        observable: &dyn Observable<U>,
        unsubscribe: Option<&str>,
    ) -> Result<Timeline<U>, HarnessError> {
        let markers = unsubscribe
            .map(|diagram| self.parser.parse_subscription(diagram))
            .transpose()?;
        let unsubscribe_at = markers
            .map(|m| m.unsubscribed_at.ok_or(HarnessError::MissingUnsubscription))
            .transpose()?;

        let now = self.clock.now();
        let start = markers.and_then(|m| m.subscribed_at).unwrap_or(now);
        for frame in std::iter::once(start).chain(unsubscribe_at) {
            if frame < now {
                return Err(ClockError::ScheduledInPast { frame, now }.into());
            }
        }
        if let Some(frame) = unsubscribe_at
            && frame < start
        {
            return Err(HarnessError::UnsubscribeBeforeSubscribe {
                subscribed_at: start,
                unsubscribed_at: frame,
            });
        }
        if start > self.clock.frame_limit() {
            return Err(HarnessError::BeyondFrameLimit {
                frame: start,
                frame_limit: self.clock.frame_limit(),
            });
        }

        // A delayed `^` subscribes after everything already queued for its frame.
        if start > now {
            self.clock.advance_to(start);
        }
        tracing::debug!(frame = start, ?unsubscribe_at, "pipeline run starting");

        let recorder = Recorder::new(self.clock.clone());
        let subscription = Subscription::new();
        if let Some(frame) = unsubscribe_at {
            let handle = subscription.clone();
            self.clock.schedule_at(frame, move || {
                tracing::debug!(frame, "unsubscribing pipeline");
                handle.unsubscribe();
            })?;
        }
        observable.subscribe(Subscriber::new(recorder.clone(), subscription.clone()));

        let executed = if subscription.is_closed() {
            0
        } else {
            self.clock.flush_until(|| subscription.is_closed())
        };
        let timeline = recorder.take();
        tracing::debug!(
            frame = self.clock.now(),
            executed,
            recorded = timeline.len(),
            terminated = timeline.is_terminated(),
            "pipeline run finished"
        );
        Ok(timeline)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::from_iter;

    #[test]
    fn test_run_pipeline_identity() {
        let ctx = TestContext::new();
        let source = ctx.cold::<char>("-a-b|", None).unwrap();
        let output = ctx.run_pipeline(&source, |s| s, None).unwrap();

        let frames: Vec<_> = output.timeline().entries().iter().map(|e| e.frame).collect();
        assert_eq!(frames, vec![10, 30, 40]);
        assert_eq!(output.render(None), "-a-b|");
        assert_eq!(output.subscriptions().render(), vec!["^---!"]);
    }

    #[test]
    fn test_run_pipeline_unsubscribe_stops_recording() {
        let ctx = TestContext::new();
        let source = ctx.cold::<char>("a-b-c-d|", None).unwrap();
        let output = ctx.run_pipeline(&source, |s| s, Some("---!")).unwrap();

        assert_eq!(output.render(None), "a-b");
        assert_eq!(output.subscriptions().render(), vec!["^--!"]);
        assert_eq!(ctx.clock().now(), 30);
    }

    #[test]
    fn test_unsubscribe_on_cold_event_frame_wins() {
        let ctx = TestContext::new();
        let source = ctx.cold::<char>("a-b-c|", None).unwrap();
        let output = ctx.run_pipeline(&source, |s| s, Some("--!")).unwrap();
        assert_eq!(output.render(None), "a");
    }

    #[test]
    fn test_unsubscribe_on_hot_event_frame_still_delivers() {
        let ctx = TestContext::new();
        let source = ctx.hot::<char>("^a-b-c|", None).unwrap();
        let output = ctx.run_pipeline(&source, |s| s, Some("---!")).unwrap();
        assert_eq!(output.render(None), "-a-b");
    }

    #[test]
    fn test_unsubscribe_diagram_errors() {
        let ctx = TestContext::new();
        let source = ctx.cold::<char>("a|", None).unwrap();

        assert_eq!(
            ctx.run_pipeline(&source, |s| s, Some("---")).unwrap_err(),
            HarnessError::MissingUnsubscription
        );
        assert!(matches!(
            ctx.run_pipeline(&source, |s| s, Some("-x-!")).unwrap_err(),
            HarnessError::Parse(ParseError::UnexpectedSubscriptionCharacter { .. })
        ));
        // Nothing ran: the source was never subscribed.
        assert!(source.subscriptions().windows().is_empty());
    }

    #[test]
    fn test_unsubscribe_in_the_past_is_rejected_before_subscribing() {
        let ctx = TestContext::new();
        let source = ctx.cold::<char>("a|", None).unwrap();
        ctx.clock().advance_to(50);

        assert_eq!(
            ctx.run_pipeline(&source, |s| s, Some("--!")).unwrap_err(),
            HarnessError::Clock(ClockError::ScheduledInPast { frame: 20, now: 50 })
        );
        assert_eq!(ctx.clock().pending(), 0);
    }

    #[test]
    fn test_run_observable_synchronous() {
        let ctx = TestContext::new();
        let output = ctx.run_observable(&*from_iter(vec![1u32, 2, 3]), None).unwrap();
        assert_eq!(output.render(None), "(123|)");
        assert!(output.subscriptions().windows().is_empty());
    }

    #[test]
    fn test_frame_limit_truncates_never_ending_runs() {
        let ctx = TestContext::with_config(HarnessConfig {
            frame_time_factor: 1,
            max_frames: 5,
        });
        let source = ctx.cold::<char>("a-----b|", None).unwrap();
        let output = ctx.run_pipeline(&source, |s| s, None).unwrap();

        assert_eq!(output.render(None), "a");
        assert_eq!(output.subscriptions().render(), vec!["^"]);
    }
}
