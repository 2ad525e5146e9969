//! Simulated sources that replay a parsed timeline on the virtual clock.
//!
//! # Hot vs. Cold
//!
//! - A **hot** source schedules its whole timeline when it is created, at
//!   absolute frames. Subscribers only see what happens after they attach;
//!   history before `^` (negative frames) is never observable.
//! - A **cold** source schedules nothing until someone subscribes, then
//!   replays the timeline relative to the subscription frame, separately
//!   for each subscriber.
//!
//! Every subscribe/unsubscribe is recorded in the source's
//! [`SubscriptionTracker`].

// Sources hand out shared handles to their state
#![allow(clippy::disallowed_methods)]

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::clock::{TimeSource, VirtualClock};
use crate::diagram::{
    DiagramParser, Frame, MarkerValue, Notification, ParseError, ParsedDiagram, Timeline, ValueMap,
};
use crate::observable::{Observable, Subscriber, Subscription};
use crate::subscription::{SubscriptionLog, SubscriptionTracker, WindowId};

/// How a source relates its timeline to its subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Hot,
    Cold,
}

/// One attached consumer of a hot source.
struct HotSubscriber<T> {
    subscription: Subscription,
    subscriber: Rc<RefCell<Subscriber<T>>>,
}

struct SourceState<T> {
    kind: SourceKind,
    timeline: Timeline<T>,
    /// Frames of history before the subscription point (hot only).
    history_frames: Frame,
    frame_time_factor: u32,
    clock: VirtualClock,
    tracker: RefCell<SubscriptionTracker>,
    hot_subscribers: RefCell<Vec<HotSubscriber<T>>>,
}

impl<T> SourceState<T> {
    /// Close the window of a subscriber that went away.
    fn release(&self, window: WindowId) {
        let now = self.clock.now();
        if let Err(e) = self.tracker.borrow_mut().close(window, now) {
            tracing::debug!("ignoring repeated unsubscribe: {e}");
            return;
        }
        self.hot_subscribers
            .borrow_mut()
            .retain(|entry| !entry.subscription.is_closed());
        tracing::debug!(kind = ?self.kind, frame = now, "source unsubscribed");
    }
}

impl<T: Clone> SourceState<T> {
    /// Deliver one hot notification to everyone attached right now.
    fn broadcast(&self, notification: &Notification<T>) {
        // Snapshot: delivery may unsubscribe (and so mutate the list).
        let targets: Vec<_> = self
            .hot_subscribers
            .borrow()
            .iter()
            .map(|entry| Rc::clone(&entry.subscriber))
            .collect();
        for subscriber in targets {
            subscriber.borrow_mut().deliver(notification.clone());
        }
    }
}

/// A source replaying a timeline. Cloning yields another handle to the same
/// source.
pub struct SimulatedSource<T> {
    state: Rc<SourceState<T>>,
}

impl<T> Clone for SimulatedSource<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T: Clone + 'static> SimulatedSource<T> {
    /// Build a hot source and schedule its timeline.
    ///
    /// Entries before the current clock frame have already happened and are
    /// not scheduled.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::UnsubscriptionMarkerInSource` if the diagram has `!`.
    pub fn hot(
        clock: &VirtualClock,
        parsed: ParsedDiagram<T>,
        frame_time_factor: u32,
    ) -> Result<Self, ParseError> {
        if parsed.unsubscription_frame.is_some() {
            return Err(ParseError::UnsubscriptionMarkerInSource);
        }
        let history_frames = parsed
            .subscription_column
            .and_then(|column| Frame::try_from(column).ok())
            .map_or(0, |column| column * Frame::from(frame_time_factor));
        let source = Self::new(
            SourceKind::Hot,
            clock,
            parsed.timeline,
            history_frames,
            frame_time_factor,
        );

        let now = clock.now();
        let mut skipped = 0usize;
        for entry in source.state.timeline.entries() {
            if entry.frame < now {
                skipped += 1;
                continue;
            }
            let weak: Weak<SourceState<T>> = Rc::downgrade(&source.state);
            let notification = entry.notification.clone();
            let delay = u64::try_from(entry.frame - now).unwrap_or(0);
            clock.schedule(delay, move || {
                if let Some(state) = weak.upgrade() {
                    state.broadcast(&notification);
                }
            });
        }
        tracing::debug!(
            scheduled = source.state.timeline.len() - skipped,
            skipped,
            "hot source created"
        );
        Ok(source)
    }

    /// Build a cold source. Nothing is scheduled until a subscription.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::SubscriptionMarkerInCold` if the diagram has `^`,
    /// or `ParseError::UnsubscriptionMarkerInSource` if it has `!`.
    pub fn cold(
        clock: &VirtualClock,
        parsed: ParsedDiagram<T>,
        frame_time_factor: u32,
    ) -> Result<Self, ParseError> {
        if let Some(column) = parsed.subscription_column {
            return Err(ParseError::SubscriptionMarkerInCold { column });
        }
        if parsed.unsubscription_frame.is_some() {
            return Err(ParseError::UnsubscriptionMarkerInSource);
        }
        Ok(Self::new(SourceKind::Cold, clock, parsed.timeline, 0, frame_time_factor))
    }

    fn new(
        kind: SourceKind,
        clock: &VirtualClock,
        timeline: Timeline<T>,
        history_frames: Frame,
        frame_time_factor: u32,
    ) -> Self {
        Self {
            state: Rc::new(SourceState {
                kind,
                timeline,
                history_frames,
                frame_time_factor,
                clock: clock.clone(),
                tracker: RefCell::new(SubscriptionTracker::new()),
                hot_subscribers: RefCell::new(Vec::new()),
            }),
        }
    }

    /// This source as a shareable observable, for building pipelines.
    #[must_use]
    pub fn as_observable(&self) -> Rc<dyn Observable<T>> {
        Rc::new(self.clone())
    }

    /// Replay the timeline for one cold subscriber, relative to now.
    fn schedule_cold(&self, subscriber: Subscriber<T>) {
        let clock = &self.state.clock;
        let subscriber = Rc::new(RefCell::new(subscriber));
        for entry in self.state.timeline.entries() {
            let subscriber = Rc::clone(&subscriber);
            let notification = entry.notification.clone();
            let delay = u64::try_from(entry.frame).unwrap_or(0);
            clock.schedule(delay, move || {
                subscriber.borrow_mut().deliver(notification);
            });
        }
    }
}

impl<T> SimulatedSource<T> {
    #[must_use]
    pub fn kind(&self) -> SourceKind {
        self.state.kind
    }

    #[must_use]
    pub fn timeline(&self) -> &Timeline<T> {
        &self.state.timeline
    }

    /// Frames of history before the subscription point; 0 for cold sources.
    #[must_use]
    pub fn history_frames(&self) -> Frame {
        self.state.history_frames
    }

    /// Snapshot of the subscription windows recorded so far.
    #[must_use]
    pub fn subscriptions(&self) -> SubscriptionLog {
        self.state
            .tracker
            .borrow()
            .snapshot(self.state.frame_time_factor)
    }

    /// Number of consumers currently attached.
    #[must_use]
    pub fn active_subscriptions(&self) -> usize {
        self.state.tracker.borrow().active()
    }
}

/// Parse `diagram` and build a hot source on `clock`.
///
/// # Errors
///
/// Returns a `ParseError` for a malformed diagram or one containing `!`.
pub fn hot_source<T: Clone + MarkerValue + 'static>(
    clock: &VirtualClock,
    parser: DiagramParser,
    diagram: &str,
    values: Option<&ValueMap<T>>,
) -> Result<SimulatedSource<T>, ParseError> {
    let parsed = parser.parse(diagram, values, None)?;
    SimulatedSource::hot(clock, parsed, parser.frame_time_factor())
}

/// Parse `diagram` and build a cold source on `clock`.
///
/// # Errors
///
/// Returns a `ParseError` for a malformed diagram or one containing `^`
/// or `!`.
pub fn cold_source<T: Clone + MarkerValue + 'static>(
    clock: &VirtualClock,
    parser: DiagramParser,
    diagram: &str,
    values: Option<&ValueMap<T>>,
) -> Result<SimulatedSource<T>, ParseError> {
    let parsed = parser.parse(diagram, values, None)?;
    SimulatedSource::cold(clock, parsed, parser.frame_time_factor())
}

impl<T: Clone + 'static> Observable<T> for SimulatedSource<T> {
    fn subscribe(&self, subscriber: Subscriber<T>) {
        let now = self.state.clock.now();
        let window = self.state.tracker.borrow_mut().open(now);
        tracing::debug!(kind = ?self.state.kind, frame = now, "source subscribed");

        let subscription = subscriber.subscription().clone();
        let weak = Rc::downgrade(&self.state);
        subscription.add(move || {
            if let Some(state) = weak.upgrade() {
                state.release(window);
            }
        });
        if subscription.is_closed() {
            return;
        }

        match self.state.kind {
            SourceKind::Hot => self.state.hot_subscribers.borrow_mut().push(HotSubscriber {
                subscription,
                subscriber: Rc::new(RefCell::new(subscriber)),
            }),
            SourceKind::Cold => self.schedule_cold(subscriber),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::Recorder;

    fn hot(clock: &VirtualClock, diagram: &str) -> SimulatedSource<char> {
        let parsed = DiagramParser::new(10).parse(diagram, None, None).unwrap();
        SimulatedSource::hot(clock, parsed, 10).unwrap()
    }

    fn cold(clock: &VirtualClock, diagram: &str) -> SimulatedSource<char> {
        let parsed = DiagramParser::new(10).parse(diagram, None, None).unwrap();
        SimulatedSource::cold(clock, parsed, 10).unwrap()
    }

    fn frames(recorder: &Recorder<char>) -> Vec<(Frame, Notification<char>)> {
        recorder
            .timeline()
            .entries()
            .iter()
            .map(|e| (e.frame, e.notification.clone()))
            .collect()
    }

    #[test]
    fn test_cold_replays_relative_to_subscription() {
        let clock = VirtualClock::new();
        let source = cold(&clock, "-a-|");
        assert_eq!(clock.pending(), 0);

        clock.advance_to(20);
        let recorder = Recorder::new(clock.clone());
        source.subscribe_with(recorder.clone());
        clock.flush();

        assert_eq!(
            frames(&recorder),
            vec![(30, Notification::Next('a')), (50, Notification::Complete)]
        );
        assert_eq!(source.subscriptions().render(), vec!["--^--!"]);
    }

    #[test]
    fn test_cold_rejects_caret() {
        let clock = VirtualClock::new();
        let parsed = parse_char("--^-a");
        assert!(matches!(
            SimulatedSource::cold(&clock, parsed, 1),
            Err(ParseError::SubscriptionMarkerInCold { column: 2 })
        ));
    }

    #[test]
    fn test_sources_reject_unsubscription_marker() {
        let clock = VirtualClock::new();
        assert!(matches!(
            SimulatedSource::cold(&clock, parse_char("-a-!"), 1),
            Err(ParseError::UnsubscriptionMarkerInSource)
        ));
        assert!(matches!(
            SimulatedSource::hot(&clock, parse_char("-a-!"), 1),
            Err(ParseError::UnsubscriptionMarkerInSource)
        ));
    }

    fn parse_char(diagram: &str) -> ParsedDiagram<char> {
        DiagramParser::default().parse(diagram, None, None).unwrap()
    }

    #[test]
    fn test_hot_skips_history_and_keeps_absolute_frames() {
        let clock = VirtualClock::new();
        let source = hot(&clock, "--a--^b-c-|");
        assert_eq!(source.history_frames(), 50);
        // history entry `a` is never scheduled
        assert_eq!(clock.pending(), 3);

        clock.advance_to(20);
        let recorder = Recorder::new(clock.clone());
        source.subscribe_with(recorder.clone());
        clock.flush();

        assert_eq!(
            frames(&recorder),
            vec![(30, Notification::Next('c')), (50, Notification::Complete)]
        );
    }

    #[test]
    fn test_hot_multiple_subscribers_share_frames() {
        let clock = VirtualClock::new();
        let source = hot(&clock, "^-a--b-|");

        let early = Recorder::new(clock.clone());
        source.subscribe_with(early.clone());
        clock.advance_to(30);
        let late = Recorder::new(clock.clone());
        source.subscribe_with(late.clone());
        clock.flush();

        assert_eq!(early.timeline().len(), 3);
        assert_eq!(
            frames(&late),
            vec![(50, Notification::Next('b')), (70, Notification::Complete)]
        );
        assert_eq!(source.subscriptions().render(), vec!["^------!", "---^---!"]);
    }

    #[test]
    fn test_unsubscribe_closes_window_and_stops_delivery() {
        let clock = VirtualClock::new();
        let source = cold(&clock, "a-b-c-|");
        let recorder = Recorder::new(clock.clone());
        let subscription = source.subscribe_with(recorder.clone());

        clock.advance_to(30);
        subscription.unsubscribe();
        subscription.unsubscribe();
        clock.flush();

        assert_eq!(
            recorder.timeline().values().copied().collect::<Vec<_>>(),
            vec!['a', 'b']
        );
        assert_eq!(source.active_subscriptions(), 0);
        assert_eq!(source.subscriptions().render(), vec!["^--!"]);
    }

    #[test]
    fn test_resubscribe_records_separate_windows() {
        let clock = VirtualClock::new();
        let source = cold(&clock, "-a-");

        let first = source.subscribe_with(Recorder::new(clock.clone()));
        clock.advance_to(20);
        first.unsubscribe();
        clock.advance_to(40);
        let second = source.subscribe_with(Recorder::new(clock.clone()));
        clock.advance_to(50);
        second.unsubscribe();

        assert_eq!(source.subscriptions().render(), vec!["^-!", "----^!"]);
    }

    #[test]
    fn test_free_constructors_use_parser_factor() {
        let clock = VirtualClock::new();
        let parser = DiagramParser::new(5);
        let source = hot_source::<char>(&clock, parser, "-^-a|", None).unwrap();
        assert_eq!(source.kind(), SourceKind::Hot);
        assert_eq!(source.history_frames(), 5);
        assert_eq!(source.timeline().entries()[0].frame, 10);

        let source = cold_source::<u8>(&clock, parser, "-1-2|", None).unwrap();
        assert_eq!(source.kind(), SourceKind::Cold);
        assert_eq!(source.timeline().values().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert!(matches!(
            cold_source::<char>(&clock, parser, "-^-a|", None),
            Err(ParseError::SubscriptionMarkerInCold { column: 1 })
        ));
    }

    #[test]
    fn test_empty_cold_source_is_inert() {
        let clock = VirtualClock::new();
        let source = cold(&clock, "");
        let recorder = Recorder::new(clock.clone());
        source.subscribe_with(recorder.clone());
        clock.flush();

        assert!(recorder.timeline().is_empty());
        assert_eq!(source.subscriptions().render(), vec!["^"]);
    }
}
