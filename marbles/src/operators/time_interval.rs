//! `time_interval`: pairs every value with the frames elapsed since the
//! previous one.

// The time source is shared by every subscription of the operator
#![allow(clippy::disallowed_methods)]

use std::rc::Rc;

use crate::clock::TimeSource;
use crate::diagram::{Frame, MarkerValue, SimulatedError};
use crate::observable::{Observable, Observer, Subscriber};

/// A value with the number of frames since the previous emission (or since
/// subscription, for the first value).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimeInterval<T> {
    pub value: T,
    pub interval: Frame,
}

impl<T> TimeInterval<T> {
    #[must_use]
    pub const fn new(value: T, interval: Frame) -> Self {
        Self { value, interval }
    }
}

/// No marker maps to a `TimeInterval` by itself; diagrams must name them
/// through a `ValueMap`.
impl<T> MarkerValue for TimeInterval<T> {}

struct TimeIntervalObservable<T, S> {
    source: Rc<dyn Observable<T>>,
    time: Rc<S>,
}

struct TimeIntervalObserver<T, S> {
    destination: Subscriber<TimeInterval<T>>,
    time: Rc<S>,
    last_frame: Frame,
}

impl<T, S: TimeSource> Observer<T> for TimeIntervalObserver<T, S> {
    fn next(&mut self, value: T) {
        let now = self.time.now();
        let interval = now - self.last_frame;
        self.last_frame = now;
        self.destination.next(TimeInterval::new(value, interval));
    }

    fn error(&mut self, error: SimulatedError) {
        self.destination.error(error);
    }

    fn complete(&mut self) {
        self.destination.complete();
    }
}

impl<T: 'static, S: TimeSource + 'static> Observable<TimeInterval<T>>
    for TimeIntervalObservable<T, S>
{
    fn subscribe(&self, subscriber: Subscriber<TimeInterval<T>>) {
        let upstream = subscriber.subscription().child();
        let observer = TimeIntervalObserver {
            destination: subscriber,
            time: Rc::clone(&self.time),
            last_frame: self.time.now(),
        };
        self.source.subscribe(Subscriber::new(observer, upstream));
    }
}

/// Emit `TimeInterval { value, interval }` for every upstream value, where
/// `interval` is measured on `time` from the previous emission, or from the
/// subscription frame for the first one.
///
/// Errors and completion pass through unchanged.
pub fn time_interval<T: 'static>(
    source: Rc<dyn Observable<T>>,
    time: impl TimeSource + 'static,
) -> Rc<dyn Observable<TimeInterval<T>>> {
    Rc::new(TimeIntervalObservable {
        source,
        time: Rc::new(time),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;
    use crate::harness::{Recorder, TestContext};
    use crate::observable::from_iter;

    #[test]
    fn test_first_interval_measured_from_subscription() {
        let ctx = TestContext::new();
        let source = ctx.hot::<char>("^--a-b|", None).unwrap();
        let clock = ctx.clock().clone();
        ctx.clock().advance_to(10);

        let output = ctx
            .run_pipeline(&source, |s| time_interval(s, clock), None)
            .unwrap();
        let values: Vec<_> = output.timeline().values().cloned().collect();
        assert_eq!(
            values,
            vec![TimeInterval::new('a', 20), TimeInterval::new('b', 20)]
        );
    }

    #[test]
    fn test_synchronous_values_have_zero_interval() {
        let clock = VirtualClock::new();
        let recorder = Recorder::new(clock.clone());
        time_interval(from_iter(['x', 'y']), clock).subscribe_with(recorder.clone());

        let intervals: Vec<_> = recorder.timeline().values().map(|v| v.interval).collect();
        assert_eq!(intervals, vec![0, 0]);
        assert!(recorder.timeline().is_terminated());
    }

    #[test]
    fn test_each_subscription_has_its_own_state() {
        let ctx = TestContext::new();
        let source = ctx.cold::<char>("-a-b|", None).unwrap();
        let clock = ctx.clock().clone();
        let pipeline = time_interval(source.as_observable(), clock);

        let first = Recorder::new(ctx.clock().clone());
        pipeline.subscribe_with(first.clone());
        ctx.clock().advance_to(30);
        let second = Recorder::new(ctx.clock().clone());
        pipeline.subscribe_with(second.clone());
        ctx.clock().flush();

        let intervals = |r: &Recorder<TimeInterval<char>>| {
            r.timeline().values().map(|v| v.interval).collect::<Vec<_>>()
        };
        assert_eq!(intervals(&first), vec![10, 20]);
        assert_eq!(intervals(&second), vec![10, 20]);
    }

    #[test]
    fn test_time_interval_has_no_default_marker() {
        assert_eq!(TimeInterval::<char>::from_marker('a'), None);
        assert_eq!(TimeInterval::new('a', 1).to_marker(), None);
    }
}
