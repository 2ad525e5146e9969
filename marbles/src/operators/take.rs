//! `take`: forwards the first `count` values, then completes.

use std::rc::Rc;

use crate::diagram::SimulatedError;
use crate::observable::{Observable, Observer, Subscriber};

struct TakeObservable<T> {
    source: Rc<dyn Observable<T>>,
    count: usize,
}

struct TakeObserver<T> {
    destination: Subscriber<T>,
    remaining: usize,
}

impl<T> Observer<T> for TakeObserver<T> {
    fn next(&mut self, value: T) {
        if self.remaining == 0 {
            return;
        }
        self.remaining -= 1;
        self.destination.next(value);
        if self.remaining == 0 {
            // Completing closes downstream, which unsubscribes upstream.
            self.destination.complete();
        }
    }

    fn error(&mut self, error: SimulatedError) {
        self.destination.error(error);
    }

    fn complete(&mut self) {
        self.destination.complete();
    }
}

impl<T: 'static> Observable<T> for TakeObservable<T> {
    fn subscribe(&self, mut subscriber: Subscriber<T>) {
        if self.count == 0 {
            subscriber.complete();
            return;
        }
        let upstream = subscriber.subscription().child();
        let observer = TakeObserver {
            destination: subscriber,
            remaining: self.count,
        };
        self.source.subscribe(Subscriber::new(observer, upstream));
    }
}

/// Forward the first `count` values, then complete and unsubscribe from
/// upstream. `take(source, 0)` completes on subscribe without touching
/// upstream.
pub fn take<T: 'static>(source: Rc<dyn Observable<T>>, count: usize) -> Rc<dyn Observable<T>> {
    Rc::new(TakeObservable { source, count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::{assert_subscriptions, assert_timeline};
    use crate::harness::TestContext;

    #[test]
    fn test_take_completes_after_count() {
        let ctx = TestContext::new();
        let source = ctx.cold::<char>("-a-b-c-|", None).unwrap();
        let output = ctx.run_pipeline(&source, |s| take(s, 2), None).unwrap();

        assert_timeline(&output, "-a-(b|)", None, None).unwrap();
        assert_subscriptions(output.subscriptions(), &["^--!"]).unwrap();
    }

    #[test]
    fn test_take_more_than_available_forwards_completion() {
        let ctx = TestContext::new();
        let source = ctx.cold::<char>("-a|", None).unwrap();
        let output = ctx.run_pipeline(&source, |s| take(s, 5), None).unwrap();

        assert_timeline(&output, "-a|", None, None).unwrap();
    }

    #[test]
    fn test_take_zero_never_subscribes_upstream() {
        let ctx = TestContext::new();
        let source = ctx.cold::<char>("-a-b|", None).unwrap();
        let output = ctx.run_pipeline(&source, |s| take(s, 0), None).unwrap();

        assert_timeline(&output, "|", None, None).unwrap();
        assert!(output.subscriptions().windows().is_empty());
    }

    #[test]
    fn test_take_forwards_error() {
        let ctx = TestContext::new();
        let source = ctx.cold::<char>("-a#", None).unwrap();
        let output = ctx.run_pipeline(&source, |s| take(s, 3), None).unwrap();

        assert_timeline(&output, "-a#", None, None).unwrap();
        assert_subscriptions(output.subscriptions(), &["^-!"]).unwrap();
    }
}
