//! Subscribe/unsubscribe contract between producers and consumers.
//!
//! - [`Observer`] receives notifications
//! - [`Subscription`] is the handle: a closed flag plus teardown actions
//! - [`Subscriber`] pairs an observer with its subscription and enforces
//!   the protocol (nothing after a terminal, nothing after unsubscribe)
//! - [`Observable`] is the capability to subscribe
//!
//! Cancellation is a polled flag. A producer emitting a synchronous burst
//! must check [`Subscriber::is_closed`] between emissions; the flag is set
//! as soon as anything downstream unsubscribes, even in the middle of the
//! burst.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::diagram::{Notification, SimulatedError};

/// Receiver of notifications.
pub trait Observer<T> {
    fn next(&mut self, value: T);
    fn error(&mut self, error: SimulatedError);
    fn complete(&mut self);
}

type Teardown = Box<dyn FnOnce()>;

#[derive(Default)]
struct SubscriptionInner {
    closed: Cell<bool>,
    next_key: Cell<u64>,
    teardowns: RefCell<Vec<(u64, Teardown)>>,
}

impl SubscriptionInner {
    /// Returns the key of the registered teardown, or `None` if it ran
    /// immediately.
    fn push(&self, teardown: Teardown) -> Option<u64> {
        if self.closed.get() {
            teardown();
            return None;
        }
        let key = self.next_key.get();
        self.next_key.set(key + 1);
        self.teardowns.borrow_mut().push((key, teardown));
        Some(key)
    }

    fn remove(&self, key: u64) {
        self.teardowns.borrow_mut().retain(|(k, _)| *k != key);
    }
}

/// Shared handle to one subscription.
///
/// Clones refer to the same subscription. Unsubscribing is idempotent.
#[derive(Clone, Default)]
pub struct Subscription {
    inner: Rc<SubscriptionInner>,
}

impl Subscription {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.get()
    }

    /// Register work to run on unsubscribe. Runs immediately if the
    /// subscription is already closed.
    pub fn add(&self, teardown: impl FnOnce() + 'static) {
        self.inner.push(Box::new(teardown));
    }

    /// A new subscription that is unsubscribed whenever this one is.
    ///
    /// Operators use this for their upstream side, so tearing down the
    /// consumer tears down the whole chain. Unsubscribing the child on its
    /// own drops its entry from this subscription.
    #[must_use]
    pub fn child(&self) -> Self {
        let child = Self::new();
        let upstream = child.clone();
        if let Some(key) = self.inner.push(Box::new(move || upstream.unsubscribe())) {
            let parent = Rc::downgrade(&self.inner);
            child.add(move || {
                if let Some(parent) = parent.upgrade() {
                    parent.remove(key);
                }
            });
        }
        child
    }

    /// Close the subscription and run its teardowns. A no-op if already
    /// closed.
    pub fn unsubscribe(&self) {
        if self.inner.closed.replace(true) {
            return;
        }
        let teardowns = std::mem::take(&mut *self.inner.teardowns.borrow_mut());
        for (_, teardown) in teardowns {
            teardown();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// An observer bound to its subscription.
///
/// Notifications after the subscription closed are dropped. A terminal
/// notification is forwarded and then closes the subscription.
pub struct Subscriber<T> {
    destination: Box<dyn Observer<T>>,
    subscription: Subscription,
}

impl<T> Subscriber<T> {
    #[must_use]
    pub fn new(destination: impl Observer<T> + 'static, subscription: Subscription) -> Self {
        Self {
            destination: Box::new(destination),
            subscription,
        }
    }

    #[must_use]
    pub const fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.subscription.is_closed()
    }

    pub fn next(&mut self, value: T) {
        if !self.is_closed() {
            self.destination.next(value);
        }
    }

    pub fn error(&mut self, error: SimulatedError) {
        if self.is_closed() {
            return;
        }
        self.destination.error(error);
        self.subscription.unsubscribe();
    }

    pub fn complete(&mut self) {
        if self.is_closed() {
            return;
        }
        self.destination.complete();
        self.subscription.unsubscribe();
    }

    /// Forward a notification to the matching method.
    pub fn deliver(&mut self, notification: Notification<T>) {
        match notification {
            Notification::Next(value) => self.next(value),
            Notification::Error(error) => self.error(error),
            Notification::Complete => self.complete(),
        }
    }
}

/// Capability to subscribe to a stream of `T`.
pub trait Observable<T> {
    /// Attach `subscriber`. Producers must stop emitting once the
    /// subscriber reports closed.
    fn subscribe(&self, subscriber: Subscriber<T>);

    /// Attach `observer` with a fresh subscription and return its handle.
    fn subscribe_with(&self, observer: impl Observer<T> + 'static) -> Subscription
    where
        Self: Sized,
    {
        let subscription = Subscription::new();
        self.subscribe(Subscriber::new(observer, subscription.clone()));
        subscription
    }
}

impl<T, O: Observable<T> + ?Sized> Observable<T> for Rc<O> {
    fn subscribe(&self, subscriber: Subscriber<T>) {
        (**self).subscribe(subscriber);
    }
}

/// Observable built from a producer closure, run synchronously on every
/// subscribe.
struct Create<F> {
    producer: F,
}

impl<T, F: Fn(&mut Subscriber<T>)> Observable<T> for Create<F> {
    fn subscribe(&self, mut subscriber: Subscriber<T>) {
        (self.producer)(&mut subscriber);
    }
}

/// Build an observable from a producer closure.
///
/// The producer runs synchronously inside `subscribe` and owns the emission
/// loop, so it is responsible for polling [`Subscriber::is_closed`].
///
/// ```
/// use marbles::observable::{Observable, create};
/// use marbles::harness::Recorder;
/// use marbles::clock::VirtualClock;
///
/// let source = create(|subscriber| {
///     for i in 0..3 {
///         if subscriber.is_closed() {
///             return;
///         }
///         subscriber.next(i);
///     }
///     subscriber.complete();
/// });
///
/// let recorder = Recorder::new(VirtualClock::new());
/// source.subscribe_with(recorder.clone());
/// assert_eq!(recorder.timeline().values().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
/// ```
pub fn create<T: 'static>(producer: impl Fn(&mut Subscriber<T>) + 'static) -> Rc<dyn Observable<T>> {
    Rc::new(Create { producer })
}

/// Observable that emits every item of `items` synchronously, then
/// completes. Stops early if the subscriber closes mid-burst.
pub fn from_iter<I>(items: I) -> Rc<dyn Observable<I::Item>>
where
    I: IntoIterator + Clone + 'static,
    I::Item: 'static,
{
    create(move |subscriber| {
        for item in items.clone() {
            if subscriber.is_closed() {
                tracing::debug!("synchronous source stopped by closed subscriber");
                return;
            }
            subscriber.next(item);
        }
        subscriber.complete();
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct Collect {
        seen: Rc<RefCell<Vec<Notification<i32>>>>,
    }

    impl Observer<i32> for Collect {
        fn next(&mut self, value: i32) {
            self.seen.borrow_mut().push(Notification::Next(value));
        }

        fn error(&mut self, error: SimulatedError) {
            self.seen.borrow_mut().push(Notification::Error(error));
        }

        fn complete(&mut self) {
            self.seen.borrow_mut().push(Notification::Complete);
        }
    }

    /// Closes its own subscription once two values arrived.
    struct CloseAfterTwo {
        inner: Collect,
        closer: Subscription,
        seen: Rc<RefCell<Vec<Notification<i32>>>>,
    }
    impl Observer<i32> for CloseAfterTwo {
        fn next(&mut self, value: i32) {
            self.inner.next(value);
            if self.seen.borrow().len() == 2 {
                self.closer.unsubscribe();
            }
        }
        fn error(&mut self, error: SimulatedError) {
            self.inner.error(error);
        }
        fn complete(&mut self) {
            self.inner.complete();
        }
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let runs = Rc::new(Cell::new(0));
        let subscription = Subscription::new();
        let counter = Rc::clone(&runs);
        subscription.add(move || counter.set(counter.get() + 1));

        subscription.unsubscribe();
        subscription.unsubscribe();
        assert!(subscription.is_closed());
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_add_after_close_runs_immediately() {
        let subscription = Subscription::new();
        subscription.unsubscribe();

        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        subscription.add(move || flag.set(true));
        assert!(ran.get());
    }

    #[test]
    fn test_child_follows_parent() {
        let parent = Subscription::new();
        let child = parent.child();
        let grandchild = child.child();

        parent.unsubscribe();
        assert!(child.is_closed());
        assert!(grandchild.is_closed());
    }

    #[test]
    fn test_child_does_not_close_parent() {
        let parent = Subscription::new();
        let child = parent.child();
        child.unsubscribe();
        assert!(!parent.is_closed());
    }

    #[test]
    fn test_closed_children_leave_no_teardowns_behind() {
        let parent = Subscription::new();
        for _ in 0..100 {
            let child = parent.child();
            child.unsubscribe();
        }
        assert!(parent.inner.teardowns.borrow().is_empty());

        let live = parent.child();
        assert_eq!(parent.inner.teardowns.borrow().len(), 1);
        parent.unsubscribe();
        assert!(live.is_closed());
    }

    #[test]
    fn test_subscriber_drops_after_terminal() {
        let observer = Collect::default();
        let mut subscriber = Subscriber::new(observer.clone(), Subscription::new());

        subscriber.next(1);
        subscriber.complete();
        subscriber.next(2);
        subscriber.error(SimulatedError::generic());

        assert!(subscriber.is_closed());
        assert_eq!(
            *observer.seen.borrow(),
            vec![Notification::Next(1), Notification::Complete]
        );
    }

    #[test]
    fn test_from_iter_stops_when_closed_mid_burst() {
        let observer = Collect::default();
        let subscription = Subscription::new();
        let closer = subscription.clone();
        let seen = Rc::clone(&observer.seen);

        let source = from_iter(0..10);
        source.subscribe(Subscriber::new(
            CloseAfterTwo {
                inner: observer.clone(),
                closer,
                seen,
            },
            subscription,
        ));

        assert_eq!(
            *observer.seen.borrow(),
            vec![Notification::Next(0), Notification::Next(1)]
        );
    }
}
