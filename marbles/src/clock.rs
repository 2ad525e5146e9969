//! Virtual clock for deterministic simulation.
//!
//! The clock never reads real time and never sleeps. It owns a queue of
//! actions keyed by `(frame, insertion order)` and only moves forward when
//! the queue is drained.
//!
//! # Guarantees
//!
//! - Actions run in strictly non-decreasing frame order
//! - Actions for the same frame run in the order they were scheduled
//! - An action may schedule more work for the current frame; that work runs
//!   before the clock moves on
//! - Nothing is ever scheduled before the current frame
//! - A panic inside an action propagates out of the flush call untouched
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use marbles::clock::{TimeSource, VirtualClock};
//!
//! let clock = VirtualClock::new();
//! let log = Rc::new(RefCell::new(Vec::new()));
//!
//! for (frame, name) in [(20, "late"), (10, "early")] {
//!     let log = Rc::clone(&log);
//!     clock.schedule_at(frame, move || log.borrow_mut().push(name)).unwrap();
//! }
//!
//! clock.flush();
//! assert_eq!(*log.borrow(), vec!["early", "late"]);
//! assert_eq!(clock.now(), 20);
//! ```

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::rc::Rc;

use crate::diagram::Frame;

/// Abstraction over "what time is it".
///
/// Operators read time only through this trait, so they never depend on the
/// concrete clock.
pub trait TimeSource {
    /// Current frame.
    fn now(&self) -> Frame;
}

type Action = Box<dyn FnOnce()>;

struct ScheduledAction {
    frame: Frame,
    sequence: u64,
    action: Action,
}

impl PartialEq for ScheduledAction {
    fn eq(&self, other: &Self) -> bool {
        self.frame == other.frame && self.sequence == other.sequence
    }
}

impl Eq for ScheduledAction {}

impl PartialOrd for ScheduledAction {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledAction {
    // Reversed: BinaryHeap is a max-heap and we want the earliest first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .frame
            .cmp(&self.frame)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

struct ClockState {
    now: Frame,
    next_sequence: u64,
    queue: BinaryHeap<ScheduledAction>,
    /// Actions beyond this frame are never executed.
    frame_limit: Frame,
}

/// Error returned when scheduling fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockError {
    /// The requested frame is before the current frame.
    ScheduledInPast { frame: Frame, now: Frame },
}

impl std::fmt::Display for ClockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ScheduledInPast { frame, now } => {
                write!(f, "cannot schedule at frame {frame}, clock is already at {now}")
            }
        }
    }
}

impl std::error::Error for ClockError {}

/// A deterministic, queue-driven clock.
///
/// Cloning yields another handle to the same clock. Create one clock per
/// test run; handles must not be shared across runs.
#[derive(Clone)]
pub struct VirtualClock {
    state: Rc<RefCell<ClockState>>,
}

impl VirtualClock {
    /// Create a clock at frame 0 with no frame limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_frame_limit(Frame::MAX)
    }

    /// Create a clock at frame 0 that never executes actions scheduled
    /// after `frame_limit`.
    #[must_use]
    pub fn with_frame_limit(frame_limit: Frame) -> Self {
        Self {
            state: Rc::new(RefCell::new(ClockState {
                now: 0,
                next_sequence: 0,
                queue: BinaryHeap::new(),
                frame_limit,
            })),
        }
    }

    #[must_use]
    pub fn frame_limit(&self) -> Frame {
        self.state.borrow().frame_limit
    }

    /// Number of actions waiting in the queue.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.borrow().queue.len()
    }

    /// Schedule `action` to run when the clock reaches `frame`.
    ///
    /// # Errors
    ///
    /// Returns `ClockError::ScheduledInPast` if `frame` is before the
    /// current frame.
    pub fn schedule_at(&self, frame: Frame, action: impl FnOnce() + 'static) -> Result<(), ClockError> {
        let mut state = self.state.borrow_mut();
        if frame < state.now {
            return Err(ClockError::ScheduledInPast {
                frame,
                now: state.now,
            });
        }
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.queue.push(ScheduledAction {
            frame,
            sequence,
            action: Box::new(action),
        });
        Ok(())
    }

    /// Schedule `action` to run `delay` frames from now.
    pub fn schedule(&self, delay: u64, action: impl FnOnce() + 'static) {
        let mut state = self.state.borrow_mut();
        let frame = state
            .now
            .saturating_add(Frame::try_from(delay).unwrap_or(Frame::MAX));
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.queue.push(ScheduledAction {
            frame,
            sequence,
            action: Box::new(action),
        });
    }

    /// Pop the next action due at or before `target`, moving the clock to
    /// its frame. The borrow is released before the action runs.
    fn pop_due(&self, target: Frame) -> Option<Action> {
        let mut state = self.state.borrow_mut();
        let limit = target.min(state.frame_limit);
        if state.queue.peek().is_none_or(|next| next.frame > limit) {
            return None;
        }
        let scheduled = state.queue.pop()?;
        state.now = scheduled.frame;
        tracing::trace!(
            frame = scheduled.frame,
            sequence = scheduled.sequence,
            "executing scheduled action"
        );
        Some(scheduled.action)
    }

    fn drain(&self, target: Frame, stop: &mut dyn FnMut() -> bool) -> usize {
        let mut executed = 0;
        while let Some(action) = self.pop_due(target) {
            action();
            executed += 1;
            if stop() {
                break;
            }
        }
        executed
    }

    /// Run every action due at or before `frame`, then move the clock to
    /// `frame` (bounded by the frame limit). Returns the number of actions
    /// executed.
    pub fn advance_to(&self, frame: Frame) -> usize {
        let executed = self.drain(frame, &mut || false);
        let mut state = self.state.borrow_mut();
        state.now = state.now.max(frame.min(state.frame_limit));
        executed
    }

    /// Run actions until the queue is exhausted or only actions beyond the
    /// frame limit remain.
    pub fn flush(&self) -> usize {
        self.flush_until(|| false)
    }

    /// Like [`flush`](Self::flush), but stop as soon as `stop` returns true
    /// after an action. Remaining actions stay queued.
    pub fn flush_until(&self, mut stop: impl FnMut() -> bool) -> usize {
        let executed = self.drain(Frame::MAX, &mut stop);
        let pending = self.pending();
        if pending > 0 && !stop() {
            tracing::warn!(
                pending,
                frame_limit = self.frame_limit(),
                "frame limit reached with actions still queued"
            );
        }
        executed
    }
}

impl TimeSource for VirtualClock {
    fn now(&self) -> Frame {
        self.state.borrow().now
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for VirtualClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("VirtualClock")
            .field("now", &state.now)
            .field("pending", &state.queue.len())
            .field("frame_limit", &state.frame_limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Rc<RefCell<Vec<(Frame, &'static str)>>>, VirtualClock) {
        (Rc::new(RefCell::new(Vec::new())), VirtualClock::new())
    }

    fn record(
        clock: &VirtualClock,
        log: &Rc<RefCell<Vec<(Frame, &'static str)>>>,
        name: &'static str,
    ) -> impl FnOnce() + 'static {
        let clock = clock.clone();
        let log = Rc::clone(log);
        move || log.borrow_mut().push((clock.now(), name))
    }

    #[test]
    fn test_clock_starts_at_zero() {
        let clock = VirtualClock::new();
        assert_eq!(clock.now(), 0);
        assert_eq!(clock.pending(), 0);
        assert_eq!(clock.flush(), 0);
    }

    #[test]
    fn test_same_frame_runs_fifo() {
        let (log, clock) = recorder();
        clock.schedule_at(5, record(&clock, &log, "first")).unwrap();
        clock.schedule_at(5, record(&clock, &log, "second")).unwrap();
        clock.schedule_at(1, record(&clock, &log, "earliest")).unwrap();
        clock.schedule_at(5, record(&clock, &log, "third")).unwrap();

        assert_eq!(clock.flush(), 4);
        assert_eq!(
            *log.borrow(),
            vec![(1, "earliest"), (5, "first"), (5, "second"), (5, "third")]
        );
    }

    #[test]
    fn test_reentrant_same_frame_runs_before_advancing() {
        let (log, clock) = recorder();
        clock.schedule_at(3, record(&clock, &log, "later")).unwrap();

        let inner_clock = clock.clone();
        let inner_log = Rc::clone(&log);
        clock
            .schedule_at(2, move || {
                inner_log.borrow_mut().push((inner_clock.now(), "outer"));
                let nested = record(&inner_clock, &inner_log, "nested");
                inner_clock.schedule(0, nested);
            })
            .unwrap();

        clock.flush();
        assert_eq!(
            *log.borrow(),
            vec![(2, "outer"), (2, "nested"), (3, "later")]
        );
    }

    #[test]
    fn test_schedule_in_past_is_rejected() {
        let clock = VirtualClock::new();
        clock.advance_to(10);
        assert_eq!(
            clock.schedule_at(9, || {}),
            Err(ClockError::ScheduledInPast { frame: 9, now: 10 })
        );
        assert!(clock.schedule_at(10, || {}).is_ok());
    }

    #[test]
    fn test_advance_to_runs_only_due_actions() {
        let (log, clock) = recorder();
        clock.schedule_at(10, record(&clock, &log, "a")).unwrap();
        clock.schedule_at(30, record(&clock, &log, "b")).unwrap();

        assert_eq!(clock.advance_to(20), 1);
        assert_eq!(clock.now(), 20);
        assert_eq!(clock.pending(), 1);
        assert_eq!(*log.borrow(), vec![(10, "a")]);
    }

    #[test]
    fn test_frame_limit_leaves_late_actions_queued() {
        let clock = VirtualClock::with_frame_limit(100);
        let ran = Rc::new(RefCell::new(Vec::new()));
        for frame in [50, 100, 150] {
            let ran = Rc::clone(&ran);
            clock
                .schedule_at(frame, move || ran.borrow_mut().push(frame))
                .unwrap();
        }

        assert_eq!(clock.flush(), 2);
        assert_eq!(*ran.borrow(), vec![50, 100]);
        assert_eq!(clock.pending(), 1);
    }

    #[test]
    fn test_flush_until_stops_early() {
        let (log, clock) = recorder();
        clock.schedule_at(1, record(&clock, &log, "a")).unwrap();
        clock.schedule_at(2, record(&clock, &log, "b")).unwrap();
        clock.schedule_at(3, record(&clock, &log, "c")).unwrap();

        let seen = Rc::clone(&log);
        assert_eq!(clock.flush_until(move || seen.borrow().len() == 2), 2);
        assert_eq!(clock.now(), 2);
        assert_eq!(clock.pending(), 1);
    }

    #[test]
    fn test_clock_deterministic() {
        fn run() -> Vec<(Frame, &'static str)> {
            let (log, clock) = recorder();
            for (frame, name) in [(4, "d"), (2, "b"), (4, "e"), (0, "a"), (2, "c")] {
                clock.schedule_at(frame, record(&clock, &log, name)).unwrap();
            }
            clock.flush();
            let result = log.borrow().clone();
            result
        }

        assert_eq!(run(), run());
        assert_eq!(
            run(),
            vec![(0, "a"), (2, "b"), (2, "c"), (4, "d"), (4, "e")]
        );
    }
}
