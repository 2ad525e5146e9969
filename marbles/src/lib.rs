// Life of a marble test:
// 1. Diagrams come in as strings
// 2. Parse into typed timelines (markers resolved through a value map)
// 3. Build hot/cold sources that replay the timeline on a virtual clock
// 4. Wire the source through the operator under test
// 5. Flush the clock, recording every output notification with its frame
// 6. Compare the recording and the source's subscription windows against
//    expected diagrams
//
// System components:
//  - Diagram parser/renderer
//  - Virtual clock (single-threaded action queue)
//  - Observable contract with polled cancellation
//  - Simulated sources + subscription tracking
//  - Pipeline harness + assertion engine

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod assertion;
pub mod clock;
pub mod config;
pub mod diagram;
pub mod harness;
pub mod observable;
pub mod operators;
pub mod source;
pub mod subscription;
pub mod testing;

mod scenarios;

pub use assertion::{AssertionError, assert_subscriptions, assert_timeline};
pub use clock::{TimeSource, VirtualClock};
pub use diagram::{Frame, Notification, SimulatedError, Timeline, ValueMap, parse};
pub use harness::{RecordedOutput, TestContext};
pub use source::{SimulatedSource, cold_source, hot_source};
