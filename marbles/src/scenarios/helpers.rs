//! Common helpers for scenarios.

use crate::diagram::{Frame, ValueMap};
use crate::harness::{RecordedOutput, TestContext};
use crate::operators::{TimeInterval, time_interval};
use crate::source::SimulatedSource;

/// Value map naming `TimeInterval<char>` results, from
/// `(marker, value, interval)` triples.
pub fn intervals(entries: &[(char, char, Frame)]) -> ValueMap<TimeInterval<char>> {
    entries
        .iter()
        .map(|&(marker, value, interval)| (marker, TimeInterval::new(value, interval)))
        .collect()
}

/// Run `source` through `time_interval` on the context's clock.
pub fn run_time_interval(
    ctx: &TestContext,
    source: &SimulatedSource<char>,
    unsubscribe: Option<&str>,
) -> RecordedOutput<TimeInterval<char>> {
    let clock = ctx.clock().clone();
    ctx.run_pipeline(source, |s| time_interval(s, clock), unsubscribe)
        .expect("pipeline should run")
}

/// Run `source` unchanged.
pub fn run_identity(
    ctx: &TestContext,
    source: &SimulatedSource<char>,
    unsubscribe: Option<&str>,
) -> RecordedOutput<char> {
    ctx.run_pipeline(source, |s| s, unsubscribe)
        .expect("pipeline should run")
}
