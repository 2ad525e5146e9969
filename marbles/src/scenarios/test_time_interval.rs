//! `time_interval` against hot, cold, and synchronous sources.

use std::cell::RefCell;
use std::rc::Rc;

use crate::assertion::{assert_subscriptions, assert_timeline};
use crate::harness::TestContext;
use crate::observable::create;
use crate::operators::{TimeInterval, take, time_interval};
use crate::scenarios::helpers::*;

#[test]
fn test_records_intervals_between_values() {
    let ctx = TestContext::new();
    let source = ctx.hot("--a--^b-c-----d--e--|", None).unwrap();
    let subs = "^              !";
    let expected = "-w-x-----y--z--|";
    let values = intervals(&[('w', 'b', 10), ('x', 'c', 20), ('y', 'd', 60), ('z', 'e', 30)]);

    let output = run_time_interval(&ctx, &source, None);

    assert_timeline(&output, expected, Some(&values), None).unwrap();
    assert_subscriptions(output.subscriptions(), &[subs]).unwrap();
}

#[test]
fn test_first_interval_is_measured_from_subscription_not_zero() {
    let ctx = TestContext::new();
    let source = ctx.hot("--a--^b-c-----d--e--|", None).unwrap();
    let output = run_time_interval(&ctx, &source, None);

    let measured: Vec<_> = output
        .timeline()
        .values()
        .map(|v| (v.value, v.interval))
        .collect();
    assert_eq!(measured, vec![('b', 10), ('c', 20), ('d', 60), ('e', 30)]);
}

#[test]
fn test_propagates_empty_stream() {
    let ctx = TestContext::new();
    let source = ctx.hot("---------|", None).unwrap();
    let output = run_time_interval(&ctx, &source, None);

    assert_timeline(&output, "---------|", Some(&intervals(&[])), None).unwrap();
    assert_subscriptions(output.subscriptions(), &["^        !"]).unwrap();
}

#[test]
fn test_propagates_immediate_completion() {
    let ctx = TestContext::new();
    let source = ctx.cold("|", None).unwrap();
    let output = run_time_interval(&ctx, &source, None);

    assert_timeline(&output, "|", None, None).unwrap();
    assert_subscriptions(output.subscriptions(), &["(^!)"]).unwrap();
    let complete = output.timeline().terminal().unwrap();
    assert_eq!(complete.frame, 0);
}

#[test]
fn test_never_completing_source_leaves_window_open() {
    let ctx = TestContext::new();
    let source = ctx.hot("-a--b--", None).unwrap();
    let output = run_time_interval(&ctx, &source, None);

    let values = intervals(&[('y', 'a', 10), ('z', 'b', 30)]);
    assert_timeline(&output, "-y--z--", Some(&values), None).unwrap();
    assert_subscriptions(output.subscriptions(), &["^      "]).unwrap();
    assert!(!output.timeline().is_terminated());
}

#[test]
fn test_unsubscribe_stops_measuring() {
    let ctx = TestContext::new();
    let source = ctx.hot("-a--b-----c---d---|", None).unwrap();
    let output = run_time_interval(&ctx, &source, Some("       !"));

    let values = intervals(&[('y', 'a', 10), ('z', 'b', 30)]);
    assert_timeline(&output, "-y--z--", Some(&values), None).unwrap();
    assert_subscriptions(output.subscriptions(), &["^      !"]).unwrap();
}

#[test]
fn test_propagates_never() {
    let ctx = TestContext::new();
    let source = ctx.cold("-", None).unwrap();
    let output = run_time_interval(&ctx, &source, None);

    assert_timeline(&output, "-", None, None).unwrap();
    assert!(output.timeline().is_empty());
    assert_subscriptions(output.subscriptions(), &["^"]).unwrap();
}

#[test]
fn test_propagates_error() {
    let ctx = TestContext::new();
    let source = ctx.cold("---#", None).unwrap();
    let output = run_time_interval(&ctx, &source, None);

    assert_timeline(&output, "---#", None, None).unwrap();
    assert_subscriptions(output.subscriptions(), &["^  !"]).unwrap();
}

#[test]
fn test_records_intervals_then_error() {
    let ctx = TestContext::new();
    let source = ctx.hot("-a--b--#", None).unwrap();
    let output = run_time_interval(&ctx, &source, None);

    let values = intervals(&[('y', 'a', 10), ('z', 'b', 30)]);
    assert_timeline(&output, "-y--z--#", Some(&values), None).unwrap();
    assert_subscriptions(output.subscriptions(), &["^      !"]).unwrap();
}

#[test]
fn test_error_before_any_value() {
    let ctx = TestContext::new();
    let source = ctx.cold("#", None).unwrap();
    let output = run_time_interval(&ctx, &source, None);

    assert_timeline(&output, "#", None, None).unwrap();
    assert_subscriptions(output.subscriptions(), &["(^!)"]).unwrap();
    assert_eq!(output.timeline().values().count(), 0);
}

#[test]
fn test_stops_synchronous_source_mid_burst() {
    let ctx = TestContext::new();
    let side_effects = Rc::new(RefCell::new(Vec::new()));
    let effects = Rc::clone(&side_effects);
    let source = create(move |subscriber| {
        for i in 0..10u32 {
            if subscriber.is_closed() {
                return;
            }
            effects.borrow_mut().push(i);
            subscriber.next(i);
        }
        subscriber.complete();
    });

    let clock = ctx.clock().clone();
    let output = ctx
        .run_observable(&*take(time_interval(source, clock), 3), None)
        .unwrap();

    assert_eq!(*side_effects.borrow(), vec![0, 1, 2]);
    let values = (0..3)
        .map(|i| (char::from(b'a' + i), TimeInterval::new(u32::from(i), 0)))
        .collect();
    assert_timeline(&output, "(abc|)", Some(&values), None).unwrap();
}
