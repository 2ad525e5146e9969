//! Early teardown through the unsubscription diagram.

use crate::assertion::{assert_subscriptions, assert_timeline};
use crate::clock::{ClockError, TimeSource};
use crate::harness::{HarnessError, TestContext};
use crate::operators::take;
use crate::scenarios::helpers::*;

#[test]
fn test_unsubscribe_closes_upstream_window_at_frame() {
    let ctx = TestContext::new();
    let source = ctx.cold("a-b-c-d-e|", None).unwrap();
    let output = run_identity(&ctx, &source, Some("----!"));

    assert_timeline(&output, "a-b", None, None).unwrap();
    assert_subscriptions(output.subscriptions(), &["^---!"]).unwrap();
    assert!(output.timeline().entries().iter().all(|e| e.frame <= 40));
    assert_eq!(source.active_subscriptions(), 0);
}

#[test]
fn test_unsubscribe_propagates_through_operators() {
    let ctx = TestContext::new();
    let source = ctx.hot("^-a--b--c--|", None).unwrap();
    let output = run_time_interval(&ctx, &source, Some("------!"));

    let values = intervals(&[('x', 'a', 20), ('y', 'b', 30)]);
    assert_timeline(&output, "--x--y", Some(&values), None).unwrap();
    assert_subscriptions(output.subscriptions(), &["^-----!"]).unwrap();
}

#[test]
fn test_unsubscribe_at_subscription_frame_is_zero_length() {
    let ctx = TestContext::new();
    let source = ctx.cold("a|", None).unwrap();
    let output = run_identity(&ctx, &source, Some("!"));

    assert!(output.timeline().is_empty());
    assert_subscriptions(output.subscriptions(), &["(^!)"]).unwrap();
}

#[test]
fn test_unsubscribe_after_completion_is_harmless() {
    let ctx = TestContext::new();
    let source = ctx.cold("-a|", None).unwrap();
    let output = run_identity(&ctx, &source, Some("-----!"));

    assert_timeline(&output, "-a|", None, None).unwrap();
    assert_subscriptions(output.subscriptions(), &["^-!"]).unwrap();

    // The stale unsubscription still fires later without touching anything.
    ctx.clock().flush();
    assert_eq!(ctx.clock().now(), 50);
    assert_subscriptions(&source.subscriptions(), &["^-!"]).unwrap();
}

#[test]
fn test_operator_completion_unsubscribes_upstream() {
    let ctx = TestContext::new();
    let source = ctx.hot::<char>("^-a-b-c-d|", None).unwrap();
    let output = ctx.run_pipeline(&source, |s| take(s, 2), None).unwrap();

    assert_timeline(&output, "--a-(b|)", None, None).unwrap();
    assert_subscriptions(output.subscriptions(), &["^---!"]).unwrap();
}

#[test]
fn test_grouped_unsubscription_marker() {
    let ctx = TestContext::new();
    let source = ctx.cold("a-b-c|", None).unwrap();
    let output = run_identity(&ctx, &source, Some("--(!)"));

    assert_timeline(&output, "a", None, None).unwrap();
    assert_subscriptions(output.subscriptions(), &["^-!"]).unwrap();
}

#[test]
fn test_unsubscription_diagram_without_marker_is_rejected() {
    let ctx = TestContext::new();
    let source = ctx.cold::<char>("a|", None).unwrap();
    assert_eq!(
        ctx.run_pipeline(&source, |s| s, Some("^---")).unwrap_err(),
        HarnessError::MissingUnsubscription
    );
}

#[test]
fn test_delayed_subscription_replays_cold_from_caret() {
    let ctx = TestContext::new();
    let source = ctx.cold("-a-b-c|", None).unwrap();
    let output = run_identity(&ctx, &source, Some("--^--!"));

    assert_timeline(&output, "---a", None, None).unwrap();
    assert_subscriptions(output.subscriptions(), &["--^--!"]).unwrap();
    assert_eq!(output.timeline().entries()[0].frame, 30);
}

#[test]
fn test_delayed_subscription_misses_hot_events_up_to_caret() {
    let ctx = TestContext::new();
    let source = ctx.hot("-a-b-c-d|", None).unwrap();
    let output = run_identity(&ctx, &source, Some("--^---!"));

    assert_timeline(&output, "---b-c", None, None).unwrap();
    assert_subscriptions(output.subscriptions(), &["--^---!"]).unwrap();

    // The hot event sharing the caret's frame fired before the subscription.
    let ctx = TestContext::new();
    let source = ctx.hot("--a-b|", None).unwrap();
    let output = run_identity(&ctx, &source, Some("--^-!"));
    assert_timeline(&output, "----b", None, None).unwrap();
}

#[test]
fn test_delayed_subscription_measures_intervals_from_caret() {
    let ctx = TestContext::new();
    let source = ctx.hot("-a--b--c|", None).unwrap();
    let output = run_time_interval(&ctx, &source, Some("--^-------!"));

    let values = intervals(&[('y', 'b', 20), ('z', 'c', 30)]);
    assert_timeline(&output, "----y--z|", Some(&values), None).unwrap();
    assert_subscriptions(output.subscriptions(), &["--^-----!"]).unwrap();
}

#[test]
fn test_unsubscribe_before_caret_is_rejected() {
    let ctx = TestContext::new();
    let source = ctx.cold::<char>("-a|", None).unwrap();

    assert_eq!(
        ctx.run_pipeline(&source, |s| s, Some("--!-^")).unwrap_err(),
        HarnessError::UnsubscribeBeforeSubscribe {
            subscribed_at: 40,
            unsubscribed_at: 20,
        }
    );
    assert_eq!(ctx.clock().now(), 0);
    assert!(source.subscriptions().windows().is_empty());
}

#[test]
fn test_caret_in_the_past_is_rejected() {
    let ctx = TestContext::new();
    let source = ctx.cold::<char>("-a|", None).unwrap();
    ctx.clock().advance_to(50);

    let err = ctx.run_pipeline(&source, |s| s, Some("--^-----!")).unwrap_err();
    assert!(matches!(
        err,
        HarnessError::Clock(ClockError::ScheduledInPast { frame: 20, now: 50 })
    ));
    assert!(source.subscriptions().windows().is_empty());
}
