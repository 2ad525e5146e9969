//! Hot and cold sources observed through the harness.

use crate::assertion::{assert_subscriptions, assert_timeline};
use crate::clock::TimeSource;
use crate::diagram::ValueMap;
use crate::harness::TestContext;
use crate::scenarios::helpers::*;
use crate::source::SourceKind;

#[test]
fn test_cold_replays_from_subscription_frame() {
    let ctx = TestContext::new();
    let source = ctx.cold("-a|", None).unwrap();
    ctx.clock().advance_to(30);

    let output = run_identity(&ctx, &source, None);

    assert_timeline(&output, "----a|", None, None).unwrap();
    assert_subscriptions(output.subscriptions(), &["---^-!"]).unwrap();
}

#[test]
fn test_cold_resubscription_replays_from_start() {
    let ctx = TestContext::new();
    let source = ctx.cold("-a|", None).unwrap();

    let first = run_identity(&ctx, &source, None);
    let second = run_identity(&ctx, &source, None);

    assert_timeline(&first, "-a|", None, None).unwrap();
    assert_timeline(&second, "---a|", None, None).unwrap();
    assert_subscriptions(second.subscriptions(), &["^-!", "--^-!"]).unwrap();
}

#[test]
fn test_hot_history_is_never_observed() {
    let ctx = TestContext::new();
    let source = ctx.hot("ab^c|", None).unwrap();
    assert_eq!(source.kind(), SourceKind::Hot);
    assert_eq!(source.history_frames(), 20);

    let output = run_identity(&ctx, &source, None);

    assert_timeline(&output, "-c|", None, None).unwrap();
}

#[test]
fn test_hot_late_subscriber_sees_only_later_events() {
    let ctx = TestContext::new();
    let source = ctx.hot("^-a-b-c|", None).unwrap();
    ctx.clock().advance_to(30);

    let output = run_identity(&ctx, &source, None);

    assert_timeline(&output, "----b-c|", None, None).unwrap();
    assert_subscriptions(output.subscriptions(), &["---^---!"]).unwrap();
}

#[test]
fn test_hot_sequential_consumers_share_absolute_frames() {
    let ctx = TestContext::new();
    let source = ctx.hot("^-a-b-c|", None).unwrap();

    let first = run_identity(&ctx, &source, Some("---!"));
    assert_eq!(ctx.clock().now(), 30);
    let second = run_identity(&ctx, &source, None);

    assert_timeline(&first, "--a", None, None).unwrap();
    assert_timeline(&second, "----b-c|", None, None).unwrap();
    assert_subscriptions(second.subscriptions(), &["^--!", "---^---!"]).unwrap();
}

#[test]
fn test_hot_grouped_subscription_point() {
    let ctx = TestContext::new();
    let source = ctx.hot("-a-(^b)-c|", None).unwrap();
    let output = run_identity(&ctx, &source, None);

    // `b` shares the subscription frame and is delivered at frame 0.
    assert_timeline(&output, "b----c|", None, None).unwrap();
}

#[test]
fn test_values_resolved_from_map() {
    let ctx = TestContext::new();
    let values = ValueMap::new()
        .with('a', "alpha".to_string())
        .with('b', "beta".to_string());
    let source = ctx.cold("-a-b|", Some(&values)).unwrap();
    let output = ctx.run_pipeline(&source, |s| s, None).unwrap();

    let seen: Vec<_> = output.timeline().values().cloned().collect();
    assert_eq!(seen, vec!["alpha".to_string(), "beta".to_string()]);
    assert_timeline(&output, "-a-b|", Some(&values), None).unwrap();
}

#[test]
fn test_cold_rejects_subscription_marker() {
    let ctx = TestContext::new();
    assert!(ctx.cold::<char>("-^-a|", None).is_err());
}
