//! Failure reports for mismatching expectations.

use crate::assertion::{AssertionError, assert_subscriptions, assert_timeline};
use crate::diagram::{ParseError, SimulatedError};
use crate::harness::TestContext;
use crate::scenarios::helpers::*;

fn expect_mismatch(result: Result<(), AssertionError>) -> crate::assertion::Mismatch {
    match result {
        Err(AssertionError::Mismatch(mismatch)) => *mismatch,
        other => panic!("expected a mismatch, got {other:?}"),
    }
}

#[test]
fn test_interval_values_compared_field_by_field() {
    let ctx = TestContext::new();
    let source = ctx.hot("^a--b|", None).unwrap();
    let output = run_time_interval(&ctx, &source, None);

    let right = intervals(&[('x', 'a', 10), ('y', 'b', 30)]);
    assert_timeline(&output, "-x--y|", Some(&right), None).unwrap();

    let wrong = intervals(&[('x', 'a', 10), ('y', 'b', 20)]);
    let mismatch = expect_mismatch(assert_timeline(&output, "-x--y|", Some(&wrong), None));
    assert_eq!(mismatch.frame, 40);
    assert_eq!(
        mismatch.expected.as_deref(),
        Some("next(TimeInterval { value: 'b', interval: 20 }) @ 40")
    );
    assert_eq!(
        mismatch.actual.as_deref(),
        Some("next(TimeInterval { value: 'b', interval: 30 }) @ 40")
    );
    // The recorded value has no marker in the map.
    assert_eq!(mismatch.expected_diagram, "-x--y|");
    assert_eq!(mismatch.actual_diagram, "-x--?|");
    assert_eq!(mismatch.column, 4);
}

#[test]
fn test_unexpected_extra_event() {
    let ctx = TestContext::new();
    let source = ctx.cold("-a-b|", None).unwrap();
    let output = run_identity(&ctx, &source, None);

    let mismatch = expect_mismatch(assert_timeline(&output, "-a|", None, None));
    assert_eq!(mismatch.frame, 20);
    assert_eq!(mismatch.expected.as_deref(), Some("complete @ 20"));
    assert_eq!(mismatch.actual.as_deref(), Some("next('b') @ 30"));
}

#[test]
fn test_error_message_in_report() {
    let ctx = TestContext::new();
    let source = ctx
        .cold_with_error("-#", None, Some(&SimulatedError::new("timeout")))
        .unwrap();
    let output = run_identity(&ctx, &source, None);

    let mismatch = expect_mismatch(assert_timeline(&output, "-#", None, None));
    assert_eq!(mismatch.expected.as_deref(), Some("error(error) @ 10"));
    assert_eq!(mismatch.actual.as_deref(), Some("error(timeout) @ 10"));
    // Both render as `#`, so the caret falls back to the frame's column.
    assert_eq!(mismatch.column, 1);
}

#[test]
fn test_report_renders_caret_under_divergence() {
    let ctx = TestContext::new();
    let source = ctx.cold("--a--b|", None).unwrap();
    let output = run_identity(&ctx, &source, None);

    let error = assert_timeline(&output, "--a-b|", None, None).unwrap_err();
    let report = error.to_string();
    let lines: Vec<_> = report.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[1], "expected: --a-b|");
    assert_eq!(lines[2], "actual:   --a--b|");
    assert_eq!(lines[3], format!("{}^", " ".repeat(14)));
}

#[test]
fn test_subscription_report() {
    let ctx = TestContext::new();
    let source = ctx.hot("^-a-|", None).unwrap();
    let output = run_identity(&ctx, &source, None);

    let mismatch = expect_mismatch(assert_subscriptions(output.subscriptions(), &["^-!"]));
    assert_eq!(mismatch.expected_diagram, "^-!");
    assert_eq!(mismatch.actual_diagram, "^---!");
    assert_eq!(mismatch.actual.as_deref(), Some("window 0 to 40"));
}

#[test]
fn test_malformed_expectations() {
    let ctx = TestContext::new();
    let source = ctx.cold("a|", None).unwrap();
    let output = run_identity(&ctx, &source, None);

    assert_eq!(
        assert_timeline(&output, "a||", None, None),
        Err(AssertionError::Parse(ParseError::MultipleTerminals { column: 2 }))
    );
    assert_eq!(
        assert_subscriptions(output.subscriptions(), &["^-x"]),
        Err(AssertionError::Parse(
            ParseError::UnexpectedSubscriptionCharacter {
                character: 'x',
                column: 2,
            }
        ))
    );
}
