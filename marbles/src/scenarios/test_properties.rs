//! Properties checked over generated diagrams.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::clock::TimeSource;
use crate::diagram::{DiagramParser, TimelineEntry, parse, render_diagram};
use crate::harness::TestContext;
use crate::scenarios::helpers::*;
use crate::testing::DiagramGenerator;

const CASES: usize = 200;

#[test]
fn test_render_inverts_parse() {
    let mut generator = DiagramGenerator::new(0x5eed);
    for _ in 0..CASES {
        for diagram in [generator.next_cold(), generator.next_hot()] {
            let parsed = parse::<char>(&diagram, None).unwrap();
            assert_eq!(render_diagram(&parsed, 1, |c| *c), diagram);
        }
    }
}

#[test]
fn test_render_inverts_parse_with_factor() {
    let parser = DiagramParser::new(10);
    let mut generator = DiagramGenerator::new(99);
    for _ in 0..CASES {
        let diagram = generator.next_hot();
        let parsed = parser.parse::<char>(&diagram, None, None).unwrap();
        assert_eq!(render_diagram(&parsed, 10, |c| *c), diagram);
    }
}

#[test]
fn test_cold_never_emits_before_subscription() {
    let mut generator = DiagramGenerator::new(11);
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..CASES {
        let diagram = generator.next_cold();
        let ctx = TestContext::new();
        let source = ctx.cold(&diagram, None).unwrap();
        let subscribed_at = rng.random_range(0..50) * 10;
        ctx.clock().advance_to(subscribed_at);

        let output = run_identity(&ctx, &source, None);

        // Same timeline, shifted by the subscription frame.
        let shifted: Vec<_> = source
            .timeline()
            .entries()
            .iter()
            .map(|entry| TimelineEntry {
                frame: entry.frame + subscribed_at,
                notification: entry.notification.clone(),
            })
            .collect();
        assert_eq!(output.timeline().entries(), shifted.as_slice(), "{diagram}");
        assert!(
            output
                .timeline()
                .entries()
                .iter()
                .all(|entry| entry.frame >= subscribed_at)
        );
    }
}

#[test]
fn test_hot_late_subscriber_sees_only_later_events_in_order() {
    let mut generator = DiagramGenerator::new(23);
    let mut rng = StdRng::seed_from_u64(23);
    for _ in 0..CASES {
        let diagram = generator.next_hot();
        let ctx = TestContext::new();
        let source = ctx.hot(&diagram, None).unwrap();
        let subscribed_at = rng.random_range(0..30) * 10;
        ctx.clock().advance_to(subscribed_at);
        assert_eq!(ctx.clock().now(), subscribed_at);

        let output = run_identity(&ctx, &source, None);

        // Everything at or before the subscription frame has already fired.
        let expected: Vec<_> = source
            .timeline()
            .entries()
            .iter()
            .filter(|entry| entry.frame > subscribed_at)
            .cloned()
            .collect();
        assert_eq!(output.timeline().entries(), expected.as_slice(), "{diagram}");
    }
}

#[test]
fn test_every_run_records_exactly_one_window() {
    let mut generator = DiagramGenerator::new(5);
    for _ in 0..CASES {
        let diagram = generator.next_cold();
        let ctx = TestContext::new();
        let source = ctx.cold(&diagram, None).unwrap();
        let output = run_identity(&ctx, &source, None);

        let windows = output.subscriptions().windows();
        assert_eq!(windows.len(), 1);
        match output.timeline().terminal() {
            Some(terminal) => assert_eq!(windows[0].end, Some(terminal.frame)),
            None => assert!(windows[0].is_open()),
        }
    }
}
