//! Test that the same scenario produces identical results on every run.

use crate::harness::{RecordedOutput, TestContext};
use crate::operators::TimeInterval;
use crate::scenarios::helpers::*;
use crate::testing::DiagramGenerator;

fn run_scenario() -> Vec<RecordedOutput<TimeInterval<char>>> {
    let ctx = TestContext::new();
    let hot = ctx.hot("--a--^b-c-----d--e--|", None).unwrap();
    let cold = ctx.cold("-x-(yz)--#", None).unwrap();

    vec![
        run_time_interval(&ctx, &hot, Some("---------!")),
        run_time_interval(&ctx, &cold, None),
        run_time_interval(&ctx, &hot, None),
    ]
}

#[test]
fn test_deterministic_scenario() {
    let run1 = run_scenario();
    let run2 = run_scenario();

    assert_eq!(run1.len(), run2.len());
    for (i, (r1, r2)) in run1.iter().zip(run2.iter()).enumerate() {
        assert_eq!(r1, r2, "output mismatch at run {i}");
    }
}

#[test]
fn test_deterministic_generated_scenarios() {
    fn run(seed: u64) -> Vec<RecordedOutput<char>> {
        let mut generator = DiagramGenerator::new(seed);
        let ctx = TestContext::new();
        (0..20)
            .map(|_| {
                let source = ctx.cold(&generator.next_cold(), None).unwrap();
                run_identity(&ctx, &source, None)
            })
            .collect()
    }

    for seed in [1, 2, 3] {
        assert_eq!(run(seed), run(seed), "seed {seed} diverged");
    }
}

#[test]
fn test_contexts_are_independent() {
    let first = TestContext::new();
    let second = TestContext::new();
    let source = first.cold::<char>("-a|", None).unwrap();
    first.clock().advance_to(100);

    let other = second.cold("-a|", None).unwrap();
    let output = run_identity(&second, &other, None);

    assert_eq!(output.render(None), "-a|");
    assert!(source.subscriptions().windows().is_empty());
}
