// Forbid unwrap() outside tests.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]

use marbles::clock::VirtualClock;
use marbles::config::HarnessConfig;
use marbles::harness::TestContext;
use marbles::operators::time_interval;
use marbles::source::SourceKind;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: marbles <diagram> [hot|cold]";

fn parse_args(args: &[String]) -> Option<(&str, SourceKind)> {
    let diagram = args.first()?.as_str();
    let kind = match args.get(1).map(String::as_str) {
        None | Some("cold") => SourceKind::Cold,
        Some("hot") => SourceKind::Hot,
        Some(_) => return None,
    };
    Some((diagram, kind))
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marbles=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment variables
    let config = match HarnessConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    tracing::info!(
        "Loaded configuration: frame_time_factor={}, max_frames={}",
        config.frame_time_factor,
        config.max_frames
    );

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((diagram, kind)) = parse_args(&args) else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    let ctx = TestContext::with_config(config);
    let source = match kind {
        SourceKind::Hot => ctx.hot::<char>(diagram, None),
        SourceKind::Cold => ctx.cold::<char>(diagram, None),
    };
    let source = source.unwrap_or_else(|e| {
        tracing::error!("Invalid diagram {diagram:?}: {e}");
        std::process::exit(1);
    });

    println!("input ({kind:?}):");
    for entry in source.timeline().entries() {
        println!("  {entry}");
    }

    let clock: VirtualClock = ctx.clock().clone();
    let output = ctx
        .run_pipeline(&source, |s| time_interval(s, clock), None)
        .unwrap_or_else(|e| {
            tracing::error!("Pipeline failed: {e}");
            std::process::exit(1);
        });

    println!("time_interval output:");
    for entry in output.timeline().entries() {
        println!("  {entry}");
    }
    let shape = marbles::diagram::render(output.timeline(), output.frame_time_factor(), |v| {
        v.value
    });
    println!("  diagram: {shape}");
    for window in output.subscriptions().render() {
        println!("subscription: {window}");
    }
}
