//! Sluice scenario simulator.
//!
//! Replays a JSON scenario against a single gauge backed by an in-memory
//! escrow, boost ledger, token ledger and weight schedule, then prints a
//! JSON report of final balances, ledger state and emitted events.

mod scenario;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use sluice_core::config::SluiceConfig;
use tracing::info;

use crate::scenario::{Scenario, Simulation};

/// Sluice simulator: boost-weighted liquidity rewards, replayed step by step.
#[derive(Parser, Debug)]
#[command(
    name = "sluice-sim",
    version,
    about = "Replay a Sluice scenario and print the resulting state"
)]
struct Args {
    /// Scenario file (JSON)
    scenario: PathBuf,

    /// Engine config file (TOML, JSON or YAML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format ("text" or "json"); overrides the config file
    #[arg(long)]
    log_format: Option<String>,

    /// Stop at the first rejected step
    #[arg(long)]
    fail_fast: bool,

    /// Print the report without indentation
    #[arg(long)]
    compact: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = SluiceConfig::load(args.config.as_deref()).context("failed to load config")?;

    let level = args.log_level.as_deref().unwrap_or(&config.log_level);
    let format = args.log_format.as_deref().unwrap_or(&config.log_format);
    init_logging(level, format);

    info!("Sluice simulator v{}", env!("CARGO_PKG_VERSION"));
    info!(scenario = %args.scenario.display(), "sim: loading scenario");

    let raw = std::fs::read_to_string(&args.scenario)
        .with_context(|| format!("failed to read {}", args.scenario.display()))?;
    let scenario: Scenario = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", args.scenario.display()))?;

    let mut sim = Simulation::new(&config, &scenario)?;
    let outcomes = sim.run(&scenario.steps, args.fail_fast)?;
    let rejected = outcomes.iter().filter(|o| o.error.is_some()).count();
    info!(steps = outcomes.len(), rejected, "sim: scenario complete");

    let report = sim.report(outcomes);
    let json = if args.compact {
        serde_json::to_string(&report)
    } else {
        serde_json::to_string_pretty(&report)
    }
    .context("failed to serialize report")?;
    println!("{json}");
    Ok(())
}

/// Initialize tracing with the given level and format on stderr.
///
/// `format = "json"` selects structured output; anything else is text.
/// `RUST_LOG` takes precedence over `level_str` when set.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_level(true),
            )
            .init();
    }
}
