use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;
use tracing::info;

use crate::config::Config;
use crate::services::simulation_cycle::{SimulationCycle, TickReport};
use crate::services::weather_service::WeatherObserver;
use crate::store::open_store;

/// Runs one simulation tick for the configured site and appends its snapshot.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    /// JSON configuration file; SOLAR_SIM__* environment variables override it
    #[arg(long, default_value = "config.json")]
    pub config: PathBuf,

    /// Compute and print the snapshot without persisting it
    #[arg(long)]
    pub dry_run: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

/// One invocation: load config, build collaborators, run a tick at `now`.
/// A dry run writes the snapshot to `out` instead of the store.
pub async fn run(cli: &Cli, now: DateTime<Utc>, out: &mut dyn Write) -> anyhow::Result<TickReport> {
    // 1. Load configuration
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    info!(city = %config.site.city, timezone = %config.site.timezone, "configuration loaded");

    // 2. Build collaborators and the cycle
    let weather = WeatherObserver::new(&config.weather, &config.site).context("building weather client")?;
    let store = open_store(&config.store).context("opening snapshot store")?;
    let cycle = SimulationCycle::new(&config, weather, store)?;

    // 3. One tick
    let report = if cli.dry_run {
        cycle.simulate(now).await
    } else {
        cycle.tick(now).await?
    };

    if !report.soft_failures.is_empty() {
        info!(count = report.soft_failures.len(), "tick completed with fallbacks");
    }
    if cli.dry_run {
        writeln!(out, "{}", serde_json::to_string_pretty(&report.snapshot)?)?;
    }
    Ok(report)
}
