//! Command-line surface of the `zone-charts` binary.

use std::process::ExitCode;

use anyhow::Context;
use tracing::info;
use zone_store::{
    Connect,
    config::{AppConfig, load_config_path, normalize_config},
    market::PgConnector,
};

use crate::{generator::ChartGenerator, publish};

mod commands;

pub use commands::Cli;

/// Built-in defaults, or the file named by `--config`.
pub fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    match &cli.config {
        Some(path) => load_config_path(path),
        None => {
            let mut cfg = AppConfig::default();
            normalize_config(&mut cfg).context("invalid built-in configuration")?;
            Ok(cfg)
        }
    }
}

/// Build the Postgres-backed generator and run the requested command.
pub fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let cfg = load_config(cli)?;
    let connector = PgConnector::from_env(&cfg, cli.family())?;
    let publisher = publish::from_config(&cfg.publish, cli.skip_upload)
        .context("cannot set up chart publishing")?;
    let generator = ChartGenerator::new(&cfg, connector, publisher)?;
    let days = cli.days.unwrap_or(cfg.chart.dashboard_lookback_days);
    execute(&generator, cli, days)
}

/// Run the dashboard command against any session source.
///
/// Prints `SUCCESS: <location>` per produced dashboard. A single-symbol run that
/// produces nothing prints `FAIL: ...` and exits with 1; a batch run exits with 0
/// and reports its counts on stderr.
pub fn execute<C: Connect>(
    generator: &ChartGenerator<'_, C>,
    cli: &Cli,
    lookback_days: u32,
) -> anyhow::Result<ExitCode> {
    if cli.all_stocks {
        let report = generator
            .dashboards_for_all(lookback_days)
            .context("cannot list symbols")?;
        for (symbol, location) in &report.published {
            println!("SUCCESS: {symbol} {location}");
        }
        for symbol in &report.skipped {
            eprintln!("FAIL: {symbol}");
        }
        eprintln!(
            "SUMMARY: {} succeeded, {} failed",
            report.published.len(),
            report.skipped.len()
        );
        return Ok(ExitCode::SUCCESS);
    }

    let Some(symbol) = cli.symbol.as_deref() else {
        anyhow::bail!("a symbol or --all-stocks is required");
    };
    info!(symbol, lookback_days, family = ?cli.family(), "generating dashboard");
    match generator.dashboard(symbol, lookback_days) {
        Ok(Some(output)) => {
            println!("SUCCESS: {}", output.html);
            Ok(ExitCode::SUCCESS)
        }
        Ok(None) => {
            println!("FAIL: no dashboard produced for {symbol}");
            Ok(ExitCode::from(1))
        }
        Err(error) => {
            println!("FAIL: {symbol}: {error}");
            Ok(ExitCode::from(1))
        }
    }
}
