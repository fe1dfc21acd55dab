use std::io::Write;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use nh_cli::commands::util::{load_payload, parse_datetime};
use nh_cli::commands::{analyze, bouts, snapshot};
use nh_cli::{Cli, Commands, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so JSON output stays parseable.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    // The only place the clock is read.
    let now = Utc::now();
    let mut stdout = std::io::stdout().lock();

    match cli.command {
        Commands::Analyze {
            payload,
            skeletons,
            threshold,
            now: at,
            json,
        } => {
            let analysis = config.analysis_config(threshold)?;
            let at = at.map(|s| parse_datetime(&s, now)).transpose()?.unwrap_or(now);
            let payload = load_payload(&payload)?;
            analyze::run(&mut stdout, &payload, &skeletons, &analysis, at, json)?;
        }
        Commands::Bouts {
            payload,
            skeleton,
            reviews,
            categories,
            threshold,
            json,
        } => {
            let analysis = config.analysis_config(threshold)?;
            let categories = bouts::event_categories(&categories, reviews);
            let payload = load_payload(&payload)?;
            bouts::run(&mut stdout, &payload, skeleton, &categories, &analysis, json)?;
        }
        Commands::Snapshot {
            payload,
            skeleton,
            at,
            json,
        } => {
            let analysis = config.analysis_config(None)?;
            let at = at.map(|s| parse_datetime(&s, now)).transpose()?.unwrap_or(now);
            let payload = load_payload(&payload)?;
            snapshot::run(&mut stdout, &payload, skeleton, &analysis, at, json)?;
        }
    }

    stdout.flush()?;
    Ok(())
}
