use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use openmeteo_pollen::{
    AppConfig, Clock, PollCoordinator, PollenApiClient, PollenSensor, SystemClock,
};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "openmeteo-pollen")]
#[command(about = "Pollen forecast monitor for a fixed location")]
struct Args {
    /// Fetch once, print every sensor as JSON and exit
    #[arg(long)]
    once: bool,

    /// Load configuration from this file instead of the default locations
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = match &args.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
    .context("Failed to load configuration")?;

    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    rt.block_on(run(args, config))
}

/// `RUST_LOG` when set, otherwise INFO with debug output for this crate.
fn log_filter(env: Option<&str>) -> EnvFilter {
    let builder = EnvFilter::builder().with_default_directive(LevelFilter::INFO.into());
    match env {
        Some(directives) if !directives.trim().is_empty() => builder.parse_lossy(directives),
        _ => builder.parse_lossy("info,openmeteo_pollen=debug"),
    }
}

async fn run(args: Args, config: AppConfig) -> Result<()> {
    let thresholds = config.threshold_tables()?;
    let client = PollenApiClient::new(config.api.base_url.clone(), &config.location, &config.network)?;
    tracing::info!(
        "Monitoring pollen at {:.4}, {:.4} every {} minutes",
        config.location.latitude,
        config.location.longitude,
        config.refresh.update_interval_minutes
    );

    let coordinator = Arc::new(PollCoordinator::new(client, config.refresh.interval()));
    coordinator
        .first_refresh()
        .await
        .context("Initial pollen update failed")?;

    let entry_id = format!("{}_{}", config.location.latitude, config.location.longitude);
    let sensors = PollenSensor::all(&entry_id, &thresholds);
    let clock = SystemClock;

    if args.once {
        let snapshot = coordinator.snapshot()?;
        let states: Vec<_> = sensors
            .iter()
            .map(|sensor| sensor.state(&snapshot, clock.now_utc()))
            .collect();
        println!("{}", serde_json::to_string_pretty(&states)?);
        return Ok(());
    }

    let mut updates = coordinator.subscribe();
    let handle = Arc::clone(&coordinator).start();
    report(&coordinator, &sensors, &clock);

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                report(&coordinator, &sensors, &clock);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    handle.stop().await;
    Ok(())
}

/// Log one line per sensor for the current snapshot.
fn report(
    coordinator: &PollCoordinator<PollenApiClient>,
    sensors: &[PollenSensor],
    clock: &dyn Clock,
) {
    let state = coordinator.state();
    if let Some(err) = &state.last_error {
        tracing::warn!(
            "Showing stale data after {} failed update(s): {}",
            state.consecutive_failures,
            err
        );
    }
    let Some(snapshot) = state.snapshot else {
        tracing::warn!("No pollen data available yet");
        return;
    };

    let now = clock.now_utc();
    for sensor in sensors {
        let s = sensor.state(&snapshot, now);
        let value = s
            .native_value
            .map(|v| format!("{:.2}", v))
            .unwrap_or_else(|| "n/a".to_string());
        let risk = s.current_risk.map(|l| l.label()).unwrap_or("unknown");
        let trend = s
            .forecast
            .trend
            .map(|t| t.description())
            .unwrap_or("no forecast");
        tracing::info!(
            "{:<8} {:>8} {} | peak {:?} avg {:?} | {}",
            sensor.kind().display_name(),
            value,
            risk,
            s.forecast.peak,
            s.forecast.average,
            trend
        );
    }
}
