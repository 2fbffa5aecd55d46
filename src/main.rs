//! farmstead - real-time crop growth for voxel worlds
//!
//! Headless driver that plants a demo field and runs the growth tick loop.

mod config;
mod driver;

use anyhow::Result;
use config::{FarmConfig, DEFAULT_CONFIG_PATH};
use driver::RunOptions;
use farmstead_world::CropRegistry;
use std::{env, path::PathBuf};
use tracing::info;

const DEFAULT_TICKS: u64 = 200;

fn main() -> Result<()> {
    // Initialize tracing with WARN level by default (can be overridden via RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    info!("Starting farmstead v{}", env!("CARGO_PKG_VERSION"));

    let cli = CliOptions::parse(env::args().skip(1));
    let mut registry = CropRegistry::standard();
    let config = FarmConfig::load_or_create(&cli.config, &registry)?;
    config.apply(&mut registry);

    let summary = driver::run(&config, registry, &cli.run_options())?;
    info!(
        ticks = summary.ticks,
        planted = summary.planted,
        rescheduled = summary.rescheduled,
        finished = summary.finished,
        unloaded = summary.chunks_unloaded,
        remaining = summary.remaining,
        "run complete"
    );
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
struct CliOptions {
    config: PathBuf,
    ticks: u64,
    simulate: bool,
    events: Option<PathBuf>,
}

impl CliOptions {
    fn parse<I: Iterator<Item = String>>(mut args: I) -> Self {
        let mut opts = CliOptions {
            config: PathBuf::from(DEFAULT_CONFIG_PATH),
            ticks: DEFAULT_TICKS,
            simulate: false,
            events: None,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    if let Some(path) = args.next() {
                        opts.config = PathBuf::from(path);
                    } else {
                        tracing::error!("--config requires a file path");
                    }
                }
                "--ticks" => {
                    if let Some(raw) = args.next() {
                        match raw.parse::<u64>() {
                            Ok(value) => opts.ticks = value,
                            Err(err) => {
                                tracing::error!(%err, value = %raw, "--ticks must be an integer");
                            }
                        }
                    } else {
                        tracing::error!("--ticks requires an integer");
                    }
                }
                "--simulate" => opts.simulate = true,
                "--events" => {
                    if let Some(path) = args.next() {
                        opts.events = Some(PathBuf::from(path));
                    } else {
                        tracing::error!("--events requires a file path");
                    }
                }
                other => tracing::warn!(arg = other, "ignoring unknown argument"),
            }
        }
        opts
    }

    fn run_options(&self) -> RunOptions {
        RunOptions {
            ticks: self.ticks,
            simulate: self.simulate,
            events: self.events.clone(),
        }
    }
}
