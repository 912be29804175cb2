//! Valuation trainer
//!
//! Batch pipeline that turns historical race results and per-horse lifetime
//! summaries into three artifacts: a fitted prize regressor, the feature
//! configuration a scoring runtime needs to rebuild identical feature
//! vectors, and a training report.

mod aggregate;
mod cli;
mod config;
mod encoding;
mod error;
mod export;
mod features;
mod gbdt;
mod loader;
mod metrics;
mod pipeline;
mod trainer;
mod types;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;
use crate::config::{AppConfig, TrainParams};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "valuation_trainer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load()?;

    let races = cli
        .races
        .unwrap_or_else(|| PathBuf::from(&config.data.races_csv));
    let horses = cli
        .horses
        .unwrap_or_else(|| PathBuf::from(&config.data.horses_csv));
    let out_dir = cli
        .out_dir
        .unwrap_or_else(|| PathBuf::from(&config.output.dir));

    tracing::info!(
        races = %races.display(),
        horses = %horses.display(),
        out_dir = %out_dir.display(),
        "starting training run"
    );

    pipeline::run(&races, &horses, &out_dir, &TrainParams::default())
}
