//! Command-line surface for the training pipeline.
//!
//! The trainer runs end to end with no arguments; the flags only override
//! the configured input and output locations.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "valuation-trainer")]
#[command(
    version,
    about = "Train the lifetime-prize valuation model and export its artifacts",
    long_about = None
)]
pub struct Cli {
    /// Race results CSV (overrides configuration)
    #[arg(long, value_name = "FILE")]
    pub races: Option<PathBuf>,

    /// Horse summaries CSV (overrides configuration)
    #[arg(long, value_name = "FILE")]
    pub horses: Option<PathBuf>,

    /// Artifact output directory (overrides configuration)
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,
}
