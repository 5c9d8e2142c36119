// SPDX-License-Identifier: MIT OR Apache-2.0
//! Command-line arguments.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Snapshot output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Pretty RON
    #[default]
    Ron,
    /// Pretty JSON
    Json,
}

/// Evaluate a Patchflow graph document
#[derive(Debug, Parser)]
#[command(name = "patchflow")]
#[command(about = "Run a Patchflow node graph", long_about = None)]
#[command(version)]
pub struct Args {
    /// Graph document (.ron or .json)
    pub document: PathBuf,

    /// Engine configuration file (RON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of ticks to run; 0 runs until interrupted
    #[arg(short, long, default_value_t = 1)]
    pub ticks: u64,

    /// Tick rate in frames per second; 0 runs ticks back to back
    #[arg(long, default_value_t = 60.0)]
    pub fps: f64,

    /// Reload the document between ticks when it changes on disk
    #[arg(short, long)]
    pub watch: bool,

    /// Print the value snapshot after every tick, not only the last
    #[arg(long)]
    pub each: bool,

    /// Snapshot output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Ron)]
    pub format: OutputFormat,

    /// Directory media handles are resolved against; defaults to the
    /// document's directory
    #[arg(long)]
    pub media_root: Option<PathBuf>,
}

impl Args {
    /// Pause between ticks, if any
    pub fn frame_duration(&self) -> Option<std::time::Duration> {
        (self.fps > 0.0 && self.fps.is_finite())
            .then(|| std::time::Duration::from_secs_f64(1.0 / self.fps))
    }
}
