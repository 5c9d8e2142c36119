// SPDX-License-Identifier: MIT OR Apache-2.0
//! `patchflow` - command-line runner for Patchflow node graphs.
//!
//! Loads a graph document (RON or JSON), evaluates it for a number of ticks
//! at a fixed frame rate and prints the resulting value cache. With
//! `--watch`, edits to the document are picked up between ticks.
//!
//! Logging goes through `tracing`; set `RUST_LOG` to adjust it.

mod cli;
mod file_watcher;
mod media;
mod runner;
mod snapshot;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() {
    let args = cli::Args::parse();

    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(tracing::Level::WARN.into())
        .parse_lossy(std::env::var("RUST_LOG").unwrap_or_else(|_| "patchflow=info".to_string()));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting patchflow v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = runner::run(&args) {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}
