// SPDX-License-Identifier: MIT OR Apache-2.0
//! The tick loop.

use crate::cli::Args;
use crate::file_watcher::DocumentWatcher;
use crate::media::FileSource;
use crate::snapshot::{Snapshot, SnapshotError};
use patchflow_graph::{DocumentError, GraphDocument, LoadReport, NodeCatalog};
use patchflow_runtime::{AssetTracker, ConfigError, Engine, EngineConfig, EngineError};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors that end a run
#[derive(Debug, Error)]
pub enum RunError {
    /// Document could not be loaded
    #[error("Failed to load document: {0}")]
    Document(#[from] DocumentError),

    /// Config could not be loaded
    #[error("Failed to load config: {0}")]
    Config(#[from] ConfigError),

    /// Engine refused the graph
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Watcher could not be started
    #[error("Watch error: {0}")]
    Watch(#[from] notify_debouncer_full::notify::Error),

    /// Async runtime could not be started
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),

    /// Snapshot could not be rendered
    #[error("Output error: {0}")]
    Snapshot(#[from] SnapshotError),
}

fn log_report(path: &Path, report: &LoadReport) {
    if !report.is_clean() {
        tracing::warn!(
            "{} needed repairs: {} edges dropped, {} nodes of unknown type, {} outputs dropped",
            path.display(),
            report.quarantined.len(),
            report.unknown_types.len(),
            report.dropped_outputs.len()
        );
    }
}

fn load(path: &Path) -> Result<GraphDocument, DocumentError> {
    let document = GraphDocument::load(path)?;
    tracing::info!("Loaded '{}' from {}", document.name, path.display());
    Ok(document)
}

/// Run the document described by `args` until the tick budget is spent
pub fn run(args: &Args) -> Result<(), RunError> {
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("patchflow-assets")
        .enable_all()
        .build()?;
    let media_root = args
        .media_root
        .clone()
        .or_else(|| args.document.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    let tracker = Arc::new(AssetTracker::new(
        runtime.handle().clone(),
        Arc::new(FileSource::new(media_root)),
    ));

    let (catalog, executors) = patchflow_nodes::full_library(Arc::clone(&tracker));
    let document = load(&args.document)?;
    let (mut engine, report) = Engine::from_document(document, &catalog, executors, config)?;
    log_report(&args.document, &report);

    let watcher = if args.watch {
        Some(DocumentWatcher::new(&args.document)?)
    } else {
        None
    };
    let frame = args.frame_duration();

    let mut remaining = args.ticks;
    loop {
        if let Some(watcher) = &watcher {
            if watcher.take_change() {
                reload(&mut engine, &tracker, &catalog, watcher.path());
            }
        }
        tracker.update();

        let report = engine.tick()?;
        for rejected in &report.rejected_edits {
            tracing::warn!("Edit rejected: {}", rejected.error);
        }

        if remaining > 0 {
            remaining -= 1;
            if remaining == 0 {
                break;
            }
        }
        if args.each {
            println!("{}", Snapshot::capture(&engine).render(args.format)?);
        }
        if let Some(frame) = frame {
            std::thread::sleep(frame);
        }
    }

    println!("{}", Snapshot::capture(&engine).render(args.format)?);
    Ok(())
}

/// Swap in the document from disk. A broken file keeps the current graph.
fn reload(engine: &mut Engine, tracker: &AssetTracker, catalog: &NodeCatalog, path: &Path) {
    let document = match load(path) {
        Ok(document) => document,
        Err(err) => {
            tracing::error!("Reload failed, keeping current graph: {err}");
            return;
        }
    };
    match engine.load_document(document, catalog) {
        Ok(report) => {
            tracker.clear();
            log_report(path, &report);
        }
        Err(err) => tracing::error!("Reload failed, keeping current graph: {err}"),
    }
}
