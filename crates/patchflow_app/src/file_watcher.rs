// SPDX-License-Identifier: MIT OR Apache-2.0
//! Debounced watcher for the running document.
//!
//! Editors often save by writing a temp file and renaming it over the
//! original, so the parent directory is watched and events are filtered
//! down to the document's path.

use notify_debouncer_full::{
    new_debouncer,
    notify::{self, EventKind, RecommendedWatcher, RecursiveMode},
    DebounceEventResult, Debouncer, RecommendedCache,
};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::Duration;

/// Debounce duration for document events
pub const DEBOUNCE: Duration = Duration::from_millis(250);

/// Events emitted by the watcher
#[derive(Debug, Clone)]
pub enum DocumentEvent {
    /// The document was written or replaced
    Changed,
    /// The document was deleted
    Removed,
    /// The watcher reported an error
    Error(String),
}

/// Watches a single document file
pub struct DocumentWatcher {
    /// The underlying debounced watcher
    _watcher: Debouncer<RecommendedWatcher, RecommendedCache>,
    /// Receiver for document events
    event_rx: Receiver<DocumentEvent>,
    path: PathBuf,
}

impl DocumentWatcher {
    /// Start watching `path`
    pub fn new(path: &Path) -> Result<Self, notify::Error> {
        let path = std::path::absolute(path)?;
        let dir = path.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let (event_tx, event_rx) = mpsc::channel();

        let target = path.clone();
        let mut watcher = new_debouncer(DEBOUNCE, None, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    for event in events {
                        if !event.paths.iter().any(|p| p == &target) {
                            continue;
                        }
                        let document_event = match event.kind {
                            EventKind::Create(_) | EventKind::Modify(_) => DocumentEvent::Changed,
                            EventKind::Remove(_) => DocumentEvent::Removed,
                            EventKind::Any | EventKind::Access(_) | EventKind::Other => continue,
                        };
                        let _ = event_tx.send(document_event);
                    }
                }
                Err(errors) => {
                    for error in errors {
                        let _ = event_tx.send(DocumentEvent::Error(error.to_string()));
                    }
                }
            }
        })?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!("Watching {} for changes", path.display());

        Ok(Self {
            _watcher: watcher,
            event_rx,
            path,
        })
    }

    /// The watched document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Poll for pending events (non-blocking)
    pub fn poll_events(&self) -> Vec<DocumentEvent> {
        let mut events = Vec::new();
        loop {
            match self.event_rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::warn!("Document watcher channel disconnected");
                    break;
                }
            }
        }
        events
    }

    /// Whether the document changed since the last poll. Removals and
    /// errors are logged and otherwise ignored, so the current graph keeps
    /// running until a valid file reappears.
    pub fn take_change(&self) -> bool {
        let mut changed = false;
        for event in self.poll_events() {
            match event {
                DocumentEvent::Changed => changed = true,
                DocumentEvent::Removed => {
                    tracing::warn!("{} was removed; keeping the loaded graph", self.path.display());
                }
                DocumentEvent::Error(err) => tracing::warn!("Watch error: {err}"),
            }
        }
        changed
    }
}
