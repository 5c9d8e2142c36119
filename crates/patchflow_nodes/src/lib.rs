// SPDX-License-Identifier: MIT OR Apache-2.0
//! Standard node packages for Patchflow.
//!
//! Each package registers its node definitions into a [`NodeCatalog`] and
//! the matching executors into an [`ExecutorRegistry`]. The two tables are
//! built once at startup and handed to the engine explicitly.
//!
//! Executors treat every input as optional: an unset input falls back to
//! the control of the same ID, then to a documented default.

pub mod logic;
pub mod math;
pub mod media;
pub mod messaging;
pub mod string;

use patchflow_graph::NodeCatalog;
use patchflow_runtime::{AssetTracker, ExecutorRegistry};
use std::sync::Arc;

/// Register the math, string, logic and messaging packages
pub fn register_standard(catalog: &mut NodeCatalog, executors: &mut ExecutorRegistry) {
    math::register(catalog, executors);
    string::register(catalog, executors);
    logic::register(catalog, executors);
    messaging::register(catalog, executors);
}

/// Catalog and executors for every package that needs no host services
pub fn standard_library() -> (NodeCatalog, ExecutorRegistry) {
    let mut catalog = NodeCatalog::new();
    let mut executors = ExecutorRegistry::new();
    register_standard(&mut catalog, &mut executors);
    tracing::debug!("Standard library: {} node types", catalog.len());
    (catalog, executors)
}

/// [`standard_library`] plus the media package, backed by `tracker`
pub fn full_library(tracker: Arc<AssetTracker>) -> (NodeCatalog, ExecutorRegistry) {
    let (mut catalog, mut executors) = standard_library();
    media::register(&mut catalog, &mut executors, tracker);
    (catalog, executors)
}
