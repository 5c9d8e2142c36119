// SPDX-License-Identifier: MIT OR Apache-2.0
//! Serializable view of the engine's value cache.

use crate::cli::OutputFormat;
use indexmap::IndexMap;
use patchflow_graph::Value;
use patchflow_runtime::{Engine, Outputs};
use serde::Serialize;

/// Errors while rendering a snapshot
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// RON serialization failed
    #[error("RON error: {0}")]
    Ron(#[from] ron::Error),
    /// JSON serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One node's state
#[derive(Debug, Serialize)]
pub struct NodeSnapshot {
    /// Node ID
    pub id: String,
    /// Node type ID
    #[serde(rename = "type")]
    pub node_type: String,
    /// Cached outputs
    pub outputs: Outputs,
    /// Attached error, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// State of the whole engine after a tick
#[derive(Debug, Serialize)]
pub struct Snapshot {
    /// Completed tick count
    pub tick: u64,
    /// Nodes keyed by display name, in graph order
    pub nodes: IndexMap<String, NodeSnapshot>,
    /// Message bus channels
    pub channels: IndexMap<String, Value>,
}

impl Snapshot {
    /// Capture the engine's current state
    pub fn capture(engine: &Engine) -> Self {
        let mut nodes = IndexMap::new();
        for node in engine.graph().nodes() {
            let mut key = node.name.clone();
            if nodes.contains_key(&key) {
                key = format!("{} ({})", node.name, node.id);
            }
            nodes.insert(
                key,
                NodeSnapshot {
                    id: node.id.to_string(),
                    node_type: node.node_type.clone(),
                    outputs: engine.outputs(node.id).cloned().unwrap_or_default(),
                    error: engine.node_error(node.id).map(ToString::to_string),
                },
            );
        }

        let channels = engine
            .bus()
            .channels()
            .into_iter()
            .filter_map(|channel| Some((channel.name, channel.value?)))
            .collect();

        Self {
            tick: engine.current_tick(),
            nodes,
            channels,
        }
    }

    /// Render in the requested format
    pub fn render(&self, format: OutputFormat) -> Result<String, SnapshotError> {
        Ok(match format {
            OutputFormat::Ron => {
                ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?
            }
            OutputFormat::Json => serde_json::to_string_pretty(self)?,
        })
    }
}
