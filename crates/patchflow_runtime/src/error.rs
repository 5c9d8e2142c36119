// SPDX-License-Identifier: MIT OR Apache-2.0
//! Engine and per-node error types.

use crate::config::ConfigError;
use crate::executor::ExecutionError;
use patchflow_graph::{DocumentError, StructuralError};
use std::fmt;
use thiserror::Error;

/// Errors that stop an engine operation (never raised mid-pass by a node)
#[derive(Debug, Error)]
pub enum EngineError {
    /// The graph is malformed, or cyclic under [`crate::CyclePolicy::Reject`]
    #[error("Structural error: {0}")]
    Structural(#[from] StructuralError),

    /// A document could not be read
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    /// The configuration could not be read
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Kind of failure attached to a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeErrorKind {
    /// No executor registered for the node's type
    UnknownNodeType,
    /// The executor returned an error
    Execution,
    /// The executor panicked
    Panicked,
    /// The executor reported a recoverable problem on `_error`
    Soft,
}

/// A failure attached to one node for one tick, for UI display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeError {
    /// What went wrong
    pub kind: NodeErrorKind,
    /// Human-readable message
    pub message: String,
    /// Optional structured error ID
    pub error_id: Option<String>,
}

impl NodeError {
    /// Registry miss
    pub fn unknown_type(node_type: &str) -> Self {
        Self {
            kind: NodeErrorKind::UnknownNodeType,
            message: format!("Unknown node type: {node_type}"),
            error_id: None,
        }
    }

    /// Executor panic
    pub fn panicked(message: impl Into<String>) -> Self {
        Self {
            kind: NodeErrorKind::Panicked,
            message: message.into(),
            error_id: None,
        }
    }

    /// Soft error reported by the executor
    pub fn soft(message: impl Into<String>) -> Self {
        Self {
            kind: NodeErrorKind::Soft,
            message: message.into(),
            error_id: None,
        }
    }

    /// Whether the node's outputs were discarded for the tick
    pub fn is_hard(&self) -> bool {
        self.kind != NodeErrorKind::Soft
    }
}

impl From<ExecutionError> for NodeError {
    fn from(err: ExecutionError) -> Self {
        Self {
            kind: NodeErrorKind::Execution,
            message: err.message,
            error_id: err.error_id,
        }
    }
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_id {
            Some(id) => write!(f, "[{id}] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for NodeError {}
