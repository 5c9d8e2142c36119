// SPDX-License-Identifier: MIT OR Apache-2.0
//! Queued graph edits.
//!
//! UI code never touches a running graph directly. It pushes [`GraphEdit`]s
//! into an [`EditQueue`], and the evaluator drains the queue at the next
//! tick boundary.

use crate::connection::ConnectionId;
use crate::graph::{Graph, StructuralError};
use crate::node::{Node, NodeId};
use crate::port::PortId;
use crate::value::Value;
use parking_lot::Mutex;
use std::sync::Arc;

/// A single structural or control change to a graph
#[derive(Debug, Clone)]
pub enum GraphEdit {
    /// Add a node
    AddNode(Node),
    /// Remove a node and its incident connections
    RemoveNode(NodeId),
    /// Connect an output port to an input port
    Connect {
        /// Source node
        from_node: NodeId,
        /// Source output port
        from_port: PortId,
        /// Target node
        to_node: NodeId,
        /// Target input port
        to_port: PortId,
    },
    /// Remove a connection by ID
    Disconnect(ConnectionId),
    /// Remove whatever connection feeds an input
    DisconnectInput {
        /// Target node
        node: NodeId,
        /// Target input port
        port: PortId,
    },
    /// Set a stored control value
    SetControl {
        /// Node to change
        node: NodeId,
        /// Control ID
        control: String,
        /// New value
        value: Value,
    },
    /// Designate a node as an output
    MarkOutput(NodeId),
    /// Remove an output designation
    UnmarkOutput(NodeId),
}

impl GraphEdit {
    /// Build a connect edit
    pub fn connect(
        from_node: NodeId,
        from_port: impl Into<PortId>,
        to_node: NodeId,
        to_port: impl Into<PortId>,
    ) -> Self {
        Self::Connect {
            from_node,
            from_port: from_port.into(),
            to_node,
            to_port: to_port.into(),
        }
    }

    /// Build a set-control edit
    pub fn set_control(node: NodeId, control: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::SetControl {
            node,
            control: control.into(),
            value: value.into(),
        }
    }

    /// Whether this edit can change evaluation order
    pub fn is_structural(&self) -> bool {
        !matches!(self, Self::SetControl { .. })
    }

    /// Apply the edit.
    ///
    /// Returns the ID of a connection created by a [`GraphEdit::Connect`],
    /// so a caller enforcing acyclicity can roll it back.
    pub fn apply(self, graph: &mut Graph) -> Result<Option<ConnectionId>, StructuralError> {
        match self {
            Self::AddNode(node) => graph.add_node(node).map(|_| None),
            Self::RemoveNode(id) => graph
                .remove_node(id)
                .map(|_| None)
                .ok_or(StructuralError::NodeNotFound(id)),
            Self::Connect { from_node, from_port, to_node, to_port } => {
                graph.connect(from_node, from_port, to_node, to_port).map(Some)
            }
            Self::Disconnect(id) => graph
                .disconnect(id)
                .map(|_| None)
                .ok_or(StructuralError::ConnectionNotFound(id)),
            Self::DisconnectInput { node, port } => {
                let id = graph
                    .predecessor(node, port.as_str())
                    .map(|c| c.id)
                    .ok_or(StructuralError::PortNotFound { node, port })?;
                graph.disconnect(id);
                Ok(None)
            }
            Self::SetControl { node, control, value } => {
                graph.set_control(node, control, value).map(|_| None)
            }
            Self::MarkOutput(id) => graph.mark_output(id).map(|_| None),
            Self::UnmarkOutput(id) => {
                graph.unmark_output(id);
                Ok(None)
            }
        }
    }
}

/// Shared queue of pending edits
///
/// Clones share the same queue, so one handle can live in UI code while
/// the evaluator owns another.
#[derive(Debug, Clone, Default)]
pub struct EditQueue {
    pending: Arc<Mutex<Vec<GraphEdit>>>,
}

impl EditQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an edit for the next tick boundary
    pub fn push(&self, edit: GraphEdit) {
        self.pending.lock().push(edit);
    }

    /// Queue several edits, applied in order
    pub fn extend(&self, edits: impl IntoIterator<Item = GraphEdit>) {
        self.pending.lock().extend(edits);
    }

    /// Take all pending edits
    pub fn drain(&self) -> Vec<GraphEdit> {
        std::mem::take(&mut *self.pending.lock())
    }

    /// Number of pending edits
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}
