// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and connections.

use crate::connection::{Connection, ConnectionId};
use crate::node::{Node, NodeId};
use crate::port::{PortDirection, PortId, PortType};
use crate::value::Value;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A node graph
///
/// Node insertion order is preserved and is the tie-breaker wherever the
/// evaluation order is otherwise unconstrained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    /// Graph name
    pub name: String,
    /// Nodes in the graph
    nodes: IndexMap<NodeId, Node>,
    /// Connections between nodes
    connections: IndexMap<ConnectionId, Connection>,
    /// Nodes designated as outputs (roots of the reachable evaluation scope)
    outputs: IndexSet<NodeId>,
    /// Bumped on every change that can affect evaluation order
    #[serde(skip)]
    revision: u64,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
            connections: IndexMap::new(),
            outputs: IndexSet::new(),
            revision: 0,
        }
    }

    /// Structural revision, for caching evaluation plans
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    /// Add a node to the graph
    pub fn add_node(&mut self, node: Node) -> Result<NodeId, StructuralError> {
        let id = node.id;
        if self.nodes.contains_key(&id) {
            return Err(StructuralError::DuplicateNode(id));
        }
        self.nodes.insert(id, node);
        self.touch();
        Ok(id)
    }

    /// Remove a node and its connections
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let node = self.nodes.shift_remove(&node_id)?;
        self.connections.retain(|_, c| !c.involves_node(node_id));
        self.outputs.shift_remove(&node_id);
        self.touch();
        Some(node)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Check whether a node exists
    pub fn contains_node(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    /// Get all nodes, in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs, in insertion order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Set a stored control value
    pub fn set_control(
        &mut self,
        node_id: NodeId,
        control: impl Into<String>,
        value: Value,
    ) -> Result<Option<Value>, StructuralError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(StructuralError::NodeNotFound(node_id))?;
        Ok(node.controls.insert(control.into(), value))
    }

    /// Add a connection from an output port to an input port
    ///
    /// Self-loops and cycles are accepted here; whether they are tolerated
    /// is up to the evaluator's cycle policy.
    pub fn connect(
        &mut self,
        from_node: NodeId,
        from_port: impl Into<PortId>,
        to_node: NodeId,
        to_port: impl Into<PortId>,
    ) -> Result<ConnectionId, StructuralError> {
        let from_port = from_port.into();
        let to_port = to_port.into();

        // Validate nodes exist
        let source_node = self
            .nodes
            .get(&from_node)
            .ok_or(StructuralError::NodeNotFound(from_node))?;
        let target_node = self
            .nodes
            .get(&to_node)
            .ok_or(StructuralError::NodeNotFound(to_node))?;

        // Validate ports exist and point the right way
        let source_port = source_node
            .port(&from_port)
            .ok_or_else(|| StructuralError::PortNotFound {
                node: from_node,
                port: from_port.clone(),
            })?;
        if source_port.direction != PortDirection::Output {
            return Err(StructuralError::NotAnOutput {
                node: from_node,
                port: from_port,
            });
        }
        let target_port = target_node
            .port(&to_port)
            .ok_or_else(|| StructuralError::PortNotFound {
                node: to_node,
                port: to_port.clone(),
            })?;
        if target_port.direction != PortDirection::Input {
            return Err(StructuralError::NotAnInput {
                node: to_node,
                port: to_port,
            });
        }

        if !source_port.can_connect(target_port) {
            return Err(StructuralError::IncompatiblePorts {
                from: source_port.port_type,
                to: target_port.port_type,
            });
        }

        // Fan-in of one per input
        if self.predecessor(to_node, to_port.as_str()).is_some() {
            return Err(StructuralError::InputAlreadyConnected {
                node: to_node,
                port: to_port,
            });
        }

        let connection = Connection::new(from_node, from_port, to_node, to_port);
        let id = connection.id;
        self.connections.insert(id, connection);
        self.touch();
        Ok(id)
    }

    /// Remove a connection
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Option<Connection> {
        let connection = self.connections.shift_remove(&connection_id)?;
        self.touch();
        Some(connection)
    }

    /// Get a connection by ID
    pub fn connection(&self, connection_id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&connection_id)
    }

    /// Get all connections
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Connections feeding an input port (at most one)
    pub fn predecessors<'a>(
        &'a self,
        node_id: NodeId,
        port_id: &'a str,
    ) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections.values().filter(move |c| c.feeds(node_id, port_id))
    }

    /// The connection feeding an input port, if any
    pub fn predecessor<'a>(&'a self, node_id: NodeId, port_id: &'a str) -> Option<&'a Connection> {
        self.predecessors(node_id, port_id).next()
    }

    /// Connections leaving an output port
    pub fn successors<'a>(
        &'a self,
        node_id: NodeId,
        port_id: &'a str,
    ) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections.values().filter(move |c| c.fed_by(node_id, port_id))
    }

    /// Declared type of a port
    pub fn port_type(&self, node_id: NodeId, port_id: &PortId) -> Option<PortType> {
        self.node(node_id)?.port(port_id).map(|p| p.port_type)
    }

    /// Designate a node as an output (root of the reachable evaluation scope)
    pub fn mark_output(&mut self, node_id: NodeId) -> Result<(), StructuralError> {
        if !self.nodes.contains_key(&node_id) {
            return Err(StructuralError::NodeNotFound(node_id));
        }
        if self.outputs.insert(node_id) {
            self.touch();
        }
        Ok(())
    }

    /// Remove an output designation
    pub fn unmark_output(&mut self, node_id: NodeId) -> bool {
        let removed = self.outputs.shift_remove(&node_id);
        if removed {
            self.touch();
        }
        removed
    }

    /// Nodes designated as outputs
    pub fn output_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.outputs.iter().copied()
    }

    /// Whether a node is designated as an output
    pub fn is_output(&self, node_id: NodeId) -> bool {
        self.outputs.contains(&node_id)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

/// Malformed graph structure, reported at load or edit time
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StructuralError {
    /// A node with this ID already exists
    #[error("Duplicate node: {0}")]
    DuplicateNode(NodeId),

    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Port not found
    #[error("Port not found: {node}.{port}")]
    PortNotFound {
        /// Node that was searched
        node: NodeId,
        /// Missing port
        port: PortId,
    },

    /// Connection source is not an output
    #[error("Not an output port: {node}.{port}")]
    NotAnOutput {
        /// Source node
        node: NodeId,
        /// Offending port
        port: PortId,
    },

    /// Connection target is not an input
    #[error("Not an input port: {node}.{port}")]
    NotAnInput {
        /// Target node
        node: NodeId,
        /// Offending port
        port: PortId,
    },

    /// Incompatible port types
    #[error("Incompatible port types: {from:?} -> {to:?}")]
    IncompatiblePorts {
        /// Source port type
        from: PortType,
        /// Target port type
        to: PortType,
    },

    /// Input already has an incoming connection
    #[error("Input already connected: {node}.{port}")]
    InputAlreadyConnected {
        /// Target node
        node: NodeId,
        /// Target port
        port: PortId,
    },

    /// Connection not found
    #[error("Connection not found: {0:?}")]
    ConnectionNotFound(ConnectionId),

    /// Graph has a cycle and cycles are not tolerated
    #[error(transparent)]
    Cycle(#[from] CycleError),
}

/// Error when graph contains a cycle
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct CycleError {
    /// Each strongly connected set of nodes, in insertion order
    pub components: Vec<Vec<NodeId>>,
}

impl CycleError {
    /// All offending nodes, flattened
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.components.iter().flatten().copied()
    }
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Graph contains a cycle")?;
        for (i, component) in self.components.iter().enumerate() {
            let ids: Vec<String> = component.iter().map(ToString::to_string).collect();
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}[{}]", ids.join(", "))?;
        }
        Ok(())
    }
}
