// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions and node instances.

use crate::port::{Port, PortId};
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Node type category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Input nodes (constants, parameters)
    Input,
    /// Output nodes (sinks, previews)
    Output,
    /// Math operations
    Math,
    /// String operations
    String,
    /// Logic, comparison and trigger flow
    Logic,
    /// Message bus send/receive
    Messaging,
    /// Media and asset loading
    Media,
    /// Utility nodes
    Utility,
    /// Custom/user-defined
    Custom,
}

/// A user-configurable parameter declared by a node definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Control {
    /// Control ID; an input port with the same ID overrides it when connected
    pub id: String,
    /// Display name
    pub name: String,
    /// Value a fresh node starts with
    pub default: Value,
}

impl Control {
    /// Create a control named after its ID
    pub fn new(id: &str, default: impl Into<Value>) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            default: default.into(),
        }
    }
}

/// Node type definition (metadata only, no behavior)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDefinition {
    /// Unique type identifier, e.g. `"string.concat"`
    pub id: String,
    /// Display name
    pub name: String,
    /// Category
    pub category: NodeCategory,
    /// Description
    pub description: String,
    /// Declared input ports
    pub inputs: Vec<Port>,
    /// Declared output ports
    pub outputs: Vec<Port>,
    /// Declared controls
    pub controls: Vec<Control>,
}

/// A node instance in the graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Node type ID
    pub node_type: String,
    /// Display name (can be customized)
    pub name: String,
    /// Input ports
    pub inputs: Vec<Port>,
    /// Output ports
    pub outputs: Vec<Port>,
    /// Stored control values
    pub controls: IndexMap<String, Value>,
}

impl Node {
    /// Create a new node from a type definition, with default control values
    pub fn new(definition: &NodeDefinition) -> Self {
        Self::with_id(NodeId::new(), definition)
    }

    /// Create a node with a known ID (document load)
    pub fn with_id(id: NodeId, definition: &NodeDefinition) -> Self {
        Self {
            id,
            node_type: definition.id.clone(),
            name: definition.name.clone(),
            inputs: definition.inputs.clone(),
            outputs: definition.outputs.clone(),
            controls: definition
                .controls
                .iter()
                .map(|c| (c.id.clone(), c.default.clone()))
                .collect(),
        }
    }

    /// Create a node whose type has no known definition.
    ///
    /// It has no ports, so nothing can connect to it; the runtime reports it
    /// as an unknown node type on every tick.
    pub fn unknown(id: NodeId, node_type: impl Into<String>) -> Self {
        let node_type = node_type.into();
        Self {
            id,
            name: node_type.clone(),
            node_type,
            inputs: Vec::new(),
            outputs: Vec::new(),
            controls: IndexMap::new(),
        }
    }

    /// Set a control value, builder style
    pub fn with_control(mut self, id: &str, value: impl Into<Value>) -> Self {
        self.controls.insert(id.to_string(), value.into());
        self
    }

    /// Get an input port by ID
    pub fn input(&self, port_id: &str) -> Option<&Port> {
        self.inputs.iter().find(|p| p.id.as_str() == port_id)
    }

    /// Get an output port by ID
    pub fn output(&self, port_id: &str) -> Option<&Port> {
        self.outputs.iter().find(|p| p.id.as_str() == port_id)
    }

    /// Get a port by ID, inputs first
    pub fn port(&self, port_id: &PortId) -> Option<&Port> {
        self.input(port_id.as_str())
            .or_else(|| self.output(port_id.as_str()))
    }

    /// Get all ports
    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    /// Get a control value
    pub fn control(&self, id: &str) -> Option<&Value> {
        self.controls.get(id)
    }
}

/// Catalog of available node definitions
#[derive(Debug, Clone, Default)]
pub struct NodeCatalog {
    /// Registered definitions by type ID
    definitions: IndexMap<String, NodeDefinition>,
}

impl NodeCatalog {
    /// Create a new empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node definition, replacing any previous one with the same ID
    pub fn register(&mut self, definition: NodeDefinition) {
        self.definitions.insert(definition.id.clone(), definition);
    }

    /// Get a definition by type ID
    pub fn get(&self, id: &str) -> Option<&NodeDefinition> {
        self.definitions.get(id)
    }

    /// Check whether a type ID is known
    pub fn contains(&self, id: &str) -> bool {
        self.definitions.contains_key(id)
    }

    /// Get all registered definitions
    pub fn definitions(&self) -> impl Iterator<Item = &NodeDefinition> {
        self.definitions.values()
    }

    /// Get definitions by category
    pub fn in_category(&self, category: NodeCategory) -> impl Iterator<Item = &NodeDefinition> {
        self.definitions.values().filter(move |d| d.category == category)
    }

    /// Number of definitions
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Create a node from a type ID
    pub fn create_node(&self, type_id: &str) -> Option<Node> {
        self.get(type_id).map(Node::new)
    }
}
