// SPDX-License-Identifier: MIT OR Apache-2.0
//! Persisted graph documents.
//!
//! A document is the minimal round-trippable form of a graph: nodes (id,
//! type, controls), edges (source node/port, target node/port) and the
//! output designations. Ports are not stored; they come back from the node
//! catalog on load. RON is the primary format, JSON is accepted as well.

use crate::graph::{Graph, StructuralError};
use crate::node::{Node, NodeCatalog, NodeId};
use crate::port::PortId;
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current document format version
pub const DOCUMENT_VERSION: u32 = 1;

/// Errors reading or writing a document
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// File I/O failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// RON could not be parsed
    #[error("RON parse error: {0}")]
    RonParse(#[from] ron::error::SpannedError),

    /// RON could not be written
    #[error("RON write error: {0}")]
    RonWrite(#[from] ron::Error),

    /// JSON could not be parsed or written
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The document describes an invalid graph
    #[error("Invalid graph: {0}")]
    Structural(#[from] StructuralError),

    /// Document was written by a newer version
    #[error("Unsupported document version {0} (expected <= {DOCUMENT_VERSION})")]
    UnsupportedVersion(u32),
}

/// A node as stored in a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Node ID
    pub id: NodeId,
    /// Node type ID
    pub node_type: String,
    /// Custom display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Stored control values
    #[serde(default)]
    pub controls: IndexMap<String, Value>,
}

/// An edge as stored in a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// Source node
    pub from_node: NodeId,
    /// Source output port
    pub from_port: PortId,
    /// Target node
    pub to_node: NodeId,
    /// Target input port
    pub to_port: PortId,
}

/// Serializable graph document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    /// Format version
    #[serde(default = "default_version")]
    pub version: u32,
    /// Graph name
    #[serde(default)]
    pub name: String,
    /// Nodes, in insertion order
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    /// Edges
    #[serde(default)]
    pub edges: Vec<EdgeRecord>,
    /// Nodes designated as outputs
    #[serde(default)]
    pub outputs: Vec<NodeId>,
}

fn default_version() -> u32 {
    DOCUMENT_VERSION
}

/// An edge that was not loaded, with the reason
#[derive(Debug, Clone)]
pub struct QuarantinedEdge {
    /// The edge as written in the document
    pub edge: EdgeRecord,
    /// Why it was refused
    pub reason: StructuralError,
}

/// What happened while turning a document into a graph
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Edges referencing unknown nodes or ports, or otherwise invalid
    pub quarantined: Vec<QuarantinedEdge>,
    /// Nodes whose type is not in the catalog (kept, with no ports)
    pub unknown_types: Vec<(NodeId, String)>,
    /// Output designations that referenced missing nodes
    pub dropped_outputs: Vec<NodeId>,
}

impl LoadReport {
    /// Whether the document loaded without any repairs
    pub fn is_clean(&self) -> bool {
        self.quarantined.is_empty()
            && self.unknown_types.is_empty()
            && self.dropped_outputs.is_empty()
    }
}

impl GraphDocument {
    /// Capture a graph
    pub fn from_graph(graph: &Graph) -> Self {
        let nodes = graph
            .nodes()
            .map(|node| NodeRecord {
                id: node.id,
                node_type: node.node_type.clone(),
                name: Some(node.name.clone()),
                controls: node.controls.clone(),
            })
            .collect();
        let edges = graph
            .connections()
            .map(|c| EdgeRecord {
                from_node: c.from_node,
                from_port: c.from_port.clone(),
                to_node: c.to_node,
                to_port: c.to_port.clone(),
            })
            .collect();

        Self {
            version: DOCUMENT_VERSION,
            name: graph.name.clone(),
            nodes,
            edges,
            outputs: graph.output_nodes().collect(),
        }
    }

    /// Build a graph, instantiating ports from the catalog.
    ///
    /// Duplicate node IDs reject the whole document. Edges that reference
    /// unknown nodes or ports, or that break port rules, are quarantined.
    pub fn into_graph(self, catalog: &NodeCatalog) -> Result<(Graph, LoadReport), DocumentError> {
        if self.version > DOCUMENT_VERSION {
            return Err(DocumentError::UnsupportedVersion(self.version));
        }

        let mut graph = Graph::new(self.name);
        let mut report = LoadReport::default();

        for record in self.nodes {
            let mut node = match catalog.get(&record.node_type) {
                Some(definition) => Node::with_id(record.id, definition),
                None => {
                    tracing::warn!(
                        "Unknown node type '{}' for node {}",
                        record.node_type,
                        record.id
                    );
                    report.unknown_types.push((record.id, record.node_type.clone()));
                    Node::unknown(record.id, record.node_type)
                }
            };
            if let Some(name) = record.name {
                node.name = name;
            }
            node.controls.extend(record.controls);
            graph.add_node(node)?;
        }

        for edge in self.edges {
            let result = graph.connect(
                edge.from_node,
                edge.from_port.clone(),
                edge.to_node,
                edge.to_port.clone(),
            );
            if let Err(reason) = result {
                tracing::warn!(
                    "Quarantined edge {}.{} -> {}.{}: {}",
                    edge.from_node,
                    edge.from_port,
                    edge.to_node,
                    edge.to_port,
                    reason
                );
                report.quarantined.push(QuarantinedEdge { edge, reason });
            }
        }

        for output in self.outputs {
            if graph.mark_output(output).is_err() {
                report.dropped_outputs.push(output);
            }
        }

        tracing::info!(
            "Loaded graph '{}': {} nodes, {} edges ({} quarantined)",
            graph.name,
            graph.node_count(),
            graph.connection_count(),
            report.quarantined.len()
        );
        Ok((graph, report))
    }

    /// Parse from RON
    pub fn from_ron(source: &str) -> Result<Self, DocumentError> {
        Ok(ron::from_str(source)?)
    }

    /// Write as pretty RON
    pub fn to_ron(&self) -> Result<String, DocumentError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Parse from JSON
    pub fn from_json(source: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(source)?)
    }

    /// Write as pretty JSON
    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load from a file; `.json` files are JSON, everything else RON
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        if is_json(path) {
            Self::from_json(&source)
        } else {
            Self::from_ron(&source)
        }
    }

    /// Save to a file, format chosen by extension
    pub fn save(&self, path: impl AsRef<Path>) -> Result<PathBuf, DocumentError> {
        let path = path.as_ref();
        let contents = if is_json(path) { self.to_json()? } else { self.to_ron()? };
        std::fs::write(path, contents)?;
        Ok(path.to_path_buf())
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::relay;

    fn catalog() -> NodeCatalog {
        let mut catalog = NodeCatalog::new();
        catalog.register(relay());
        catalog
    }

    fn sample_graph() -> Graph {
        let catalog = catalog();
        let mut graph = Graph::new("Sample");
        let a = graph.add_node(catalog.create_node("test.relay").unwrap()).unwrap();
        let b = graph
            .add_node(catalog.create_node("test.relay").unwrap().with_control("gain", 3.0))
            .unwrap();
        graph.connect(a, "out", b, "in").unwrap();
        graph.mark_output(b).unwrap();
        graph
    }

    #[test]
    fn test_ron_round_trip() {
        let graph = sample_graph();
        let doc = GraphDocument::from_graph(&graph);
        let ron = doc.to_ron().unwrap();
        let loaded = GraphDocument::from_ron(&ron).unwrap();
        assert_eq!(loaded, doc);

        let (rebuilt, report) = loaded.into_graph(&catalog()).unwrap();
        assert!(report.is_clean());
        assert_eq!(rebuilt.node_ids().collect::<Vec<_>>(), graph.node_ids().collect::<Vec<_>>());
        assert_eq!(rebuilt.connection_count(), 1);
        assert_eq!(rebuilt.output_nodes().count(), 1);
    }

    #[test]
    fn test_json_round_trip() {
        let doc = GraphDocument::from_graph(&sample_graph());
        let json = doc.to_json().unwrap();
        assert_eq!(GraphDocument::from_json(&json).unwrap(), doc);
    }

    #[test]
    fn test_dangling_edges_are_quarantined() {
        let mut doc = GraphDocument::from_graph(&sample_graph());
        let ghost = NodeId::new();
        let first = doc.nodes[0].id;
        doc.edges.push(EdgeRecord {
            from_node: ghost,
            from_port: "out".into(),
            to_node: first,
            to_port: "in".into(),
        });
        doc.edges.push(EdgeRecord {
            from_node: first,
            from_port: "nope".into(),
            to_node: first,
            to_port: "fire".into(),
        });

        let (graph, report) = doc.into_graph(&catalog()).unwrap();
        assert_eq!(graph.connection_count(), 1);
        assert_eq!(report.quarantined.len(), 2);
        assert!(matches!(
            report.quarantined[0].reason,
            StructuralError::NodeNotFound(id) if id == ghost
        ));
    }

    #[test]
    fn test_unknown_types_are_kept() {
        let mut doc = GraphDocument::from_graph(&sample_graph());
        let id = NodeId::new();
        doc.nodes.push(NodeRecord {
            id,
            node_type: "vendor.mystery".to_string(),
            name: None,
            controls: IndexMap::new(),
        });

        let (graph, report) = doc.into_graph(&catalog()).unwrap();
        assert!(graph.contains_node(id));
        assert_eq!(report.unknown_types, vec![(id, "vendor.mystery".to_string())]);
    }

    #[test]
    fn test_duplicate_ids_reject_document() {
        let mut doc = GraphDocument::from_graph(&sample_graph());
        let copy = doc.nodes[0].clone();
        doc.nodes.push(copy);
        assert!(matches!(
            doc.into_graph(&catalog()),
            Err(DocumentError::Structural(StructuralError::DuplicateNode(_)))
        ));
    }

    #[test]
    fn test_hand_written_ron() {
        let source = r#"(
            name: "Hand",
            nodes: [
                (id: "7d4f4b6e-2b47-4f5c-9a55-0d3a3f0c8e01", node_type: "test.relay", controls: { "gain": Number(2.0) }),
            ],
        )"#;
        let doc = GraphDocument::from_ron(source).unwrap();
        assert_eq!(doc.version, DOCUMENT_VERSION);
        let (graph, _) = doc.into_graph(&catalog()).unwrap();
        let node = graph.nodes().next().unwrap();
        assert_eq!(node.control("gain"), Some(&Value::Number(2.0)));
    }
}
