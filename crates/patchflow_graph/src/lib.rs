// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph model for Patchflow.
//!
//! This crate holds the pure-data side of a dataflow patch:
//! - Nodes with stored control values
//! - Typed input/output ports declared by node definitions
//! - Edges (connections) with a fan-in of one per input
//! - Evaluation ordering and cycle analysis
//! - Queued edits applied between ticks
//! - Document (de)serialization
//!
//! ## Architecture
//!
//! Nothing in here evaluates anything. The runtime crate walks the
//! [`Graph`] in the order computed by [`Graph::evaluation_order`] and keeps
//! the live value cache itself.

pub mod value;
pub mod port;
pub mod node;
pub mod connection;
pub mod graph;
pub mod order;
pub mod edit;
pub mod document;

pub use value::{MediaHandle, Value};
pub use port::{Port, PortDirection, PortId, PortType};
pub use node::{Control, Node, NodeCatalog, NodeCategory, NodeDefinition, NodeId};
pub use connection::{Connection, ConnectionId};
pub use graph::{CycleError, Graph, StructuralError};
pub use order::EvaluationOrder;
pub use edit::{EditQueue, GraphEdit};
pub use document::{
    DocumentError, EdgeRecord, GraphDocument, LoadReport, NodeRecord, QuarantinedEdge,
};
