// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node executor contract and registry.
//!
//! An executor is a pure function of its [`ExecutionContext`]: resolved
//! inputs, control values and the message bus. It must not keep the
//! context, must not touch the graph, and is called at most once per node
//! per tick.
//!
//! ## Soft errors
//!
//! An executor that hits a recoverable, domain-level problem (say, an
//! invalid user-supplied pattern) does not fail. It returns its best-effort
//! outputs plus a string on the reserved [`SOFT_ERROR_PORT`] (`_error`).
//! The engine reports that message like any other node error but keeps the
//! outputs.

use crate::context::ExecutionContext;
use indexmap::IndexMap;
use patchflow_graph::{PortId, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Reserved output port carrying a soft error message
pub const SOFT_ERROR_PORT: &str = "_error";

/// Output values by port ID
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Outputs {
    values: IndexMap<PortId, Value>,
}

impl Outputs {
    /// Create a new empty output
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an output value
    pub fn set(&mut self, port_id: impl Into<PortId>, value: impl Into<Value>) {
        self.values.insert(port_id.into(), value.into());
    }

    /// Set an output value, builder style
    pub fn with(mut self, port_id: impl Into<PortId>, value: impl Into<Value>) -> Self {
        self.set(port_id, value);
        self
    }

    /// Attach a soft error message
    pub fn with_soft_error(self, message: impl Into<String>) -> Self {
        self.with(SOFT_ERROR_PORT, Value::String(message.into()))
    }

    /// Get an output value
    pub fn get(&self, port_id: &str) -> Option<&Value> {
        self.values.get(port_id)
    }

    /// Soft error message, if the executor set one
    pub fn soft_error(&self) -> Option<&str> {
        self.get(SOFT_ERROR_PORT)
            .and_then(Value::as_str)
            .filter(|message| !message.is_empty())
    }

    /// Iterate over port/value pairs
    pub fn iter(&self) -> impl Iterator<Item = (&PortId, &Value)> {
        self.values.iter()
    }

    /// Number of outputs set
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no output is set
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<P: Into<PortId>, V: Into<Value>> FromIterator<(P, V)> for Outputs {
    fn from_iter<I: IntoIterator<Item = (P, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(p, v)| (p.into(), v.into())).collect(),
        }
    }
}

/// Hard failure raised by an executor
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ExecutionError {
    /// Human-readable message
    pub message: String,
    /// Optional structured error ID for tooling
    pub error_id: Option<String>,
}

impl ExecutionError {
    /// Create an error with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_id: None,
        }
    }

    /// Attach a structured error ID
    pub fn with_id(mut self, error_id: impl Into<String>) -> Self {
        self.error_id = Some(error_id.into());
        self
    }
}

/// Trait for evaluating nodes
pub trait NodeExecutor: Send + Sync {
    /// Evaluate a node and produce outputs
    fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<Outputs, ExecutionError>;
}

impl<F> NodeExecutor for F
where
    F: Fn(&ExecutionContext<'_>) -> Result<Outputs, ExecutionError> + Send + Sync,
{
    fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<Outputs, ExecutionError> {
        self(ctx)
    }
}

/// Lookup table from node type ID to executor
///
/// Built once at startup from every node package and handed to the engine.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn NodeExecutor>>,
}

impl ExecutorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor, replacing any previous one for the type
    pub fn register(&mut self, type_id: impl Into<String>, executor: impl NodeExecutor + 'static) {
        let type_id = type_id.into();
        if self.executors.insert(type_id.clone(), Arc::new(executor)).is_some() {
            tracing::debug!("Replaced executor for node type '{type_id}'");
        }
    }

    /// Register a closure as an executor
    pub fn register_fn<F>(&mut self, type_id: impl Into<String>, executor: F)
    where
        F: Fn(&ExecutionContext<'_>) -> Result<Outputs, ExecutionError> + Send + Sync + 'static,
    {
        self.register(type_id, executor);
    }

    /// Register an already shared executor
    pub fn register_shared(&mut self, type_id: impl Into<String>, executor: Arc<dyn NodeExecutor>) {
        self.executors.insert(type_id.into(), executor);
    }

    /// Merge another registry in; its entries win
    pub fn extend(&mut self, other: ExecutorRegistry) {
        self.executors.extend(other.executors);
    }

    /// Get the executor for a node type
    pub fn get(&self, type_id: &str) -> Option<&Arc<dyn NodeExecutor>> {
        self.executors.get(type_id)
    }

    /// Whether a node type has an executor
    pub fn contains(&self, type_id: &str) -> bool {
        self.executors.contains_key(type_id)
    }

    /// Registered type IDs, sorted
    pub fn type_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.executors.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Number of registered executors
    pub fn len(&self) -> usize {
        self.executors.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

impl fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("types", &self.type_ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(_: &ExecutionContext<'_>) -> Result<Outputs, ExecutionError> {
        Ok(Outputs::new().with("value", 1.0))
    }

    #[test]
    fn test_registration_is_additive() {
        let mut math = ExecutorRegistry::new();
        math.register("math.one", constant);
        let mut strings = ExecutorRegistry::new();
        strings.register_fn("string.empty", |_| Ok(Outputs::new().with("result", "")));

        math.extend(strings);
        assert_eq!(math.type_ids(), vec!["math.one", "string.empty"]);
        assert!(math.get("math.two").is_none());
    }

    #[test]
    fn test_soft_error_detection() {
        let outputs = Outputs::new().with("result", "x").with_soft_error("Invalid regex pattern");
        assert_eq!(outputs.soft_error(), Some("Invalid regex pattern"));
        assert_eq!(outputs.get("result"), Some(&Value::from("x")));

        let blank = Outputs::new().with(SOFT_ERROR_PORT, "");
        assert_eq!(blank.soft_error(), None);
    }

    #[test]
    fn test_execution_error_carries_id() {
        let err = ExecutionError::new("boom").with_id("E_BOOM");
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.error_id.as_deref(), Some("E_BOOM"));
    }
}
