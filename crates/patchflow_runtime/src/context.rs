// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-node, per-tick execution context.

use crate::bus::MessageBus;
use crate::executor::{ExecutionError, NodeExecutor, Outputs};
use indexmap::IndexMap;
use patchflow_graph::{NodeId, PortId, Value};
use std::collections::{HashMap, HashSet};

/// Resolved input values of one node for one tick
///
/// A port can be connected and still have no value (the source has not
/// produced one, or a trigger did not fire); that is different from a port
/// with no edge at all.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    values: HashMap<PortId, Value>,
    connected: HashSet<PortId>,
}

impl Inputs {
    /// Create an empty set of inputs
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a connected port and its resolved value
    pub fn insert_connected(&mut self, port_id: impl Into<PortId>, value: Option<Value>) {
        let port_id = port_id.into();
        if let Some(value) = value {
            self.values.insert(port_id.clone(), value);
        }
        self.connected.insert(port_id);
    }

    /// Resolved value of an input; `None` means unset
    pub fn get(&self, port_id: &str) -> Option<&Value> {
        self.values.get(port_id)
    }

    /// Whether an edge feeds this input
    pub fn is_connected(&self, port_id: &str) -> bool {
        self.connected.contains(port_id)
    }
}

/// Everything an executor may look at while evaluating a node
///
/// Borrowed for the duration of one call and never kept.
pub struct ExecutionContext<'a> {
    node_id: NodeId,
    node_type: &'a str,
    tick: u64,
    inputs: &'a Inputs,
    controls: &'a IndexMap<String, Value>,
    previous: Option<&'a Outputs>,
    bus: &'a MessageBus,
}

impl<'a> ExecutionContext<'a> {
    pub(crate) fn new(
        node_id: NodeId,
        node_type: &'a str,
        tick: u64,
        inputs: &'a Inputs,
        controls: &'a IndexMap<String, Value>,
        previous: Option<&'a Outputs>,
        bus: &'a MessageBus,
    ) -> Self {
        Self {
            node_id,
            node_type,
            tick,
            inputs,
            controls,
            previous,
            bus,
        }
    }

    /// ID of the node being evaluated
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Type ID of the node being evaluated
    pub fn node_type(&self) -> &str {
        self.node_type
    }

    /// Current tick number, starting at 1
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Resolved input value; `None` when unconnected or unset
    pub fn input(&self, port_id: &str) -> Option<&Value> {
        self.inputs.get(port_id)
    }

    /// Whether an edge feeds this input
    pub fn is_connected(&self, port_id: &str) -> bool {
        self.inputs.is_connected(port_id)
    }

    /// Stored control value
    pub fn control(&self, control_id: &str) -> Option<&Value> {
        self.controls.get(control_id)
    }

    /// A connected input with a value wins over the control of the same ID.
    ///
    /// An empty string arriving on a wire counts as a value, so a wired but
    /// empty input does not fall back to the control default.
    pub fn input_or_control(&self, id: &str) -> Option<&Value> {
        match self.input(id) {
            Some(value) if self.is_connected(id) => Some(value),
            _ => self.control(id),
        }
    }

    /// Numeric view of [`input_or_control`](Self::input_or_control)
    pub fn number(&self, id: &str) -> Option<f64> {
        self.input_or_control(id).and_then(Value::as_number)
    }

    /// Text view of [`input_or_control`](Self::input_or_control)
    pub fn text(&self, id: &str) -> Option<String> {
        self.input_or_control(id).map(Value::to_text)
    }

    /// Boolean view of [`input_or_control`](Self::input_or_control)
    pub fn flag(&self, id: &str) -> Option<bool> {
        self.input_or_control(id).map(Value::is_truthy)
    }

    /// Whether a trigger input fired this tick
    pub fn triggered(&self, port_id: &str) -> bool {
        self.input(port_id).is_some_and(Value::is_truthy)
    }

    /// This node's own output from its previous evaluation
    pub fn previous(&self, port_id: &str) -> Option<&Value> {
        self.previous?.get(port_id)
    }

    /// The engine's message bus
    pub fn bus(&self) -> &MessageBus {
        self.bus
    }
}

/// Builds a context outside a running engine, for tooling and tests
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    node_id: NodeId,
    node_type: String,
    tick: u64,
    inputs: Inputs,
    controls: IndexMap<String, Value>,
    previous: Option<Outputs>,
    bus: MessageBus,
}

impl ContextBuilder {
    /// Start a context for a node type
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_id: NodeId::new(),
            node_type: node_type.into(),
            tick: 1,
            inputs: Inputs::new(),
            controls: IndexMap::new(),
            previous: None,
            bus: MessageBus::new(),
        }
    }

    /// Connected input with a value
    pub fn input(mut self, port_id: &str, value: impl Into<Value>) -> Self {
        self.inputs.insert_connected(port_id, Some(value.into()));
        self
    }

    /// Connected input whose source produced nothing
    pub fn connected_unset(mut self, port_id: &str) -> Self {
        self.inputs.insert_connected(port_id, None);
        self
    }

    /// Control value
    pub fn control(mut self, control_id: &str, value: impl Into<Value>) -> Self {
        self.controls.insert(control_id.to_string(), value.into());
        self
    }

    /// Outputs of the previous evaluation
    pub fn previous(mut self, outputs: Outputs) -> Self {
        self.previous = Some(outputs);
        self
    }

    /// Tick number
    pub fn tick(mut self, tick: u64) -> Self {
        self.tick = tick;
        self
    }

    /// Share an existing bus
    pub fn bus(mut self, bus: MessageBus) -> Self {
        self.bus = bus;
        self
    }

    /// Borrow the assembled context
    pub fn context(&self) -> ExecutionContext<'_> {
        ExecutionContext::new(
            self.node_id,
            &self.node_type,
            self.tick,
            &self.inputs,
            &self.controls,
            self.previous.as_ref(),
            &self.bus,
        )
    }

    /// Run an executor against the assembled context
    pub fn run(&self, executor: &dyn NodeExecutor) -> Result<Outputs, ExecutionError> {
        executor.execute(&self.context())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconnected_input_is_unset() {
        let builder = ContextBuilder::new("test");
        let ctx = builder.context();
        assert_eq!(ctx.input("a"), None);
        assert!(!ctx.is_connected("a"));
        assert!(!ctx.triggered("a"));
    }

    #[test]
    fn test_wired_empty_string_beats_control() {
        let builder = ContextBuilder::new("test")
            .control("separator", ",")
            .input("separator", "");
        assert_eq!(builder.context().text("separator").as_deref(), Some(""));
    }

    #[test]
    fn test_unwired_or_unset_input_falls_back_to_control() {
        let unwired = ContextBuilder::new("test").control("separator", ",");
        assert_eq!(unwired.context().text("separator").as_deref(), Some(","));

        let unset = ContextBuilder::new("test")
            .control("separator", ",")
            .connected_unset("separator");
        let ctx = unset.context();
        assert!(ctx.is_connected("separator"));
        assert_eq!(ctx.text("separator").as_deref(), Some(","));
    }

    #[test]
    fn test_previous_outputs_visible() {
        let builder = ContextBuilder::new("test").previous(Outputs::new().with("count", 4.0));
        assert_eq!(builder.context().previous("count"), Some(&Value::from(4.0)));
        assert_eq!(ContextBuilder::new("test").context().previous("count"), None);
    }
}
