// SPDX-License-Identifier: MIT OR Apache-2.0
//! The execution scheduler.
//!
//! ## Value discipline
//!
//! Every evaluated node gets a fresh output map stamped with the tick it was
//! produced in, replacing the previous one wholesale. Failed nodes store an
//! empty map, so a cache entry never mixes two ticks.
//!
//! An input connected to a node that already ran this tick sees this tick's
//! value. An input whose source has not run yet (only possible on a
//! feedback edge) sees the source's value from the previous tick.
//! Continuous outputs are re-readable for as long as they are cached.
//! Trigger outputs are only visible to the tick they were meant for, which
//! gives them their auto-reset behaviour.

use crate::bus::MessageBus;
use crate::config::{CyclePolicy, EngineConfig, EvaluationScope};
use crate::context::{ExecutionContext, Inputs};
use crate::error::{EngineError, NodeError};
use crate::executor::{ExecutorRegistry, NodeExecutor, Outputs};
use patchflow_graph::{
    CycleError, EditQueue, Graph, GraphDocument, GraphEdit, LoadReport, NodeCatalog, NodeId,
    PortId, StructuralError, Value,
};
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Cached output of one node
#[derive(Debug, Default)]
struct NodeState {
    outputs: Outputs,
    /// Tick the outputs were produced in
    evaluated_tick: u64,
}

/// One connected input, resolved at plan time
#[derive(Debug)]
struct Wire {
    port: PortId,
    from_node: NodeId,
    from_port: PortId,
    trigger: bool,
}

/// Evaluation order and wiring, valid for one graph revision
#[derive(Debug)]
struct Plan {
    revision: u64,
    scope: EvaluationScope,
    order: Arc<[NodeId]>,
    cycles: Vec<Vec<NodeId>>,
    wiring: HashMap<NodeId, Vec<Wire>>,
}

/// A queued edit that could not be applied
#[derive(Debug, Clone)]
pub struct RejectedEdit {
    /// The edit as queued
    pub edit: GraphEdit,
    /// Why it was refused
    pub error: StructuralError,
}

/// Summary of one evaluation pass
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Tick number, starting at 1
    pub tick: u64,
    /// Nodes evaluated, in order
    pub evaluated: Vec<NodeId>,
    /// Nodes that reported an error this tick
    pub errors: Vec<(NodeId, NodeError)>,
    /// Queued edits refused at the start of this tick
    pub rejected_edits: Vec<RejectedEdit>,
}

impl TickReport {
    /// Whether no node failed and no edit was refused
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.rejected_edits.is_empty()
    }
}

/// Dataflow execution engine for one graph
pub struct Engine {
    graph: Graph,
    registry: ExecutorRegistry,
    bus: MessageBus,
    config: EngineConfig,
    edits: EditQueue,
    states: HashMap<NodeId, NodeState>,
    errors: HashMap<NodeId, NodeError>,
    plan: Option<Plan>,
    tick: u64,
}

impl Engine {
    /// Create an engine over a graph.
    ///
    /// Fails when the graph is cyclic and the config rejects cycles.
    pub fn new(
        graph: Graph,
        registry: ExecutorRegistry,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        check_cycles(&graph, config.cycle_policy)?;
        tracing::debug!(
            "Engine created for '{}' ({} nodes, {} executors)",
            graph.name,
            graph.node_count(),
            registry.len()
        );

        Ok(Self {
            graph,
            registry,
            bus: MessageBus::new(),
            config,
            edits: EditQueue::new(),
            states: HashMap::new(),
            errors: HashMap::new(),
            plan: None,
            tick: 0,
        })
    }

    /// Create an engine from a document
    pub fn from_document(
        document: GraphDocument,
        catalog: &NodeCatalog,
        registry: ExecutorRegistry,
        config: EngineConfig,
    ) -> Result<(Self, LoadReport), EngineError> {
        let (graph, report) = document.into_graph(catalog)?;
        Ok((Self::new(graph, registry, config)?, report))
    }

    /// The graph as of the last tick boundary
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// The engine's message bus
    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// Current configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replace the configuration, effective from the next tick
    pub fn set_config(&mut self, config: EngineConfig) -> Result<(), EngineError> {
        check_cycles(&self.graph, config.cycle_policy)?;
        self.config = config;
        self.plan = None;
        Ok(())
    }

    /// Handle for queueing graph edits; applied at the next tick boundary
    pub fn edits(&self) -> EditQueue {
        self.edits.clone()
    }

    /// Queue a single edit
    pub fn queue(&self, edit: GraphEdit) {
        self.edits.push(edit);
    }

    /// Number of completed ticks
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Run one evaluation pass
    pub fn tick(&mut self) -> Result<TickReport, EngineError> {
        let rejected_edits = self.apply_pending_edits();
        let order = self.ensure_plan()?;

        self.tick += 1;
        let tick = self.tick;
        let mut report = TickReport {
            tick,
            rejected_edits,
            ..TickReport::default()
        };

        for &node_id in order.iter() {
            if let Some(error) = self.evaluate(node_id, tick) {
                report.errors.push((node_id, error));
            }
            report.evaluated.push(node_id);
        }

        tracing::debug!(
            "Tick {} complete: {} nodes evaluated, {} errors",
            tick,
            report.evaluated.len(),
            report.errors.len()
        );
        Ok(report)
    }

    /// Cached outputs of a node from its most recent evaluation
    pub fn outputs(&self, node_id: NodeId) -> Option<&Outputs> {
        self.states.get(&node_id).map(|s| &s.outputs)
    }

    /// Cached value of one output port
    pub fn output(&self, node_id: NodeId, port_id: &str) -> Option<&Value> {
        self.outputs(node_id)?.get(port_id)
    }

    /// The full value cache, in graph order
    pub fn values(&self) -> impl Iterator<Item = (NodeId, &Outputs)> + '_ {
        self.graph
            .node_ids()
            .filter_map(|id| self.states.get(&id).map(|s| (id, &s.outputs)))
    }

    /// Error currently attached to a node
    pub fn node_error(&self, node_id: NodeId) -> Option<&NodeError> {
        self.errors.get(&node_id)
    }

    /// All nodes currently in an error state
    pub fn errors(&self) -> impl Iterator<Item = (NodeId, &NodeError)> + '_ {
        self.errors.iter().map(|(id, err)| (*id, err))
    }

    /// Feedback loops found by the last plan, each in evaluation order
    pub fn feedback_loops(&self) -> &[Vec<NodeId>] {
        self.plan.as_ref().map_or(&[], |p| p.cycles.as_slice())
    }

    /// Forget all values, errors and bus channels, and restart tick numbering
    pub fn reset(&mut self) {
        self.states.clear();
        self.errors.clear();
        self.bus.clear();
        self.tick = 0;
        tracing::info!("Engine reset");
    }

    /// Swap in a new graph and reset. Pending edits target the old graph and
    /// are discarded.
    pub fn replace_graph(&mut self, graph: Graph) -> Result<(), EngineError> {
        check_cycles(&graph, self.config.cycle_policy)?;
        let discarded = self.edits.drain().len();
        if discarded > 0 {
            tracing::debug!("Discarded {discarded} pending edits for the previous graph");
        }
        self.graph = graph;
        self.plan = None;
        self.reset();
        Ok(())
    }

    /// Load a document in place of the current graph
    pub fn load_document(
        &mut self,
        document: GraphDocument,
        catalog: &NodeCatalog,
    ) -> Result<LoadReport, EngineError> {
        let (graph, report) = document.into_graph(catalog)?;
        self.replace_graph(graph)?;
        Ok(report)
    }

    fn apply_pending_edits(&mut self) -> Vec<RejectedEdit> {
        let mut rejected = Vec::new();
        let edits = self.edits.drain();
        if edits.is_empty() {
            return rejected;
        }

        for edit in edits {
            let record = edit.clone();
            match edit.apply(&mut self.graph) {
                Ok(Some(connection)) if self.config.cycle_policy == CyclePolicy::Reject => {
                    if let Err(cycle) = self.graph.topological_order() {
                        self.graph.disconnect(connection);
                        tracing::warn!("Rejected graph edit {:?}: {}", record, cycle);
                        rejected.push(RejectedEdit { edit: record, error: cycle.into() });
                    }
                }
                Ok(_) => {}
                Err(error) => {
                    tracing::warn!("Rejected graph edit {:?}: {}", record, error);
                    rejected.push(RejectedEdit { edit: record, error });
                }
            }
        }

        // Drop cached state of removed nodes
        let graph = &self.graph;
        self.states.retain(|id, _| graph.contains_node(*id));
        self.errors.retain(|id, _| graph.contains_node(*id));
        rejected
    }

    fn ensure_plan(&mut self) -> Result<Arc<[NodeId]>, EngineError> {
        let revision = self.graph.revision();
        let scope = self.config.scope;
        if let Some(plan) = &self.plan {
            if plan.revision == revision && plan.scope == scope {
                return Ok(Arc::clone(&plan.order));
            }
        }

        let roots: Vec<NodeId> = match scope {
            EvaluationScope::ReachableFromOutputs => self.graph.output_nodes().collect(),
            EvaluationScope::FullGraph => Vec::new(),
        };
        let order = if roots.is_empty() {
            self.graph.evaluation_order(None)
        } else {
            self.graph.evaluation_order(Some(&roots))
        };

        if !order.is_acyclic() {
            match self.config.cycle_policy {
                CyclePolicy::Reject => {
                    let cycle = CycleError { components: order.cycles };
                    return Err(StructuralError::from(cycle).into());
                }
                CyclePolicy::DelayFeedback => {
                    for cycle in &order.cycles {
                        tracing::debug!(
                            "Feedback loop through {} node(s); back edges are delayed one tick",
                            cycle.len()
                        );
                    }
                }
            }
        }

        let mut wiring: HashMap<NodeId, Vec<Wire>> = HashMap::new();
        for connection in self.graph.connections() {
            let trigger = self
                .graph
                .port_type(connection.from_node, &connection.from_port)
                .is_some_and(|t| t.is_trigger());
            wiring.entry(connection.to_node).or_default().push(Wire {
                port: connection.to_port.clone(),
                from_node: connection.from_node,
                from_port: connection.from_port.clone(),
                trigger,
            });
        }

        let nodes: Arc<[NodeId]> = order.nodes.into();
        self.plan = Some(Plan {
            revision,
            scope,
            order: Arc::clone(&nodes),
            cycles: order.cycles,
            wiring,
        });
        Ok(nodes)
    }

    /// Evaluate one node and store its outputs. Never fails; the returned
    /// error is already attached to the node.
    fn evaluate(&mut self, node_id: NodeId, tick: u64) -> Option<NodeError> {
        let node = self.graph.node(node_id)?;
        let wires = self
            .plan
            .as_ref()
            .and_then(|p| p.wiring.get(&node_id))
            .map_or(&[][..], Vec::as_slice);
        let inputs = resolve_inputs(wires, &self.states, tick);

        let result = match self.registry.get(&node.node_type) {
            None => Err(NodeError::unknown_type(&node.node_type)),
            Some(executor) => {
                let previous = self.states.get(&node_id).map(|s| &s.outputs);
                let ctx = ExecutionContext::new(
                    node_id,
                    &node.node_type,
                    tick,
                    &inputs,
                    &node.controls,
                    previous,
                    &self.bus,
                );
                invoke(executor.as_ref(), &ctx, self.config.catch_panics)
            }
        };

        let (outputs, error) = match result {
            Ok(outputs) => {
                let soft = outputs.soft_error().map(NodeError::soft);
                (outputs, soft)
            }
            Err(error) => (Outputs::new(), Some(error)),
        };
        self.states.insert(node_id, NodeState { outputs, evaluated_tick: tick });

        // Log transitions only, so a node failing every frame logs once
        let previous_error = match &error {
            Some(err) => self.errors.insert(node_id, err.clone()),
            None => self.errors.remove(&node_id),
        };
        if previous_error != error {
            match &error {
                Some(err) => tracing::warn!("Node {} ({}) failed: {}", node.name, node_id, err),
                None => tracing::info!("Node {} ({}) recovered", node.name, node_id),
            }
        }
        error
    }
}

/// Resolve a node's connected inputs against the value cache
fn resolve_inputs(wires: &[Wire], states: &HashMap<NodeId, NodeState>, tick: u64) -> Inputs {
    let mut inputs = Inputs::new();
    for wire in wires {
        let value = states.get(&wire.from_node).and_then(|state| {
            // Ran this tick: this tick's value. Not yet: a feedback edge,
            // which sees the previous tick.
            let expected = if state.evaluated_tick == tick { tick } else { tick - 1 };
            if wire.trigger && state.evaluated_tick != expected {
                return None;
            }
            state.outputs.get(wire.from_port.as_str()).cloned()
        });
        inputs.insert_connected(wire.port.clone(), value);
    }
    inputs
}

/// Call an executor behind the error-isolation boundary
fn invoke(
    executor: &dyn NodeExecutor,
    ctx: &ExecutionContext<'_>,
    catch_panics: bool,
) -> Result<Outputs, NodeError> {
    if !catch_panics {
        return executor.execute(ctx).map_err(NodeError::from);
    }
    match panic::catch_unwind(AssertUnwindSafe(|| executor.execute(ctx))) {
        Ok(result) => result.map_err(NodeError::from),
        Err(payload) => Err(NodeError::panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "executor panicked".to_string()
    }
}

fn check_cycles(graph: &Graph, policy: CyclePolicy) -> Result<(), EngineError> {
    if policy == CyclePolicy::Reject {
        graph.topological_order().map_err(StructuralError::from)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NodeErrorKind;
    use crate::executor::ExecutionError;
    use patchflow_graph::{Node, NodeCategory, NodeDefinition, Port, PortType};

    fn definition(
        id: &str,
        inputs: &[(&str, PortType)],
        outputs: &[(&str, PortType)],
    ) -> NodeDefinition {
        NodeDefinition {
            id: id.to_string(),
            name: id.to_string(),
            category: NodeCategory::Custom,
            description: String::new(),
            inputs: inputs.iter().map(|(p, t)| Port::input(p, *t)).collect(),
            outputs: outputs.iter().map(|(p, t)| Port::output(p, *t)).collect(),
            controls: Vec::new(),
        }
    }

    fn source() -> NodeDefinition {
        definition("test.source", &[], &[("value", PortType::Number), ("pulse", PortType::Trigger)])
    }

    fn double() -> NodeDefinition {
        definition("test.double", &[("in", PortType::Number)], &[("out", PortType::Number)])
    }

    fn probe() -> NodeDefinition {
        definition(
            "test.probe",
            &[("in", PortType::Any), ("fire", PortType::Trigger)],
            &[("seen", PortType::Any), ("unset", PortType::Bool), ("fired", PortType::Bool)],
        )
    }

    fn echo() -> NodeDefinition {
        definition(
            "test.echo",
            &[("in", PortType::Any), ("fire", PortType::Trigger)],
            &[("out", PortType::Any), ("fired", PortType::Trigger)],
        )
    }

    fn counter() -> NodeDefinition {
        definition(
            "test.counter",
            &[("back", PortType::Any), ("back_pulse", PortType::Trigger)],
            &[
                ("count", PortType::Number),
                ("pulse", PortType::Trigger),
                ("seen", PortType::Any),
                ("seen_pulse", PortType::Bool),
            ],
        )
    }

    fn registry() -> ExecutorRegistry {
        let mut registry = ExecutorRegistry::new();
        registry.register_fn("test.source", |ctx| {
            let mut out = Outputs::new().with("value", ctx.number("value").unwrap_or(1.0));
            if ctx.tick() % 2 == 1 {
                out.set("pulse", true);
            }
            Ok(out)
        });
        registry.register_fn("test.double", |ctx| {
            Ok(match ctx.input("in").and_then(Value::as_number) {
                Some(n) => Outputs::new().with("out", n * 2.0),
                None => Outputs::new(),
            })
        });
        registry.register_fn("test.probe", |ctx| {
            let mut out = Outputs::new()
                .with("unset", ctx.input("in").is_none())
                .with("fired", ctx.triggered("fire"));
            if let Some(value) = ctx.input("in") {
                out.set("seen", value.clone());
            }
            Ok(out)
        });
        registry.register_fn("test.echo", |ctx| {
            let mut out = Outputs::new();
            if let Some(value) = ctx.input("in") {
                out.set("out", value.clone());
            }
            if ctx.triggered("fire") {
                out.set("fired", true);
            }
            Ok(out)
        });
        registry.register_fn("test.counter", |ctx| {
            let count = ctx.previous("count").and_then(Value::as_number).unwrap_or(0.0) + 1.0;
            let mut out = Outputs::new()
                .with("count", count)
                .with("seen_pulse", ctx.triggered("back_pulse"));
            if count % 2.0 == 1.0 {
                out.set("pulse", true);
            }
            if let Some(value) = ctx.input("back") {
                out.set("seen", value.clone());
            }
            Ok(out)
        });
        registry.register_fn("test.fail", |_| {
            Err(ExecutionError::new("always fails").with_id("E_TEST"))
        });
        registry.register_fn("test.panic", |_| -> Result<Outputs, ExecutionError> {
            panic!("executor blew up")
        });
        registry.register_fn("test.soft", |_| {
            Ok(Outputs::new().with("result", "fallback").with_soft_error("Invalid regex pattern"))
        });
        registry
    }

    fn add(graph: &mut Graph, definition: &NodeDefinition) -> NodeId {
        graph.add_node(Node::new(definition)).unwrap()
    }

    fn engine(graph: Graph) -> Engine {
        Engine::new(graph, registry(), EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_unconnected_input_resolves_to_unset() {
        let mut graph = Graph::new("test");
        let p = add(&mut graph, &probe());
        let mut engine = engine(graph);

        let report = engine.tick().unwrap();
        assert!(report.is_clean());
        assert_eq!(engine.output(p, "unset"), Some(&Value::Bool(true)));
        assert_eq!(engine.output(p, "seen"), None);
    }

    #[test]
    fn test_values_propagate_within_one_tick() {
        let mut graph = Graph::new("test");
        // Inserted downstream-first to make sure order comes from edges
        let d2 = add(&mut graph, &double());
        let d1 = add(&mut graph, &double());
        let s = graph
            .add_node(Node::new(&source()).with_control("value", 3.0))
            .unwrap();
        graph.connect(s, "value", d1, "in").unwrap();
        graph.connect(d1, "out", d2, "in").unwrap();

        let mut engine = engine(graph);
        let report = engine.tick().unwrap();
        assert_eq!(report.evaluated, vec![s, d1, d2]);
        assert_eq!(engine.output(d2, "out"), Some(&Value::Number(12.0)));
    }

    #[test]
    fn test_rerun_is_deterministic() {
        let mut graph = Graph::new("test");
        let s = add(&mut graph, &source());
        let d = add(&mut graph, &double());
        graph.connect(s, "value", d, "in").unwrap();

        let mut engine = engine(graph);
        engine.tick().unwrap();
        let first: Vec<Outputs> = engine.values().map(|(_, o)| o.clone()).collect();
        engine.tick().unwrap();
        engine.tick().unwrap();
        let third: Vec<Outputs> = engine.values().map(|(_, o)| o.clone()).collect();
        assert_eq!(first, third);
    }

    #[test]
    fn test_failing_nodes_are_isolated() {
        let mut graph = Graph::new("test");
        let fail = add(&mut graph, &definition("test.fail", &[], &[("out", PortType::Number)]));
        let boom = add(&mut graph, &definition("test.panic", &[], &[("out", PortType::Number)]));
        let ghost = graph.add_node(Node::unknown(NodeId::new(), "vendor.ghost")).unwrap();
        let s = add(&mut graph, &source());
        let d = add(&mut graph, &double());
        let downstream = add(&mut graph, &probe());
        graph.connect(s, "value", d, "in").unwrap();
        graph.connect(fail, "out", downstream, "in").unwrap();

        let mut engine = engine(graph);
        for _ in 0..3 {
            let report = engine.tick().unwrap();
            assert_eq!(report.evaluated.len(), 6);
            assert_eq!(report.errors.len(), 3);
            assert_eq!(engine.output(d, "out"), Some(&Value::Number(2.0)));
        }

        let err = engine.node_error(fail).unwrap();
        assert_eq!(err.kind, NodeErrorKind::Execution);
        assert_eq!(err.error_id.as_deref(), Some("E_TEST"));
        assert_eq!(engine.node_error(boom).unwrap().kind, NodeErrorKind::Panicked);
        assert_eq!(engine.node_error(boom).unwrap().message, "executor blew up");
        assert_eq!(engine.node_error(ghost).unwrap().kind, NodeErrorKind::UnknownNodeType);

        // Failed outputs are unset, not stale and not substituted
        assert!(engine.outputs(fail).unwrap().is_empty());
        assert_eq!(engine.output(downstream, "unset"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_soft_error_keeps_outputs() {
        let mut graph = Graph::new("test");
        let soft = add(&mut graph, &definition("test.soft", &[], &[("result", PortType::String)]));
        let mut engine = engine(graph);

        let report = engine.tick().unwrap();
        assert_eq!(report.errors.len(), 1);
        assert_eq!(engine.node_error(soft).unwrap().kind, NodeErrorKind::Soft);
        assert_eq!(engine.output(soft, "result"), Some(&Value::from("fallback")));
    }

    #[test]
    fn test_feedback_lags_one_tick() {
        // counter -> echo -> counter
        let mut graph = Graph::new("test");
        let a = add(&mut graph, &counter());
        let b = add(&mut graph, &echo());
        graph.connect(a, "count", b, "in").unwrap();
        graph.connect(b, "out", a, "back").unwrap();

        let mut engine = engine(graph);
        engine.tick().unwrap();
        assert_eq!(engine.feedback_loops(), &[vec![a, b]]);
        assert_eq!(engine.output(a, "count"), Some(&Value::Number(1.0)));
        assert_eq!(engine.output(a, "seen"), None);
        assert_eq!(engine.output(b, "out"), Some(&Value::Number(1.0)));

        for tick in 2..=5 {
            engine.tick().unwrap();
            let count = tick as f64;
            assert_eq!(engine.output(a, "count"), Some(&Value::Number(count)));
            // Never its own value from this tick
            assert_eq!(engine.output(a, "seen"), Some(&Value::Number(count - 1.0)));
        }
    }

    #[test]
    fn test_trigger_feedback_lags_one_tick() {
        // counter.pulse -> echo.fire -> echo.fired -> counter.back_pulse
        let mut graph = Graph::new("test");
        let a = add(&mut graph, &counter());
        let b = add(&mut graph, &echo());
        graph.connect(a, "pulse", b, "fire").unwrap();
        graph.connect(b, "fired", a, "back_pulse").unwrap();

        let mut engine = engine(graph);
        // Tick 1: counter pulses, but b has not run yet
        engine.tick().unwrap();
        assert_eq!(engine.output(a, "seen_pulse"), Some(&Value::Bool(false)));
        assert_eq!(engine.output(b, "fired"), Some(&Value::Bool(true)));

        // Tick 2: counter sees b's tick-1 pulse; no pulse of its own
        engine.tick().unwrap();
        assert_eq!(engine.output(a, "seen_pulse"), Some(&Value::Bool(true)));
        assert_eq!(engine.output(b, "fired"), None);

        // Tick 3: b did not fire on tick 2, so nothing is seen
        engine.tick().unwrap();
        assert_eq!(engine.output(a, "seen_pulse"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_trigger_is_observed_only_in_its_tick() {
        let mut graph = Graph::new("test");
        let s = add(&mut graph, &source());
        let p = add(&mut graph, &probe());
        graph.connect(s, "pulse", p, "fire").unwrap();

        let mut engine = engine(graph);
        let fired: Vec<bool> = (0..4)
            .map(|_| {
                engine.tick().unwrap();
                engine.output(p, "fired") == Some(&Value::Bool(true))
            })
            .collect();
        assert_eq!(fired, vec![true, false, true, false]);
    }

    #[test]
    fn test_reject_policy() {
        let mut graph = Graph::new("test");
        let a = add(&mut graph, &echo());
        let b = add(&mut graph, &echo());
        graph.connect(a, "out", b, "in").unwrap();

        let config = EngineConfig {
            cycle_policy: CyclePolicy::Reject,
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(graph.clone(), registry(), config.clone()).unwrap();

        // Closing the loop through a queued edit is refused at the boundary
        engine.queue(GraphEdit::connect(b, "out", a, "in"));
        let report = engine.tick().unwrap();
        assert_eq!(report.rejected_edits.len(), 1);
        assert!(matches!(report.rejected_edits[0].error, StructuralError::Cycle(_)));
        assert_eq!(engine.graph().connection_count(), 1);

        // A cyclic graph is refused up front
        graph.connect(b, "out", a, "in").unwrap();
        assert!(matches!(
            Engine::new(graph, registry(), config),
            Err(EngineError::Structural(StructuralError::Cycle(_)))
        ));
    }

    #[test]
    fn test_edits_apply_at_tick_boundary() {
        let mut graph = Graph::new("test");
        let s = add(&mut graph, &source());
        let mut engine = engine(graph);
        engine.tick().unwrap();

        let d = Node::new(&double());
        let d_id = d.id;
        let queue = engine.edits();
        queue.push(GraphEdit::AddNode(d));
        queue.push(GraphEdit::connect(s, "value", d_id, "in"));
        queue.push(GraphEdit::set_control(s, "value", 5.0));
        assert!(!engine.graph().contains_node(d_id));

        let report = engine.tick().unwrap();
        assert!(report.rejected_edits.is_empty());
        assert_eq!(engine.output(d_id, "out"), Some(&Value::Number(10.0)));

        queue.push(GraphEdit::RemoveNode(d_id));
        queue.push(GraphEdit::RemoveNode(d_id));
        let report = engine.tick().unwrap();
        assert_eq!(report.rejected_edits.len(), 1);
        assert!(engine.outputs(d_id).is_none());
    }

    #[test]
    fn test_reachable_scope_skips_idle_branch() {
        let mut graph = Graph::new("test");
        let s = add(&mut graph, &source());
        let d = add(&mut graph, &double());
        let idle = add(&mut graph, &probe());
        graph.connect(s, "value", d, "in").unwrap();
        graph.connect(s, "value", idle, "in").unwrap();
        graph.mark_output(d).unwrap();

        let config = EngineConfig {
            scope: EvaluationScope::ReachableFromOutputs,
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(graph, registry(), config).unwrap();
        let report = engine.tick().unwrap();
        assert_eq!(report.evaluated, vec![s, d]);
        assert!(engine.outputs(idle).is_none());

        // Without designations the whole graph runs
        engine.queue(GraphEdit::UnmarkOutput(d));
        let report = engine.tick().unwrap();
        assert_eq!(report.evaluated.len(), 3);
    }

    #[test]
    fn test_error_clears_after_recovery() {
        let mut graph = Graph::new("test");
        let ghost = graph.add_node(Node::unknown(NodeId::new(), "vendor.ghost")).unwrap();
        let mut engine = engine(graph);
        engine.tick().unwrap();
        assert!(engine.node_error(ghost).is_some());

        engine.queue(GraphEdit::RemoveNode(ghost));
        engine.tick().unwrap();
        assert_eq!(engine.errors().count(), 0);
    }

    #[test]
    fn test_reset_clears_values_and_bus() {
        let mut graph = Graph::new("test");
        add(&mut graph, &source());
        let mut engine = engine(graph);
        engine.tick().unwrap();
        engine.bus().send("level", Value::from(1.0));

        engine.reset();
        assert_eq!(engine.current_tick(), 0);
        assert_eq!(engine.values().count(), 0);
        assert_eq!(engine.bus().channel_count(), 0);
    }
}
