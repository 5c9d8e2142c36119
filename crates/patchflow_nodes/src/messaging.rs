// SPDX-License-Identifier: MIT OR Apache-2.0
//! Send and receive nodes over the message bus.
//!
//! Channels connect nodes anywhere in the graph without an edge. Two sends
//! between ticks collapse into a single observed change on the receiving
//! side.

use patchflow_graph::{Control, NodeCatalog, NodeCategory, NodeDefinition, Port, PortType};
use patchflow_runtime::{ExecutionContext, ExecutionError, ExecutorRegistry, Outputs};

/// Register the messaging package
pub fn register(catalog: &mut NodeCatalog, executors: &mut ExecutorRegistry) {
    catalog.register(NodeDefinition {
        id: "message.send".to_string(),
        name: "Send".to_string(),
        category: NodeCategory::Messaging,
        description: "Publish a value on a named channel; with a trigger wired, only when it fires"
            .to_string(),
        inputs: vec![
            Port::input("value", PortType::Any),
            Port::input("trigger", PortType::Trigger),
        ],
        outputs: vec![Port::output("sent", PortType::Trigger)],
        controls: vec![Control::new("channel", "")],
    });
    executors.register("message.send", send);

    catalog.register(NodeDefinition {
        id: "message.receive".to_string(),
        name: "Receive".to_string(),
        category: NodeCategory::Messaging,
        description: "Current value of a named channel".to_string(),
        inputs: vec![],
        outputs: vec![
            Port::output("value", PortType::Any),
            Port::output("changed", PortType::Trigger),
        ],
        controls: vec![Control::new("channel", "")],
    });
    executors.register("message.receive", receive);
}

fn channel(ctx: &ExecutionContext<'_>) -> Option<String> {
    ctx.control("channel")
        .map(|c| c.to_text())
        .filter(|c| !c.is_empty())
}

fn send(ctx: &ExecutionContext<'_>) -> Result<Outputs, ExecutionError> {
    let Some(channel) = channel(ctx) else {
        return Ok(Outputs::new().with_soft_error("No channel name"));
    };
    if ctx.is_connected("trigger") && !ctx.triggered("trigger") {
        return Ok(Outputs::new());
    }
    let Some(value) = ctx.input_or_control("value") else {
        return Ok(Outputs::new());
    };

    if ctx.bus().send(&channel, value.clone()) {
        Ok(Outputs::new().with("sent", true))
    } else {
        Ok(Outputs::new())
    }
}

fn receive(ctx: &ExecutionContext<'_>) -> Result<Outputs, ExecutionError> {
    let Some(channel) = channel(ctx) else {
        return Ok(Outputs::new().with_soft_error("No channel name"));
    };

    let mut outputs = Outputs::new();
    if let Some(value) = ctx.bus().get(&channel) {
        outputs.set("value", value);
    }
    if ctx.bus().take_change(&channel) {
        outputs.set("changed", true);
    }
    Ok(outputs)
}
