// SPDX-License-Identifier: MIT OR Apache-2.0
//! Math nodes: constants, arithmetic, clamping, counting and random numbers.

use patchflow_graph::{Control, NodeCatalog, NodeCategory, NodeDefinition, Port, PortType, Value};
use patchflow_runtime::{ExecutionContext, ExecutionError, ExecutorRegistry, Outputs};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Register the math package
pub fn register(catalog: &mut NodeCatalog, executors: &mut ExecutorRegistry) {
    // ========================================================================
    // Constants
    // ========================================================================

    catalog.register(NodeDefinition {
        id: "math.number".to_string(),
        name: "Number".to_string(),
        category: NodeCategory::Input,
        description: "Constant number".to_string(),
        inputs: vec![],
        outputs: vec![Port::output("value", PortType::Number)],
        controls: vec![Control::new("value", 0.0)],
    });
    executors.register("math.number", number);

    // ========================================================================
    // Arithmetic
    // ========================================================================

    for (id, name, description, b_default, op) in [
        ("math.add", "Add", "a + b", 0.0, add as Binary),
        ("math.subtract", "Subtract", "a - b", 0.0, subtract),
        ("math.multiply", "Multiply", "a * b", 1.0, multiply),
    ] {
        catalog.register(binary_definition(id, name, description, b_default));
        executors.register_fn(id, move |ctx| {
            let a = ctx.number("a").unwrap_or(0.0);
            let b = ctx.number("b").unwrap_or(b_default);
            Ok(Outputs::new().with("result", op(a, b)))
        });
    }

    catalog.register(binary_definition(
        "math.divide",
        "Divide",
        "a / b; zero divisor yields 0 and an error",
        1.0,
    ));
    executors.register("math.divide", divide);

    catalog.register(NodeDefinition {
        id: "math.clamp".to_string(),
        name: "Clamp".to_string(),
        category: NodeCategory::Math,
        description: "Limit a value to [min, max]".to_string(),
        inputs: vec![
            Port::input("value", PortType::Number),
            Port::input("min", PortType::Number),
            Port::input("max", PortType::Number),
        ],
        outputs: vec![Port::output("result", PortType::Number)],
        controls: vec![
            Control::new("value", 0.0),
            Control::new("min", 0.0),
            Control::new("max", 1.0),
        ],
    });
    executors.register("math.clamp", clamp);

    // ========================================================================
    // Stateful
    // ========================================================================

    catalog.register(NodeDefinition {
        id: "math.counter".to_string(),
        name: "Counter".to_string(),
        category: NodeCategory::Math,
        description: "Counts increment pulses; reset returns to the initial value".to_string(),
        inputs: vec![
            Port::input("increment", PortType::Trigger),
            Port::input("reset", PortType::Trigger),
        ],
        outputs: vec![
            Port::output("count", PortType::Number),
            Port::output("changed", PortType::Trigger),
        ],
        controls: vec![Control::new("step", 1.0), Control::new("initial", 0.0)],
    });
    executors.register("math.counter", counter);

    catalog.register(NodeDefinition {
        id: "math.random".to_string(),
        name: "Random".to_string(),
        category: NodeCategory::Math,
        description: "Uniform random number in [min, max); a non-negative seed makes it repeatable"
            .to_string(),
        inputs: vec![Port::input("trigger", PortType::Trigger)],
        outputs: vec![Port::output("value", PortType::Number)],
        controls: vec![
            Control::new("min", 0.0),
            Control::new("max", 1.0),
            Control::new("seed", -1.0),
        ],
    });
    executors.register("math.random", random);
}

type Binary = fn(f64, f64) -> f64;

fn binary_definition(id: &str, name: &str, description: &str, b_default: f64) -> NodeDefinition {
    NodeDefinition {
        id: id.to_string(),
        name: name.to_string(),
        category: NodeCategory::Math,
        description: description.to_string(),
        inputs: vec![Port::input("a", PortType::Number), Port::input("b", PortType::Number)],
        outputs: vec![Port::output("result", PortType::Number)],
        controls: vec![Control::new("a", 0.0), Control::new("b", b_default)],
    }
}

fn add(a: f64, b: f64) -> f64 {
    a + b
}

fn subtract(a: f64, b: f64) -> f64 {
    a - b
}

fn multiply(a: f64, b: f64) -> f64 {
    a * b
}

fn number(ctx: &ExecutionContext<'_>) -> Result<Outputs, ExecutionError> {
    Ok(Outputs::new().with("value", ctx.number("value").unwrap_or(0.0)))
}

fn divide(ctx: &ExecutionContext<'_>) -> Result<Outputs, ExecutionError> {
    let a = ctx.number("a").unwrap_or(0.0);
    let b = ctx.number("b").unwrap_or(1.0);
    if b == 0.0 {
        return Ok(Outputs::new().with("result", 0.0).with_soft_error("Division by zero"));
    }
    Ok(Outputs::new().with("result", a / b))
}

fn clamp(ctx: &ExecutionContext<'_>) -> Result<Outputs, ExecutionError> {
    let value = ctx.number("value").unwrap_or(0.0);
    let (mut min, mut max) = (ctx.number("min").unwrap_or(0.0), ctx.number("max").unwrap_or(1.0));
    if min.is_nan() || max.is_nan() {
        return Ok(Outputs::new()
            .with("result", value)
            .with_soft_error("Clamp bound is not a number"));
    }
    if min > max {
        std::mem::swap(&mut min, &mut max);
    }
    Ok(Outputs::new().with("result", value.clamp(min, max)))
}

fn counter(ctx: &ExecutionContext<'_>) -> Result<Outputs, ExecutionError> {
    let initial = ctx.number("initial").unwrap_or(0.0);
    let step = ctx.number("step").unwrap_or(1.0);
    let previous = ctx.previous("count").and_then(Value::as_number);

    let mut count = previous.unwrap_or(initial);
    if ctx.triggered("reset") {
        count = initial;
    }
    if ctx.triggered("increment") {
        count += step;
    }

    let mut outputs = Outputs::new().with("count", count);
    if previous != Some(count) {
        outputs.set("changed", true);
    }
    Ok(outputs)
}

fn random(ctx: &ExecutionContext<'_>) -> Result<Outputs, ExecutionError> {
    // Hold the last value between pulses when a trigger is wired
    if ctx.is_connected("trigger") && !ctx.triggered("trigger") {
        if let Some(previous) = ctx.previous("value") {
            return Ok(Outputs::new().with("value", previous.clone()));
        }
    }

    let min = ctx.number("min").unwrap_or(0.0);
    let max = ctx.number("max").unwrap_or(1.0);
    let unit: f64 = match ctx.number("seed") {
        Some(seed) if seed >= 0.0 => {
            StdRng::seed_from_u64((seed as u64).wrapping_add(ctx.tick())).gen()
        }
        _ => rand::thread_rng().gen(),
    };
    Ok(Outputs::new().with("value", min + unit * (max - min)))
}
