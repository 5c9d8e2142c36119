// SPDX-License-Identifier: MIT OR Apache-2.0
//! Logic and trigger nodes.

use patchflow_graph::{Control, NodeCatalog, NodeCategory, NodeDefinition, Port, PortType, Value};
use patchflow_runtime::{ExecutionContext, ExecutionError, ExecutorRegistry, Outputs};

/// Register the logic package
pub fn register(catalog: &mut NodeCatalog, executors: &mut ExecutorRegistry) {
    catalog.register(NodeDefinition {
        id: "logic.compare".to_string(),
        name: "Compare".to_string(),
        category: NodeCategory::Logic,
        description: "Compare two values with ==, !=, <, <=, > or >=".to_string(),
        inputs: vec![Port::input("a", PortType::Any), Port::input("b", PortType::Any)],
        outputs: vec![Port::output("result", PortType::Bool)],
        controls: vec![
            Control::new("a", 0.0),
            Control::new("b", 0.0),
            Control::new("operator", "=="),
        ],
    });
    executors.register("logic.compare", compare);

    catalog.register(NodeDefinition {
        id: "logic.pulse".to_string(),
        name: "Pulse".to_string(),
        category: NodeCategory::Logic,
        description: "Fires every `interval` ticks, starting on the first".to_string(),
        inputs: vec![Port::input("enabled", PortType::Bool)],
        outputs: vec![Port::output("fired", PortType::Trigger)],
        controls: vec![Control::new("interval", 1.0), Control::new("enabled", true)],
    });
    executors.register("logic.pulse", pulse);

    catalog.register(NodeDefinition {
        id: "logic.gate".to_string(),
        name: "Gate".to_string(),
        category: NodeCategory::Logic,
        description: "Passes a trigger through while open".to_string(),
        inputs: vec![
            Port::input("trigger", PortType::Trigger),
            Port::input("open", PortType::Bool),
        ],
        outputs: vec![Port::output("fired", PortType::Trigger)],
        controls: vec![Control::new("open", true)],
    });
    executors.register("logic.gate", gate);
}

fn compare(ctx: &ExecutionContext<'_>) -> Result<Outputs, ExecutionError> {
    let (Some(a), Some(b)) = (ctx.input_or_control("a"), ctx.input_or_control("b")) else {
        return Ok(Outputs::new().with("result", false));
    };
    let operator = ctx.text("operator").unwrap_or_else(|| "==".to_string());

    // Numbers compare numerically, anything else by text
    let ordering = match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) if !matches!(a, Value::String(_)) && !matches!(b, Value::String(_)) => {
            x.partial_cmp(&y)
        }
        _ => Some(a.to_text().cmp(&b.to_text())),
    };
    let Some(ordering) = ordering else {
        return Ok(Outputs::new().with("result", operator == "!="));
    };

    let result = match operator.as_str() {
        "==" => ordering.is_eq(),
        "!=" => ordering.is_ne(),
        "<" => ordering.is_lt(),
        "<=" => ordering.is_le(),
        ">" => ordering.is_gt(),
        ">=" => ordering.is_ge(),
        other => {
            return Err(ExecutionError::new(format!("Unknown comparison operator: {other}"))
                .with_id("E_OPERATOR"));
        }
    };
    Ok(Outputs::new().with("result", result))
}

fn pulse(ctx: &ExecutionContext<'_>) -> Result<Outputs, ExecutionError> {
    if !ctx.flag("enabled").unwrap_or(true) {
        return Ok(Outputs::new());
    }
    let interval = ctx.number("interval").unwrap_or(1.0).max(1.0) as u64;
    if ctx.tick().saturating_sub(1) % interval == 0 {
        Ok(Outputs::new().with("fired", true))
    } else {
        Ok(Outputs::new())
    }
}

fn gate(ctx: &ExecutionContext<'_>) -> Result<Outputs, ExecutionError> {
    if ctx.triggered("trigger") && ctx.flag("open").unwrap_or(true) {
        Ok(Outputs::new().with("fired", true))
    } else {
        Ok(Outputs::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::Harness;
    use patchflow_runtime::ContextBuilder;

    fn compare_with(
        a: impl Into<Value>,
        b: impl Into<Value>,
        operator: &str,
    ) -> Result<Outputs, ExecutionError> {
        ContextBuilder::new("logic.compare")
            .input("a", a)
            .input("b", b)
            .control("operator", operator)
            .run(&compare)
    }

    #[test]
    fn test_compare_numbers_and_text() {
        assert_eq!(compare_with(2.0, 10.0, "<").unwrap().get("result"), Some(&Value::Bool(true)));
        // Text compares lexically
        assert_eq!(compare_with("2", "10", "<").unwrap().get("result"), Some(&Value::Bool(false)));
        assert_eq!(compare_with(true, 1.0, "==").unwrap().get("result"), Some(&Value::Bool(true)));
        assert_eq!(
            compare_with(f64::NAN, 1.0, "!=").unwrap().get("result"),
            Some(&Value::Bool(true))
        );
    }

    #[test]
    fn test_compare_unknown_operator_fails() {
        let err = compare_with(1.0, 1.0, "<=>").unwrap_err();
        assert_eq!(err.error_id.as_deref(), Some("E_OPERATOR"));
    }

    #[test]
    fn test_pulse_interval() {
        let fired: Vec<bool> = (1..=6)
            .map(|tick| {
                ContextBuilder::new("logic.pulse")
                    .control("interval", 3.0)
                    .tick(tick)
                    .run(&pulse)
                    .unwrap()
                    .get("fired")
                    .is_some()
            })
            .collect();
        assert_eq!(fired, vec![true, false, false, true, false, false]);
    }

    #[test]
    fn test_gate_blocks_when_closed() {
        let closed = ContextBuilder::new("logic.gate")
            .input("trigger", true)
            .input("open", false)
            .run(&gate)
            .unwrap();
        assert!(closed.is_empty());
    }

    #[test]
    fn test_trigger_auto_resets_through_graph() {
        let mut harness = Harness::new();
        let pulse = harness.add("logic.pulse");
        harness.control(pulse, "interval", 2.0);
        let gate = harness.add("logic.gate");
        harness.connect(pulse, "fired", gate, "trigger");
        let mut engine = harness.engine();

        let fired: Vec<bool> = (0..4)
            .map(|_| {
                engine.tick().unwrap();
                engine.output(gate, "fired").is_some()
            })
            .collect();
        assert_eq!(fired, vec![true, false, true, false]);
    }

    #[test]
    fn test_counter_feedback_loop_lags_one_tick() {
        // counter.changed -> gate -> counter.increment
        let mut harness = Harness::new();
        let counter = harness.add("math.counter");
        let gate = harness.add("logic.gate");
        harness.connect(counter, "changed", gate, "trigger");
        harness.connect(gate, "fired", counter, "increment");
        let mut engine = harness.engine();

        // Tick 1: the gate has not run yet, so the counter sees nothing
        let report = engine.tick().unwrap();
        assert!(report.is_clean());
        assert_eq!(report.evaluated, vec![counter, gate]);
        assert_eq!(engine.output(counter, "count"), Some(&Value::Number(0.0)));
        assert!(engine.output(gate, "fired").is_some());

        // Each later tick sees the gate's pulse from the tick before
        for tick in 2..=5u32 {
            engine.tick().unwrap();
            assert_eq!(engine.output(counter, "count"), Some(&Value::Number(f64::from(tick - 1))));
        }
    }
}
