// SPDX-License-Identifier: MIT OR Apache-2.0
//! String nodes.
//!
//! Unset text inputs read as the empty string. Indices count characters,
//! not bytes.

use patchflow_graph::{Control, NodeCatalog, NodeCategory, NodeDefinition, Port, PortType, Value};
use patchflow_runtime::{ExecutionContext, ExecutionError, ExecutorRegistry, Outputs};
use regex::Regex;

/// Message on `_error` when a replace pattern does not compile
pub const INVALID_REGEX: &str = "Invalid regex pattern";

/// Register the string package
pub fn register(catalog: &mut NodeCatalog, executors: &mut ExecutorRegistry) {
    catalog.register(NodeDefinition {
        id: "string.concat".to_string(),
        name: "Concatenate".to_string(),
        category: NodeCategory::String,
        description: "Join non-empty inputs with a separator".to_string(),
        inputs: vec![
            Port::input("a", PortType::String),
            Port::input("b", PortType::String),
            Port::input("c", PortType::String),
            Port::input("d", PortType::String),
            Port::input("separator", PortType::String),
        ],
        outputs: vec![Port::output("result", PortType::String)],
        controls: vec![Control::new("separator", "")],
    });
    executors.register("string.concat", concat);

    catalog.register(NodeDefinition {
        id: "string.split".to_string(),
        name: "Split".to_string(),
        category: NodeCategory::String,
        description: "Split text on a separator; an empty separator yields the whole input"
            .to_string(),
        inputs: vec![
            Port::input("input", PortType::String),
            Port::input("separator", PortType::String),
        ],
        outputs: vec![
            Port::output("parts", PortType::Data),
            Port::output("first", PortType::String),
            Port::output("count", PortType::Number),
        ],
        controls: vec![Control::new("separator", ",")],
    });
    executors.register("string.split", split);

    catalog.register(NodeDefinition {
        id: "string.slice".to_string(),
        name: "Slice".to_string(),
        category: NodeCategory::String,
        description: "Characters from start up to end; end -1 runs through the end".to_string(),
        inputs: vec![
            Port::input("input", PortType::String),
            Port::input("start", PortType::Number),
            Port::input("end", PortType::Number),
        ],
        outputs: vec![
            Port::output("result", PortType::String),
            Port::output("length", PortType::Number),
        ],
        controls: vec![Control::new("start", 0.0), Control::new("end", -1.0)],
    });
    executors.register("string.slice", slice);

    catalog.register(NodeDefinition {
        id: "string.replace".to_string(),
        name: "Replace".to_string(),
        category: NodeCategory::String,
        description: "Replace text or a regex match".to_string(),
        inputs: vec![
            Port::input("input", PortType::String),
            Port::input("search", PortType::String),
            Port::input("replace", PortType::String),
        ],
        outputs: vec![
            Port::output("result", PortType::String),
            Port::output("_error", PortType::String),
        ],
        controls: vec![
            Control::new("search", ""),
            Control::new("replace", ""),
            Control::new("useRegex", false),
            Control::new("replaceAll", true),
        ],
    });
    executors.register("string.replace", replace);

    catalog.register(NodeDefinition {
        id: "string.length".to_string(),
        name: "Length".to_string(),
        category: NodeCategory::String,
        description: "Number of characters".to_string(),
        inputs: vec![Port::input("input", PortType::String)],
        outputs: vec![Port::output("length", PortType::Number)],
        controls: vec![],
    });
    executors.register_fn("string.length", |ctx| {
        Ok(Outputs::new().with("length", text(ctx, "input").chars().count() as f64))
    });

    catalog.register(NodeDefinition {
        id: "string.case".to_string(),
        name: "Change Case".to_string(),
        category: NodeCategory::String,
        description: "upper, lower or title case".to_string(),
        inputs: vec![Port::input("input", PortType::String)],
        outputs: vec![Port::output("result", PortType::String)],
        controls: vec![Control::new("mode", "upper")],
    });
    executors.register("string.case", change_case);

    catalog.register(NodeDefinition {
        id: "string.trim".to_string(),
        name: "Trim".to_string(),
        category: NodeCategory::String,
        description: "Strip leading and trailing whitespace".to_string(),
        inputs: vec![Port::input("input", PortType::String)],
        outputs: vec![Port::output("result", PortType::String)],
        controls: vec![],
    });
    executors.register_fn("string.trim", |ctx| {
        Ok(Outputs::new().with("result", text(ctx, "input").trim()))
    });
}

fn text(ctx: &ExecutionContext<'_>, id: &str) -> String {
    ctx.text(id).unwrap_or_default()
}

fn concat(ctx: &ExecutionContext<'_>) -> Result<Outputs, ExecutionError> {
    let separator = text(ctx, "separator");
    let parts: Vec<String> = ["a", "b", "c", "d"]
        .into_iter()
        .map(|id| text(ctx, id))
        .filter(|part| !part.is_empty())
        .collect();
    Ok(Outputs::new().with("result", parts.join(&separator)))
}

fn split(ctx: &ExecutionContext<'_>) -> Result<Outputs, ExecutionError> {
    let input = text(ctx, "input");
    let separator = text(ctx, "separator");

    let parts: Vec<Value> = if input.is_empty() {
        Vec::new()
    } else if separator.is_empty() {
        vec![Value::String(input)]
    } else {
        input.split(separator.as_str()).map(Value::from).collect()
    };

    let first = parts.first().map(Value::to_text).unwrap_or_default();
    let count = parts.len() as f64;
    Ok(Outputs::new()
        .with("parts", Value::list(parts))
        .with("first", first)
        .with("count", count))
}

/// Resolve a possibly negative character index against `len`
fn resolve_index(index: f64, len: usize) -> usize {
    let index = index.trunc();
    if index < 0.0 {
        len.saturating_sub((-index) as usize)
    } else {
        (index as usize).min(len)
    }
}

fn slice(ctx: &ExecutionContext<'_>) -> Result<Outputs, ExecutionError> {
    let input = text(ctx, "input");
    let chars: Vec<char> = input.chars().collect();
    let len = chars.len();

    let start = resolve_index(ctx.number("start").unwrap_or(0.0), len);
    let end = match ctx.number("end") {
        Some(end) if end != -1.0 => resolve_index(end, len),
        _ => len,
    };

    let result: String = if start < end {
        chars[start..end].iter().collect()
    } else {
        String::new()
    };
    let length = result.chars().count() as f64;
    Ok(Outputs::new().with("result", result).with("length", length))
}

fn replace(ctx: &ExecutionContext<'_>) -> Result<Outputs, ExecutionError> {
    let input = text(ctx, "input");
    let search = text(ctx, "search");
    let replacement = text(ctx, "replace");
    let use_regex = ctx.flag("useRegex").unwrap_or(false);
    let replace_all = ctx.flag("replaceAll").unwrap_or(true);

    if search.is_empty() {
        return Ok(Outputs::new().with("result", input));
    }

    let result = if use_regex {
        let pattern = match Regex::new(&search) {
            Ok(pattern) => pattern,
            Err(err) => {
                tracing::debug!("Rejected replace pattern {search:?}: {err}");
                return Ok(Outputs::new().with("result", input).with_soft_error(INVALID_REGEX));
            }
        };
        if replace_all {
            pattern.replace_all(&input, replacement.as_str()).into_owned()
        } else {
            pattern.replace(&input, replacement.as_str()).into_owned()
        }
    } else if replace_all {
        input.replace(&search, &replacement)
    } else {
        input.replacen(&search, &replacement, 1)
    };
    Ok(Outputs::new().with("result", result))
}

fn change_case(ctx: &ExecutionContext<'_>) -> Result<Outputs, ExecutionError> {
    let input = text(ctx, "input");
    let mode = text(ctx, "mode");
    let result = match mode.as_str() {
        "lower" => input.to_lowercase(),
        "title" => title_case(&input),
        "upper" => input.to_uppercase(),
        other => {
            return Ok(Outputs::new()
                .with("result", input)
                .with_soft_error(format!("Unknown case mode: {other}")));
        }
    };
    Ok(Outputs::new().with("result", result))
}

fn title_case(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut at_word_start = true;
    for c in input.chars() {
        if c.is_whitespace() {
            at_word_start = true;
            result.push(c);
        } else if at_word_start {
            at_word_start = false;
            result.extend(c.to_uppercase());
        } else {
            result.extend(c.to_lowercase());
        }
    }
    result
}
