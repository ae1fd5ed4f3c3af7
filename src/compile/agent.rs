use super::RuleContext;
use crate::diagnostics::WarningKind;
use serde_json::{Number, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldType {
    Text,
    Integer,
    Float,
}

/// Descriptor field, Phase-2 key, and the JSON type the field holds.
const VOICE_FIELDS: [(&str, &str, FieldType); 4] = [
    ("voice_id", "voice_id", FieldType::Text),
    ("max_call_duration_ms", "max_call_duration_ms", FieldType::Integer),
    ("interruption_sensitivity", "interruption_sensitivity", FieldType::Float),
    ("agent_name", "agent_display_name", FieldType::Text),
];

const GLOBAL_PROMPT_FIELD: &str = "general_prompt";
const DYNAMIC_VARIABLES_FIELD: &str = "default_dynamic_variables";
const TRANSFER_NODE_TYPE: &str = "transfer_call";
pub const BOOK_TOOL: &str = "book_appointment";
pub const MODIFY_TOOL: &str = "modify_appointment";

fn typed_value(raw: &str, field_type: FieldType) -> Option<Value> {
    let raw = raw.trim();
    match field_type {
        FieldType::Text => Some(Value::String(raw.to_string())),
        FieldType::Integer => raw.parse::<i64>().ok().map(Value::from),
        FieldType::Float => raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
    }
}

/// Only fields already present in the descriptor are updated.
pub fn inject_voice_settings(document: &mut Value, ctx: &mut RuleContext<'_>) {
    let Some(object) = document.as_object_mut() else {
        ctx.missing("top-level object");
        return;
    };
    for (field, key, field_type) in VOICE_FIELDS {
        if !object.contains_key(field) {
            continue;
        }
        let Some(raw) = ctx.inputs.phases.settings.get(key) else {
            continue;
        };
        match typed_value(raw, field_type) {
            Some(value) => {
                object.insert(field.to_string(), value);
            }
            None => ctx.diagnostics.warn(
                WarningKind::Config,
                format!("build_settings.{key}"),
                format!("{raw:?} is not a valid number for {field}; keeping descriptor value"),
            ),
        }
    }
}

pub fn inject_global_prompt(document: &mut Value, ctx: &mut RuleContext<'_>) {
    let Some(slot) = document.get_mut(GLOBAL_PROMPT_FIELD) else {
        ctx.missing(GLOBAL_PROMPT_FIELD);
        return;
    };
    match &ctx.inputs.prompts.primary {
        Some(prompt) => *slot = Value::String(prompt.clone()),
        None => ctx.diagnostics.warn(
            WarningKind::Reference,
            ctx.target.rel_path,
            "no resolved agent prompt is available; keeping descriptor prompt",
        ),
    }
}

pub fn inject_dynamic_variables(document: &mut Value, ctx: &mut RuleContext<'_>) {
    match document.get_mut(DYNAMIC_VARIABLES_FIELD) {
        Some(slot) => *slot = ctx.inputs.phases.runtime.to_json(),
        None => ctx.missing(DYNAMIC_VARIABLES_FIELD),
    }
}

fn tools_mut(document: &mut Value) -> Option<&mut Vec<Value>> {
    document.get_mut("tools").and_then(Value::as_array_mut)
}

/// Point every tool that carries a callback URL at its endpoint.
pub fn inject_tool_callbacks(document: &mut Value, ctx: &mut RuleContext<'_>) {
    let Some(tools) = tools_mut(document) else {
        return;
    };
    for tool in tools.iter_mut() {
        let Some(name) = tool.get("name").and_then(Value::as_str).map(str::to_string) else {
            continue;
        };
        if let Some(url) = tool.get_mut("url") {
            *url = Value::String(ctx.identifiers.identify(&name).url);
        }
    }
}

pub fn inject_transfer_destinations(document: &mut Value, ctx: &mut RuleContext<'_>) {
    let Some(nodes) = document.get_mut("nodes").and_then(Value::as_array_mut) else {
        return;
    };
    let transfer_nodes: Vec<&mut Value> = nodes
        .iter_mut()
        .filter(|node| node.get("type").and_then(Value::as_str) == Some(TRANSFER_NODE_TYPE))
        .collect();
    if transfer_nodes.is_empty() {
        return;
    }
    let Some(number) = ctx.inputs.phases.settings.get("transfer_number") else {
        ctx.diagnostics.warn(
            WarningKind::Config,
            "build_settings.infrastructure.transfer_number",
            "transfer nodes present but no transfer number configured",
        );
        return;
    };
    for node in transfer_nodes {
        match node
            .get_mut("transfer_destination")
            .and_then(Value::as_object_mut)
        {
            Some(destination) => {
                destination.insert("number".to_string(), Value::String(number.to_string()));
            }
            None => ctx.diagnostics.warn(
                WarningKind::Reference,
                ctx.target.rel_path,
                "transfer node has no transfer_destination object",
            ),
        }
    }
}

/// Replace the booking and modification tool parameters with generated schemas.
pub fn inject_service_schemas(document: &mut Value, ctx: &mut RuleContext<'_>) {
    let services = ctx.inputs.services;
    if services.services.is_empty() {
        return;
    }
    let Some(tools) = tools_mut(document) else {
        ctx.missing("tools list");
        return;
    };
    for (tool_name, schema) in [
        (BOOK_TOOL, &services.appointment_schema),
        (MODIFY_TOOL, &services.modify_schema),
    ] {
        let tool = tools
            .iter_mut()
            .find(|tool| tool.get("name").and_then(Value::as_str) == Some(tool_name));
        match tool.and_then(Value::as_object_mut) {
            Some(tool) => {
                tool.insert("parameters".to_string(), schema.clone());
            }
            None => ctx.missing(&format!("tool {tool_name}")),
        }
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
