use super::{RuleContext, Target};
use crate::diagnostics::WarningKind;
use crate::identifiers::tool_key;
use crate::services::{column_map, required_properties_map, service_map};
use crate::util::snake_to_title;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::sync::OnceLock;

pub const KNOWLEDGE_WORKFLOW: &str = "answer_question";
pub const KNOWLEDGE_NODE_NAME: &str = "Knowledge Agent";
pub const KNOWLEDGE_NODE_TYPE: &str = "@n8n/n8n-nodes-langchain.agent";
pub const SERVICE_WORKFLOWS: [&str; 3] = ["book_appointment", "modify_appointment", "log_call"];
pub const WEBHOOK_NODE_TYPE: &str = "n8n-nodes-base.webhook";
const CODE_NODE_TYPE: &str = "n8n-nodes-base.code";

pub fn is_knowledge_workflow(target: &Target<'_>) -> bool {
    tool_key(target.stem) == KNOWLEDGE_WORKFLOW
}

pub fn is_service_workflow(target: &Target<'_>) -> bool {
    SERVICE_WORKFLOWS.contains(&tool_key(target.stem).as_str())
}

fn nodes_mut(document: &mut Value) -> Option<&mut Vec<Value>> {
    document.get_mut("nodes").and_then(Value::as_array_mut)
}

fn node_field<'v>(node: &'v Value, field: &str) -> Option<&'v str> {
    node.get(field).and_then(Value::as_str)
}

/// Ensure `value[key]` is an object and return it.
fn object_entry<'v>(value: &'v mut Map<String, Value>, key: &str) -> Option<&'v mut Map<String, Value>> {
    let entry = value
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    entry.as_object_mut()
}

pub fn inject_knowledge_prompt(document: &mut Value, ctx: &mut RuleContext<'_>) {
    let node = nodes_mut(document).and_then(|nodes| {
        nodes.iter_mut().find(|node| {
            node_field(node, "name") == Some(KNOWLEDGE_NODE_NAME)
                && node_field(node, "type") == Some(KNOWLEDGE_NODE_TYPE)
        })
    });
    let Some(node) = node.and_then(Value::as_object_mut) else {
        ctx.missing(&format!("node {KNOWLEDGE_NODE_NAME:?}"));
        return;
    };
    let Some(prompt) = &ctx.inputs.prompts.secondary else {
        ctx.diagnostics.warn(
            WarningKind::Reference,
            ctx.target.rel_path,
            "no resolved knowledge prompt is available; keeping node system message",
        );
        return;
    };
    if let Some(options) = object_entry(node, "parameters").and_then(|p| object_entry(p, "options")) {
        options.insert("systemMessage".to_string(), Value::String(prompt.clone()));
    }
}

fn script_regex(name: &str) -> Regex {
    Regex::new(&format!(r"(?s)(const\s+{name}\s*=\s*)\{{.*?\}}(\s*;)"))
        .expect("regex for script constants")
}

fn script_regexes() -> &'static [(&'static str, Regex); 3] {
    static SCRIPT_CONSTANTS: OnceLock<[(&'static str, Regex); 3]> = OnceLock::new();
    SCRIPT_CONSTANTS.get_or_init(|| {
        [
            ("SERVICE_MAP", script_regex("SERVICE_MAP")),
            ("REQUIRED_PROPERTIES", script_regex("REQUIRED_PROPERTIES")),
            ("COLUMN_MAP", script_regex("COLUMN_MAP")),
        ]
    })
}

/// Rewrite `const SERVICE_MAP = {...};` style literals in code nodes.
/// Returns how many literals were replaced.
pub fn rewrite_script(code: &str, maps: &[(&str, String)]) -> (String, usize) {
    let mut replaced = 0;
    let mut code = code.to_string();
    for (name, regex) in script_regexes() {
        let Some((_, literal)) = maps.iter().find(|(key, _)| key == name) else {
            continue;
        };
        let next = regex.replace_all(&code, |caps: &Captures| {
            replaced += 1;
            format!("{}{}{}", &caps[1], literal, &caps[2])
        });
        code = next.into_owned();
    }
    (code, replaced)
}

pub fn inject_service_maps(document: &mut Value, ctx: &mut RuleContext<'_>) {
    let services = &ctx.inputs.services.services;
    let maps = [
        ("SERVICE_MAP", service_map(services).to_string()),
        ("REQUIRED_PROPERTIES", required_properties_map(services).to_string()),
        ("COLUMN_MAP", column_map(services).to_string()),
    ];
    let mut replaced = 0;
    for node in nodes_mut(document).into_iter().flatten() {
        if node_field(node, "type") != Some(CODE_NODE_TYPE) {
            continue;
        }
        let Some(code) = node.pointer_mut("/parameters/jsCode") else {
            continue;
        };
        let Some(source) = code.as_str() else {
            continue;
        };
        let (rewritten, count) = rewrite_script(source, &maps);
        if count > 0 {
            *code = Value::String(rewritten);
            replaced += count;
        }
    }
    if replaced == 0 {
        ctx.missing("service map literals in code nodes");
    }
}

/// Set the trigger path and give the node a canonical name, migrating
/// connection references to the new name.
pub fn inject_webhook_trigger(document: &mut Value, ctx: &mut RuleContext<'_>) {
    let tool = tool_key(ctx.target.stem);
    let new_name = format!("{} Webhook", snake_to_title(&tool));

    let Some(nodes) = nodes_mut(document) else {
        ctx.missing("nodes list");
        return;
    };
    let mut webhooks: Vec<&mut Value> = nodes
        .iter_mut()
        .filter(|node| node_field(node, "type") == Some(WEBHOOK_NODE_TYPE))
        .collect();
    if webhooks.is_empty() {
        ctx.missing("webhook trigger node");
        return;
    }
    let path = ctx.identifiers.identify(&tool).path();
    for node in webhooks.iter_mut() {
        if let Some(parameters) = node.as_object_mut().and_then(|n| object_entry(n, "parameters")) {
            parameters.insert("path".to_string(), Value::String(path.clone()));
        }
    }
    if webhooks.len() > 1 {
        ctx.diagnostics.warn(
            WarningKind::Reference,
            ctx.target.rel_path,
            format!(
                "{} webhook trigger nodes; paths rewritten but names left unchanged",
                webhooks.len()
            ),
        );
        return;
    }
    let old_name = node_field(webhooks[0], "name").map(str::to_string);
    if old_name.as_deref() == Some(new_name.as_str()) {
        return;
    }
    let name_taken = nodes
        .iter()
        .any(|node| node_field(node, "name") == Some(new_name.as_str()));
    if name_taken {
        ctx.diagnostics.warn(
            WarningKind::Reference,
            ctx.target.rel_path,
            format!("another node is already named {new_name:?}; webhook not renamed"),
        );
        return;
    }
    let Some(old_name) = old_name else {
        // nothing can reference an unnamed node
        let trigger = nodes
            .iter_mut()
            .find(|node| node_field(node, "type") == Some(WEBHOOK_NODE_TYPE))
            .and_then(Value::as_object_mut);
        if let Some(node) = trigger {
            node.insert("name".to_string(), Value::String(new_name));
        }
        return;
    };
    for node in nodes.iter_mut() {
        if node_field(node, "name") == Some(old_name.as_str()) {
            if let Some(node) = node.as_object_mut() {
                node.insert("name".to_string(), Value::String(new_name.clone()));
            }
        }
    }
    if let Some(connections) = document.get_mut("connections") {
        rename_connections(connections, &old_name, &new_name);
    }
}

/// Rename a node in an n8n connection table: both the source key and every
/// `{ "node": ... }` destination, keeping key order.
pub fn rename_connections(connections: &mut Value, old_name: &str, new_name: &str) {
    let Some(table) = connections.as_object_mut() else {
        return;
    };
    if table.contains_key(old_name) {
        let migrated: Map<String, Value> = std::mem::take(table)
            .into_iter()
            .map(|(key, value)| {
                if key == old_name {
                    (new_name.to_string(), value)
                } else {
                    (key, value)
                }
            })
            .collect();
        *table = migrated;
    }
    rename_node_refs(connections, old_name, new_name);
}

fn rename_node_refs(value: &mut Value, old_name: &str, new_name: &str) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if key == "node" && child.as_str() == Some(old_name) {
                    *child = Value::String(new_name.to_string());
                } else {
                    rename_node_refs(child, old_name, new_name);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                rename_node_refs(item, old_name, new_name);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
