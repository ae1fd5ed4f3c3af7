//! Injection registry: `(selector, injector)` pairs per descriptor kind.
//!
//! Adding a new injection target means adding one rule to a table here; the
//! compile driver never changes.
use super::{agent, workflow, ArtifactKind, CompileInputs};
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::identifiers::IdentifierGenerator;
use serde_json::Value;

/// What a selector gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    pub rel_path: &'a str,
    pub stem: &'a str,
}

/// Everything an injector may read or record into.
pub struct RuleContext<'a> {
    pub target: &'a Target<'a>,
    pub inputs: &'a CompileInputs<'a>,
    pub identifiers: &'a mut IdentifierGenerator,
    pub diagnostics: &'a mut Diagnostics,
}

impl RuleContext<'_> {
    /// Record that a named target is absent from this descriptor.
    pub fn missing(&mut self, what: &str) {
        self.diagnostics.warn(
            WarningKind::Reference,
            self.target.rel_path,
            format!("{what} not found; leaving descriptor unchanged there"),
        );
    }
}

pub struct InjectionRule {
    pub name: &'static str,
    pub selects: fn(&Target<'_>) -> bool,
    pub inject: fn(&mut Value, &mut RuleContext<'_>),
}

fn always(_: &Target<'_>) -> bool {
    true
}

static AGENT_RULES: [InjectionRule; 6] = [
    InjectionRule {
        name: "voice settings",
        selects: always,
        inject: agent::inject_voice_settings,
    },
    InjectionRule {
        name: "global prompt",
        selects: always,
        inject: agent::inject_global_prompt,
    },
    InjectionRule {
        name: "dynamic variables",
        selects: always,
        inject: agent::inject_dynamic_variables,
    },
    InjectionRule {
        name: "tool callbacks",
        selects: always,
        inject: agent::inject_tool_callbacks,
    },
    InjectionRule {
        name: "transfer destinations",
        selects: always,
        inject: agent::inject_transfer_destinations,
    },
    InjectionRule {
        name: "service schemas",
        selects: always,
        inject: agent::inject_service_schemas,
    },
];

static WORKFLOW_RULES: [InjectionRule; 3] = [
    InjectionRule {
        name: "knowledge agent prompt",
        selects: workflow::is_knowledge_workflow,
        inject: workflow::inject_knowledge_prompt,
    },
    InjectionRule {
        name: "service script maps",
        selects: workflow::is_service_workflow,
        inject: workflow::inject_service_maps,
    },
    InjectionRule {
        name: "webhook trigger",
        selects: always,
        inject: workflow::inject_webhook_trigger,
    },
];

/// Rules for a descriptor kind; content artifacts have none.
pub fn rules_for(kind: ArtifactKind) -> &'static [InjectionRule] {
    match kind {
        ArtifactKind::Agent => &AGENT_RULES,
        ArtifactKind::Workflow => &WORKFLOW_RULES,
        ArtifactKind::Content(_) => &[],
    }
}

/// Apply every selected rule, in table order.
pub fn apply_rules(kind: ArtifactKind, document: &mut Value, ctx: &mut RuleContext<'_>) {
    for rule in rules_for(kind) {
        if !(rule.selects)(ctx.target) {
            continue;
        }
        tracing::debug!(rule = rule.name, target = ctx.target.rel_path, "applying injection rule");
        (rule.inject)(document, ctx);
    }
}
