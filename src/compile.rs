//! Artifact compilation.
//!
//! Every source file is routed to exactly one strategy by its relative path.
//! JSON descriptors go through the injection registry; everything else goes
//! through placeholder substitution under a policy chosen by content class.
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::identifiers::IdentifierGenerator;
use crate::placeholder::substitute;
use crate::services::ServiceArtifacts;
use crate::variables::PhaseVariables;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::Path;

mod agent;
mod content;
mod registry;
mod workflow;

pub use registry::{RuleContext, Target};

/// Prompt file whose resolved text becomes the agent's global prompt.
pub const PRIMARY_PROMPT_MARKER: &str = "agent-prompt";
/// Prompt file whose resolved text becomes the knowledge workflow's system message.
pub const SECONDARY_PROMPT_MARKER: &str = "knowledge-prompt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentClass {
    /// Only the properties guide is resolved; runtime placeholders survive.
    Prompt,
    /// Every known placeholder is resolved.
    Document,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "class")]
pub enum ArtifactKind {
    Agent,
    Workflow,
    Content(ContentClass),
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Agent => "agent",
            ArtifactKind::Workflow => "workflow",
            ArtifactKind::Content(ContentClass::Prompt) => "prompt",
            ArtifactKind::Content(ContentClass::Document) => "content",
        }
    }

    pub fn is_prompt(&self) -> bool {
        matches!(self, ArtifactKind::Content(ContentClass::Prompt))
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Route a `/`-separated relative path to its strategy. First match wins.
pub fn classify(rel_path: &str) -> ArtifactKind {
    let is_json = rel_path.ends_with(".json");
    if is_json && rel_path.contains("agents/") {
        ArtifactKind::Agent
    } else if is_json && rel_path.contains("workflows/") {
        ArtifactKind::Workflow
    } else if rel_path.contains("prompts/") {
        ArtifactKind::Content(ContentClass::Prompt)
    } else {
        ArtifactKind::Content(ContentClass::Document)
    }
}

/// One source file on its way to one output file.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub kind: ArtifactKind,
    /// Path relative to the source root, `/`-separated.
    pub source_path: String,
    /// Path relative to the output root after filename substitution.
    pub output_path: String,
    pub raw: Vec<u8>,
    pub resolved: Option<Vec<u8>>,
}

impl Artifact {
    pub fn new(source_path: &str, raw: Vec<u8>) -> Self {
        Self {
            kind: classify(source_path),
            source_path: source_path.to_string(),
            output_path: source_path.to_string(),
            raw,
            resolved: None,
        }
    }

    /// File stem of the source, e.g. `book_appointment` for
    /// `workflows/book_appointment.json`.
    pub fn stem(&self) -> String {
        Path::new(&self.source_path)
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn file_name(&self) -> String {
        Path::new(&self.source_path)
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Output bytes; the raw bytes until a strategy has run.
    pub fn output_bytes(&self) -> &[u8] {
        self.resolved.as_deref().unwrap_or(&self.raw)
    }
}

/// Prompt text resolved in the first pass, carried by value into the second.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPrompts {
    pub primary: Option<String>,
    pub secondary: Option<String>,
}

impl ResolvedPrompts {
    /// Collect primary and secondary prompts from compiled prompt artifacts.
    pub fn collect<'a>(
        artifacts: impl IntoIterator<Item = &'a Artifact>,
        diagnostics: &mut Diagnostics,
    ) -> Self {
        let mut prompts = ResolvedPrompts::default();
        for artifact in artifacts.into_iter().filter(|a| a.kind.is_prompt()) {
            let name = artifact.file_name();
            let slot = if name.contains(PRIMARY_PROMPT_MARKER) {
                &mut prompts.primary
            } else if name.contains(SECONDARY_PROMPT_MARKER) {
                &mut prompts.secondary
            } else {
                continue;
            };
            if slot.is_some() {
                diagnostics.warn(
                    WarningKind::Reference,
                    &artifact.source_path,
                    "another prompt already fills this slot; ignoring this one",
                );
                continue;
            }
            *slot = Some(String::from_utf8_lossy(artifact.output_bytes()).into_owned());
        }
        prompts
    }
}

/// Read-only values every strategy may consult.
#[derive(Debug, Clone, Copy)]
pub struct CompileInputs<'a> {
    pub phases: &'a PhaseVariables,
    pub services: &'a ServiceArtifacts,
    pub prompts: &'a ResolvedPrompts,
}

/// Substitute Phase-1 placeholders in a relative output path.
pub fn output_path(source_path: &str, phases: &PhaseVariables, diagnostics: &mut Diagnostics) -> String {
    let substituted = substitute(source_path, |key| phases.identity.get(key));
    if !substituted.unresolved.is_empty() {
        diagnostics.warn(
            WarningKind::Reference,
            source_path,
            format!(
                "file name placeholders left unresolved: {}",
                substituted.unresolved.into_iter().collect::<Vec<_>>().join(", ")
            ),
        );
    }
    substituted.text
}

/// Run the strategy matching the artifact's kind, filling `resolved`. The
/// output path is expected to be placed already.
pub fn compile_artifact(
    artifact: &mut Artifact,
    inputs: &CompileInputs<'_>,
    identifiers: &mut IdentifierGenerator,
    diagnostics: &mut Diagnostics,
) {
    let resolved = match artifact.kind {
        ArtifactKind::Agent | ArtifactKind::Workflow => {
            compile_descriptor(artifact, inputs, identifiers, diagnostics)
        }
        ArtifactKind::Content(class) => content::compile_content(
            &artifact.source_path,
            &artifact.raw,
            class,
            inputs.phases,
            diagnostics,
        ),
    };
    tracing::debug!(
        source = %artifact.source_path,
        output = %artifact.output_path,
        kind = artifact.kind.as_str(),
        bytes = resolved.len(),
        "artifact compiled"
    );
    artifact.resolved = Some(resolved);
}

/// Parse, run the registry, and re-serialize. Malformed input is emitted
/// unchanged with a parse warning.
fn compile_descriptor(
    artifact: &Artifact,
    inputs: &CompileInputs<'_>,
    identifiers: &mut IdentifierGenerator,
    diagnostics: &mut Diagnostics,
) -> Vec<u8> {
    let parsed = std::str::from_utf8(&artifact.raw)
        .map_err(|err| err.to_string())
        .and_then(|text| serde_json::from_str::<Value>(text).map_err(|err| err.to_string()));
    let mut document = match parsed {
        Ok(document) => document,
        Err(err) => {
            diagnostics.warn(
                WarningKind::Parse,
                &artifact.source_path,
                format!("not valid JSON ({err}); emitting source unchanged"),
            );
            return artifact.raw.clone();
        }
    };

    let stem = artifact.stem();
    let target = Target {
        rel_path: &artifact.source_path,
        stem: &stem,
    };
    let mut ctx = RuleContext {
        target: &target,
        inputs,
        identifiers,
        diagnostics,
    };
    registry::apply_rules(artifact.kind, &mut document, &mut ctx);

    match serde_json::to_vec_pretty(&document) {
        Ok(mut bytes) => {
            bytes.push(b'\n');
            bytes
        }
        Err(err) => {
            ctx.diagnostics.warn(
                WarningKind::Parse,
                &artifact.source_path,
                format!("could not serialize compiled JSON ({err}); emitting source unchanged"),
            );
            artifact.raw.clone()
        }
    }
}

#[cfg(test)]
#[path = "compile/test_support.rs"]
mod test_support;

#[cfg(test)]
#[path = "compile/compile_tests.rs"]
mod tests;
