use super::{compile_artifact, output_path, Artifact, CompileInputs, ResolvedPrompts};
use crate::config::{default_document, from_document, SECTION_CLIENT_DATA};
use crate::diagnostics::Diagnostics;
use crate::identifiers::IdentifierGenerator;
use crate::services::{parse_services, ConstraintSet, ServiceArtifacts};
use crate::variables::PhaseVariables;
use serde_json::Value;

pub const BUILD_DATE: &str = "2026-01-02T03:04:05Z";
pub const PRIMARY: &str = "Primary prompt for {{caller_name}}";
pub const SECONDARY: &str = "Knowledge prompt";

/// Everything resolved from the built-in default document.
pub struct Fixture {
    pub phases: PhaseVariables,
    pub services: ServiceArtifacts,
    pub prompts: ResolvedPrompts,
    pub identifiers: IdentifierGenerator,
    pub diagnostics: Diagnostics,
}

pub fn fixture() -> Fixture {
    fixture_from(default_document().expect("default document"))
}

fn no_env(_: &str) -> Option<String> {
    None
}

pub fn fixture_from(document: Value) -> Fixture {
    let mut diagnostics = Diagnostics::new();
    let config = from_document(document, &no_env, &mut diagnostics).expect("config");
    let raw = config
        .section(SECTION_CLIENT_DATA)
        .get("services")
        .cloned()
        .unwrap_or(Value::Null);
    let services = ServiceArtifacts::generate(parse_services(&raw).expect("services"), &ConstraintSet::default())
        .expect("valid services");
    let phases = PhaseVariables::resolve(&config, &services, BUILD_DATE, &mut diagnostics);
    let settings = phases.hash_settings(&mut diagnostics).expect("hash settings");
    let identifiers = IdentifierGenerator::new(
        phases.business_name(),
        phases.settings.get("webhook_base_url").unwrap_or_default(),
        settings,
    );
    Fixture {
        phases,
        services,
        prompts: ResolvedPrompts {
            primary: Some(PRIMARY.to_string()),
            secondary: Some(SECONDARY.to_string()),
        },
        identifiers,
        diagnostics: Diagnostics::new(),
    }
}

impl Fixture {
    pub fn compile(&mut self, source_path: &str, raw: &[u8]) -> Artifact {
        let mut artifact = Artifact::new(source_path, raw.to_vec());
        artifact.output_path = output_path(source_path, &self.phases, &mut self.diagnostics);
        let inputs = CompileInputs {
            phases: &self.phases,
            services: &self.services,
            prompts: &self.prompts,
        };
        compile_artifact(&mut artifact, &inputs, &mut self.identifiers, &mut self.diagnostics);
        artifact
    }

    pub fn compile_json(&mut self, source_path: &str, document: &Value) -> Value {
        let raw = serde_json::to_vec_pretty(document).expect("serialize");
        let artifact = self.compile(source_path, &raw);
        serde_json::from_slice(artifact.output_bytes()).expect("compiled JSON")
    }
}
