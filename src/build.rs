//! Build orchestration.
//!
//! Everything that can fail fatally (configuration, service constraints,
//! hash settings) runs before the first byte is staged. Output paths are
//! placed and de-duplicated before anything compiles. Prompts compile in a
//! first pass; their resolved text is handed by value to the agent and
//! workflow descriptors in the second pass.
use crate::compile::{compile_artifact, output_path, Artifact, CompileInputs, ResolvedPrompts};
use crate::config::{load_config, LoadedConfig, SECTION_CLIENT_DATA, SECTION_TEMPLATING};
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::error::BuildError;
use crate::identifiers::{HashSettings, IdentifierGenerator};
use crate::output::{write_report_staged, ArtifactRecord, BuildReport, REPORT_FILE, REPORT_SCHEMA_VERSION};
use crate::services::{parse_services, ConstraintSet, ServiceArtifacts};
use crate::staging::{collect_files_recursive, Transaction};
use crate::util::{display_path, slash_path};
use crate::variables::{PhaseVariables, DEFAULT_VERSION, DEFAULT_WEBHOOK_BASE_URL};
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Inputs for one build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub config: Option<PathBuf>,
    pub source_root: PathBuf,
    pub output_root: PathBuf,
    /// RFC 3339 timestamp recorded in Phase 1 and the report.
    pub build_date: String,
}

#[derive(Debug)]
pub struct BuildOutcome {
    pub report: BuildReport,
    pub published: Vec<PathBuf>,
}

/// Validated configuration and everything derived from it before any file is
/// touched.
#[derive(Debug)]
pub struct Prepared {
    pub config: LoadedConfig,
    pub services: ServiceArtifacts,
    pub phases: PhaseVariables,
    pub hash_settings: HashSettings,
}

impl Prepared {
    pub fn identifier_generator(&self) -> IdentifierGenerator {
        IdentifierGenerator::new(
            self.phases.business_name(),
            self.phases
                .settings
                .get("webhook_base_url")
                .unwrap_or(DEFAULT_WEBHOOK_BASE_URL),
            self.hash_settings,
        )
    }
}

/// The pinned build date after validation, or the current time.
pub fn resolve_build_date(pinned: Option<&str>) -> Result<String> {
    match pinned {
        Some(value) => {
            DateTime::parse_from_rfc3339(value).map_err(|err| {
                BuildError::configuration(
                    "build_date",
                    format!("{value:?} is not an RFC 3339 timestamp: {err}"),
                )
            })?;
            Ok(value.to_string())
        }
        None => Ok(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
    }
}

/// Load and validate configuration, generate service schemas, and resolve
/// every variable phase.
pub fn prepare(config_path: Option<&Path>, build_date: &str, diagnostics: &mut Diagnostics) -> Result<Prepared> {
    let config = load_config(config_path, diagnostics)?;
    let constraints: ConstraintSet = config.view(&[SECTION_TEMPLATING, "service_constraints"])?;
    let raw_services = config
        .section(SECTION_CLIENT_DATA)
        .get("services")
        .unwrap_or(&Value::Null);
    if raw_services.is_null() {
        diagnostics.warn(
            WarningKind::Config,
            "client_data.services",
            "missing; building without services",
        );
    }
    let services = ServiceArtifacts::generate(parse_services(raw_services)?, &constraints)?;
    let phases = PhaseVariables::resolve(&config, &services, build_date, diagnostics);
    let hash_settings = phases.hash_settings(diagnostics)?;
    Ok(Prepared {
        config,
        services,
        phases,
        hash_settings,
    })
}

/// Source files under `source_root` as `/`-separated relative paths. Hidden
/// files and anything under `skip` are left out.
pub fn discover_sources(source_root: &Path, skip: Option<&Path>) -> Result<Vec<String>> {
    if !source_root.is_dir() {
        return Err(BuildError::configuration(
            "sources",
            format!("source directory {} does not exist", source_root.display()),
        )
        .into());
    }
    let mut sources = Vec::new();
    for path in collect_files_recursive(source_root)? {
        if skip.is_some_and(|skip| path.starts_with(skip)) {
            continue;
        }
        let rel = path
            .strip_prefix(source_root)
            .context("strip source prefix")?;
        let hidden = rel
            .components()
            .any(|component| component.as_os_str().to_string_lossy().starts_with('.'));
        if hidden {
            continue;
        }
        sources.push(slash_path(rel));
    }
    sources.sort();
    Ok(sources)
}

fn read_sources(source_root: &Path, sources: &[String]) -> Result<Vec<Artifact>> {
    sources
        .iter()
        .map(|rel| {
            let path = source_root.join(rel);
            let raw = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
            Ok(Artifact::new(rel, raw))
        })
        .collect()
}

/// Compile prompts, then everything else, returning artifacts in source order.
pub fn compile_all(
    mut artifacts: Vec<Artifact>,
    prepared: &Prepared,
    identifiers: &mut IdentifierGenerator,
    diagnostics: &mut Diagnostics,
) -> Vec<Artifact> {
    let no_prompts = ResolvedPrompts::default();
    let first_pass = CompileInputs {
        phases: &prepared.phases,
        services: &prepared.services,
        prompts: &no_prompts,
    };
    for artifact in artifacts.iter_mut().filter(|a| a.kind.is_prompt()) {
        compile_artifact(artifact, &first_pass, identifiers, diagnostics);
    }

    let prompts = ResolvedPrompts::collect(artifacts.iter(), diagnostics);
    tracing::debug!(
        primary = prompts.primary.is_some(),
        secondary = prompts.secondary.is_some(),
        "prompts resolved"
    );
    let second_pass = CompileInputs {
        prompts: &prompts,
        ..first_pass
    };
    for artifact in artifacts.iter_mut().filter(|a| !a.kind.is_prompt()) {
        compile_artifact(artifact, &second_pass, identifiers, diagnostics);
    }
    artifacts
}

fn place_outputs(artifacts: &mut [Artifact], prepared: &Prepared, diagnostics: &mut Diagnostics) {
    for artifact in artifacts {
        artifact.output_path = output_path(&artifact.source_path, &prepared.phases, diagnostics);
    }
}

/// Drop artifacts whose output path is already taken by an earlier source or
/// by the report.
fn dedupe_outputs(artifacts: Vec<Artifact>, diagnostics: &mut Diagnostics) -> Vec<Artifact> {
    let mut taken: BTreeSet<String> = BTreeSet::from([REPORT_FILE.to_string()]);
    artifacts
        .into_iter()
        .filter(|artifact| {
            if taken.insert(artifact.output_path.clone()) {
                return true;
            }
            diagnostics.warn(
                WarningKind::Reference,
                &artifact.source_path,
                format!("output {} is already produced by another source; skipped", artifact.output_path),
            );
            false
        })
        .collect()
}

/// Run a full build and publish the output tree.
pub fn run_build(options: &BuildOptions) -> Result<BuildOutcome> {
    let started = Instant::now();
    let mut diagnostics = Diagnostics::new();
    let prepared = prepare(options.config.as_deref(), &options.build_date, &mut diagnostics)?;

    let skip = options
        .output_root
        .starts_with(&options.source_root)
        .then_some(options.output_root.as_path());
    let sources = discover_sources(&options.source_root, skip)?;
    let mut artifacts = read_sources(&options.source_root, &sources)?;
    place_outputs(&mut artifacts, &prepared, &mut diagnostics);
    let artifacts = dedupe_outputs(artifacts, &mut diagnostics);

    let mut identifiers = prepared.identifier_generator();
    let artifacts = compile_all(artifacts, &prepared, &mut identifiers, &mut diagnostics);

    let txn = Transaction::begin(&options.output_root)?;
    for artifact in &artifacts {
        txn.stage_bytes(&artifact.output_path, artifact.output_bytes())?;
    }
    let report = BuildReport {
        schema_version: REPORT_SCHEMA_VERSION,
        build_date: options.build_date.clone(),
        business_name: prepared.phases.business_name().to_string(),
        version: prepared
            .phases
            .identity
            .get("version")
            .unwrap_or(DEFAULT_VERSION)
            .to_string(),
        artifacts: artifacts.iter().map(ArtifactRecord::from_artifact).collect(),
        endpoints: identifiers.issued(),
        dynamic_columns: prepared.services.dynamic_columns(),
        warnings: diagnostics.into_warnings(),
    };
    write_report_staged(&txn, &report)?;
    let published = txn.publish(&options.output_root)?;

    tracing::info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        artifacts = report.artifacts.len(),
        warnings = report.warning_count(),
        output = %display_path(&options.output_root, None),
        "build complete"
    );
    Ok(BuildOutcome { report, published })
}

#[cfg(test)]
#[path = "build_tests.rs"]
mod tests;
