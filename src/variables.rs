//! Four-phase variable resolution.
//!
//! Each phase is materialized once from an ordered list of sources where the
//! first source defining a key wins. Phases are built strictly in order and
//! each constructor takes the earlier phases it reads from, so a later phase
//! can never be computed before the ones it depends on.
use crate::config::{
    LoadedConfig, SECTION_BUILD_SETTINGS, SECTION_CLIENT_DATA, SECTION_RUNTIME_VARIABLES,
    SECTION_TEMPLATING,
};
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::error::BuildError;
use crate::identifiers::{HashAlgorithm, HashSettings, DEFAULT_HASH_LENGTH};
use crate::services::{csv_header_line, ServiceArtifacts};
use crate::util::{join_natural, slugify};
use anyhow::Result;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

mod format;

pub use format::{derive_business_name, format_business_hours, GENERIC_BUSINESS_NAME};
use format::{
    format_address, format_faq_block, format_policies_block, format_services_description,
    policy_entries, scalar_to_string,
};

pub const DEFAULT_AGENT_NAME: &str = "Assistant";
pub const DEFAULT_VERSION: &str = "1.0.0";
pub const DEFAULT_VOICE_ID: &str = "11labs-Adrian";
pub const DEFAULT_MAX_CALL_DURATION_MS: &str = "1800000";
pub const DEFAULT_INTERRUPTION_SENSITIVITY: &str = "1";
pub const DEFAULT_WEBHOOK_BASE_URL: &str = "http://localhost:5678";

/// The one generated value prompt artifacts resolve at compile time.
pub const PROPERTIES_GUIDE_KEY: &str = "service_properties_guide";
pub const BUILD_DATE_KEY: &str = "build_date";

/// A flat, ordered, read-only string mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VariableSet(BTreeMap<String, String>);

impl VariableSet {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// JSON object form, used for the agent's dynamic variable table.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .0
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        Value::Object(map)
    }
}

/// Ordered mapping sources, highest priority first.
#[derive(Debug, Default)]
pub struct Layers {
    layers: Vec<(&'static str, Vec<(String, String)>)>,
}

impl Layers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer<I, K, V>(mut self, label: &'static str, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.layers.push((label, values));
        self
    }

    /// Collapse the layers into one set; the first layer defining a key wins.
    pub fn materialize(&self) -> VariableSet {
        let mut resolved = BTreeMap::new();
        for (label, values) in &self.layers {
            let mut contributed = 0usize;
            for (key, value) in values {
                if !resolved.contains_key(key) {
                    resolved.insert(key.clone(), value.clone());
                    contributed += 1;
                }
            }
            tracing::trace!(layer = label, contributed, "variable layer applied");
        }
        VariableSet(resolved)
    }
}

/// All four phases of one build. Owned by the orchestrator and lent out by
/// shared reference once complete.
#[derive(Debug, Clone)]
pub struct PhaseVariables {
    pub identity: VariableSet,
    pub settings: VariableSet,
    pub runtime: VariableSet,
    pub content: VariableSet,
}

impl PhaseVariables {
    /// Resolve every phase in order.
    pub fn resolve(
        config: &LoadedConfig,
        services: &ServiceArtifacts,
        build_date: &str,
        diagnostics: &mut Diagnostics,
    ) -> Self {
        let identity = resolve_identity(config, build_date, diagnostics);
        let settings = resolve_settings(config, &identity, diagnostics);
        let runtime = resolve_runtime(config, &identity, services, diagnostics);
        let content = resolve_content(config, &identity, &runtime, services);
        tracing::debug!(
            identity = identity.len(),
            settings = settings.len(),
            runtime = runtime.len(),
            content = content.len(),
            "phase variables resolved"
        );
        Self {
            identity,
            settings,
            runtime,
            content,
        }
    }

    pub fn business_name(&self) -> &str {
        self.identity.get("business_name").unwrap_or(GENERIC_BUSINESS_NAME)
    }

    /// Hash settings from Phase 2. An unknown algorithm is fatal; an unusable
    /// length falls back to the default with a warning.
    pub fn hash_settings(&self, diagnostics: &mut Diagnostics) -> Result<HashSettings> {
        let algorithm = match self.settings.get("hash_algorithm") {
            Some(name) => name.parse::<HashAlgorithm>().map_err(|message| {
                BuildError::configuration("templating.webhook_hash.algorithm", message)
            })?,
            None => HashAlgorithm::default(),
        };
        let Some(raw_length) = self.settings.get("hash_length") else {
            return Ok(HashSettings::with_length(algorithm, DEFAULT_HASH_LENGTH).0);
        };
        let requested = raw_length.trim().parse::<usize>().unwrap_or(0);
        let (settings, accepted) = HashSettings::with_length(algorithm, requested);
        if !accepted {
            diagnostics.warn(
                WarningKind::Config,
                "templating.webhook_hash.length",
                format!(
                    "length {raw_length:?} is outside 4..={} for {algorithm}; using {DEFAULT_HASH_LENGTH}",
                    algorithm.hex_len()
                ),
            );
        }
        Ok(settings)
    }
}

fn defaulted(diagnostics: &mut Diagnostics, subject: &str, fallback: impl fmt::Display) {
    diagnostics.warn(WarningKind::Config, subject, format!("missing; using {fallback}"));
}

fn has_key(entries: &[(String, String)], key: &str) -> bool {
    entries.iter().any(|(k, _)| k == key)
}

/// Non-empty scalar leaves at dotted paths, as (key, text) pairs.
fn string_entries(config: &LoadedConfig, entries: &[(&str, &str)]) -> Vec<(String, String)> {
    entries
        .iter()
        .filter_map(|(key, path)| {
            let path: Vec<&str> = path.split('.').collect();
            crate::config::lookup(config.document(), &path)
                .and_then(scalar_to_string)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .map(|value| ((*key).to_string(), value))
        })
        .collect()
}

/// Phase 1: identity and build metadata.
pub fn resolve_identity(
    config: &LoadedConfig,
    build_date: &str,
    diagnostics: &mut Diagnostics,
) -> VariableSet {
    let explicit = string_entries(
        config,
        &[
            ("business_name", "templating.business_name"),
            ("agent_name", "templating.agent_name"),
            ("version", "templating.version"),
            ("repository", "templating.repository"),
        ],
    );
    let client = string_entries(
        config,
        &[("business_name", "client_data.business.name")],
    );
    let repository = config
        .str_at(&[SECTION_TEMPLATING, "repository"])
        .unwrap_or_default()
        .to_string();
    let defaults = vec![
        ("business_name", derive_business_name(&repository)),
        ("agent_name", DEFAULT_AGENT_NAME.to_string()),
        ("version", DEFAULT_VERSION.to_string()),
        ("repository", repository.clone()),
    ];

    let named = has_key(&explicit, "business_name") || has_key(&client, "business_name");

    let base = Layers::new()
        .layer("templating", explicit)
        .layer("client_data", client)
        .layer("derived", defaults)
        .materialize();

    let business_name = base.get("business_name").unwrap_or(GENERIC_BUSINESS_NAME);
    if !named {
        let fallback = if repository.is_empty() {
            format!("{business_name:?}")
        } else {
            format!("{business_name:?} derived from repository {repository:?}")
        };
        defaulted(diagnostics, "templating.business_name", fallback);
    }
    let computed = vec![
        ("business_slug", slugify(business_name)),
        (BUILD_DATE_KEY, build_date.to_string()),
    ];
    Layers::new()
        .layer("base", base.iter())
        .layer("computed", computed)
        .materialize()
}

/// Phase 2: build settings applied directly to descriptor fields.
pub fn resolve_settings(
    config: &LoadedConfig,
    identity: &VariableSet,
    diagnostics: &mut Diagnostics,
) -> VariableSet {
    let explicit = string_entries(
        config,
        &[
            ("voice_id", "build_settings.voice.voice_id"),
            (
                "max_call_duration_ms",
                "build_settings.voice.max_call_duration_ms",
            ),
            (
                "interruption_sensitivity",
                "build_settings.voice.interruption_sensitivity",
            ),
            (
                "agent_display_name",
                "build_settings.voice.display_name",
            ),
            (
                "webhook_base_url",
                "build_settings.infrastructure.webhook_base_url",
            ),
            (
                "transfer_number",
                "build_settings.infrastructure.transfer_number",
            ),
            (
                "hash_algorithm",
                "templating.webhook_hash.algorithm",
            ),
            ("hash_length", "templating.webhook_hash.length"),
        ],
    );
    if !has_key(&explicit, "webhook_base_url") {
        defaulted(
            diagnostics,
            "build_settings.infrastructure.webhook_base_url",
            DEFAULT_WEBHOOK_BASE_URL,
        );
    }
    let agent_name = identity.get("agent_name").unwrap_or(DEFAULT_AGENT_NAME);
    let defaults = vec![
        ("voice_id", DEFAULT_VOICE_ID.to_string()),
        ("max_call_duration_ms", DEFAULT_MAX_CALL_DURATION_MS.to_string()),
        (
            "interruption_sensitivity",
            DEFAULT_INTERRUPTION_SENSITIVITY.to_string(),
        ),
        ("agent_display_name", agent_name.to_string()),
        ("webhook_base_url", DEFAULT_WEBHOOK_BASE_URL.to_string()),
        ("hash_algorithm", HashAlgorithm::default().to_string()),
        ("hash_length", DEFAULT_HASH_LENGTH.to_string()),
    ];
    Layers::new()
        .layer(SECTION_BUILD_SETTINGS, explicit)
        .layer("defaults", defaults)
        .materialize()
}

/// Phase 3: variables preserved for the conversational runtime.
pub fn resolve_runtime(
    config: &LoadedConfig,
    identity: &VariableSet,
    services: &ServiceArtifacts,
    diagnostics: &mut Diagnostics,
) -> VariableSet {
    let mut explicit = Vec::new();
    if let Some(map) = config.section(SECTION_RUNTIME_VARIABLES).as_object() {
        for (key, value) in map {
            match scalar_to_string(value) {
                Some(text) => explicit.push((key.clone(), text)),
                None if value.is_null() => {}
                None => diagnostics.warn(
                    WarningKind::Config,
                    format!("{SECTION_RUNTIME_VARIABLES}.{key}"),
                    "runtime variables must be scalars; skipping",
                ),
            }
        }
    }

    let hours = config
        .section(SECTION_CLIENT_DATA)
        .get("hours")
        .unwrap_or(&Value::Null);
    let names: Vec<String> = services
        .services
        .iter()
        .map(|service| service.name.clone())
        .collect();
    let business_hours = format_business_hours(hours);
    if hours.is_null() && !has_key(&explicit, "business_hours") {
        defaulted(diagnostics, "client_data.hours", format!("{business_hours:?}"));
    }
    let mut derived = vec![
        ("business_hours".to_string(), business_hours),
        ("service_names".to_string(), join_natural(&names)),
    ];
    let contact = string_entries(
        config,
        &[
            ("business_phone", "client_data.business.phone"),
            (
                "business_timezone",
                "client_data.business.timezone",
            ),
        ],
    );
    for (key, subject) in [
        ("business_phone", "client_data.business.phone"),
        ("business_timezone", "client_data.business.timezone"),
    ] {
        if !has_key(&contact, key) && !has_key(&explicit, key) {
            diagnostics.warn(
                WarningKind::Config,
                subject,
                format!("missing; {{{{{key}}}}} stays unset for the runtime"),
            );
        }
    }
    derived.extend(contact);

    Layers::new()
        .layer(SECTION_RUNTIME_VARIABLES, explicit)
        .layer("identity", identity.iter())
        .layer("derived", derived)
        .materialize()
}

/// Phase 4: fully resolved values for content artifacts.
pub fn resolve_content(
    config: &LoadedConfig,
    identity: &VariableSet,
    runtime: &VariableSet,
    services: &ServiceArtifacts,
) -> VariableSet {
    let client = config.section(SECTION_CLIENT_DATA);
    let business = client.get("business").unwrap_or(&Value::Null);
    let (address_line, address_block) =
        format_address(business.get("address").unwrap_or(&Value::Null));
    let policies = policy_entries(client.get("policies").unwrap_or(&Value::Null));

    let mut generated = vec![
        ("business_address".to_string(), address_line),
        ("business_address_multiline".to_string(), address_block),
        (
            "services_description".to_string(),
            format_services_description(&services.services),
        ),
        (
            "faq_block".to_string(),
            format_faq_block(client.get("faqs").unwrap_or(&Value::Null)),
        ),
        ("policies_block".to_string(), format_policies_block(&policies)),
        (
            PROPERTIES_GUIDE_KEY.to_string(),
            services.properties_guide.clone(),
        ),
        (
            "csv_headers".to_string(),
            csv_header_line(&services.csv_columns),
        ),
        (
            "service_count".to_string(),
            services.services.len().to_string(),
        ),
    ];
    generated.extend(
        policies
            .iter()
            .map(|(key, text)| (format!("policy_{key}"), text.clone())),
    );
    generated.extend(string_entries(
        config,
        &[
            ("business_email", "client_data.business.email"),
            (
                "business_website",
                "client_data.business.website",
            ),
        ],
    ));

    Layers::new()
        .layer("generated", generated)
        .layer("runtime", runtime.iter())
        .layer("identity", identity.iter())
        .materialize()
}

#[cfg(test)]
#[path = "variables/phase_tests.rs"]
mod tests;
