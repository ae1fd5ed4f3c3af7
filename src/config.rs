//! Configuration loading.
//!
//! The document is read once, environment indirections are resolved, and the
//! result is frozen. Every later stage derives its own view from it.
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::error::BuildError;
use crate::templates;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const SECTION_TEMPLATING: &str = "templating";
pub const SECTION_BUILD_SETTINGS: &str = "build_settings";
pub const SECTION_CLIENT_DATA: &str = "client_data";
pub const SECTION_RUNTIME_VARIABLES: &str = "runtime_variables";

pub const SECTIONS: [&str; 4] = [
    SECTION_TEMPLATING,
    SECTION_BUILD_SETTINGS,
    SECTION_CLIENT_DATA,
    SECTION_RUNTIME_VARIABLES,
];

const ENV_PREFIX: &str = "env:";

/// Where the loaded document came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    File(PathBuf),
    BuiltIn,
    #[cfg(test)]
    Inline,
}

impl fmt::Display for ConfigOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigOrigin::File(path) => write!(f, "{}", path.display()),
            ConfigOrigin::BuiltIn => f.write_str("<built-in default>"),
            #[cfg(test)]
            ConfigOrigin::Inline => f.write_str("<inline>"),
        }
    }
}

/// A validated, environment-resolved configuration document.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    document: Value,
    origin: ConfigOrigin,
}

impl LoadedConfig {
    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn origin(&self) -> &ConfigOrigin {
        &self.origin
    }

    /// Return a top-level section, or `Null` when it is absent.
    pub fn section(&self, name: &str) -> &Value {
        self.document.get(name).unwrap_or(&Value::Null)
    }

    /// Deserialize a nested value into a typed view, defaulting when absent.
    pub fn view<T: DeserializeOwned + Default>(&self, path: &[&str]) -> Result<T> {
        let Some(value) = lookup(&self.document, path) else {
            return Ok(T::default());
        };
        if value.is_null() {
            return Ok(T::default());
        }
        let view = serde_json::from_value(value.clone())
            .map_err(|err| BuildError::configuration(path.join("."), err.to_string()))?;
        Ok(view)
    }

    /// Return a non-empty string leaf at `path`.
    pub fn str_at(&self, path: &[&str]) -> Option<&str> {
        lookup(&self.document, path)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

/// Walk a key path through nested objects.
pub fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(*key))
}

/// Parse the embedded default document.
pub fn default_document() -> Result<Value> {
    serde_json::from_str(templates::DEFAULT_CONFIG_JSON).context("parse built-in default config")
}

/// Load the configuration at `path`, falling back to the built-in default.
///
/// Environment indirections are resolved against the process environment.
pub fn load_config(path: Option<&Path>, diagnostics: &mut Diagnostics) -> Result<LoadedConfig> {
    load_config_with_env(path, &|name| std::env::var(name).ok(), diagnostics)
}

pub fn load_config_with_env(
    path: Option<&Path>,
    env: &dyn Fn(&str) -> Option<String>,
    diagnostics: &mut Diagnostics,
) -> Result<LoadedConfig> {
    let (document, origin) = match path {
        Some(path) if path.is_file() => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("read config {}", path.display()))?;
            let document: Value = serde_json::from_str(&text).map_err(|err| {
                BuildError::configuration(
                    "document",
                    format!("{} is not valid JSON: {err}", path.display()),
                )
            })?;
            (document, ConfigOrigin::File(path.to_path_buf()))
        }
        Some(path) => {
            diagnostics.warn(
                WarningKind::Config,
                path.display().to_string(),
                "config file not found; using built-in default",
            );
            (default_document()?, ConfigOrigin::BuiltIn)
        }
        None => {
            tracing::debug!("no config supplied; using built-in default");
            (default_document()?, ConfigOrigin::BuiltIn)
        }
    };
    finish_loading(document, origin, env, diagnostics)
}

/// Validate and resolve an already-parsed document.
#[cfg(test)]
pub fn from_document(
    document: Value,
    env: &dyn Fn(&str) -> Option<String>,
    diagnostics: &mut Diagnostics,
) -> Result<LoadedConfig> {
    finish_loading(document, ConfigOrigin::Inline, env, diagnostics)
}

fn finish_loading(
    mut document: Value,
    origin: ConfigOrigin,
    env: &dyn Fn(&str) -> Option<String>,
    diagnostics: &mut Diagnostics,
) -> Result<LoadedConfig> {
    validate_structure(&document, diagnostics)?;
    resolve_env_refs(&mut document, "", env, diagnostics);
    tracing::info!(origin = %origin, "configuration loaded");
    Ok(LoadedConfig { document, origin })
}

/// Check that the document is a nested key-value structure with the four
/// named sections. Missing sections are tolerated; malformed ones are fatal.
pub fn validate_structure(document: &Value, diagnostics: &mut Diagnostics) -> Result<()> {
    let Some(root) = document.as_object() else {
        return Err(BuildError::configuration(
            "document",
            format!("expected a JSON object at the top level, found {}", type_name(document)),
        )
        .into());
    };
    for section in SECTIONS {
        match root.get(section) {
            None | Some(Value::Null) => diagnostics.warn(
                WarningKind::Config,
                section,
                "section is missing; defaults will be used",
            ),
            Some(Value::Object(_)) => {}
            Some(other) => {
                return Err(BuildError::configuration(
                    section,
                    format!("expected an object, found {}", type_name(other)),
                )
                .into());
            }
        }
    }
    Ok(())
}

/// Replace every `"env:NAME"` string leaf with the value of `NAME`.
///
/// Unset variables leave the literal placeholder in place and record a
/// reference warning.
pub fn resolve_env_refs(
    value: &mut Value,
    path: &str,
    env: &dyn Fn(&str) -> Option<String>,
    diagnostics: &mut Diagnostics,
) {
    match value {
        Value::String(text) => {
            let Some(name) = text.strip_prefix(ENV_PREFIX) else {
                return;
            };
            let name = name.trim().to_string();
            if name.is_empty() {
                return;
            }
            match env(&name) {
                Some(resolved) => *text = resolved,
                None => diagnostics.warn(
                    WarningKind::Reference,
                    display_key_path(path),
                    format!("environment variable {name} is not set; keeping {text:?}"),
                ),
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter_mut().enumerate() {
                resolve_env_refs(item, &format!("{path}[{index}]"), env, diagnostics);
            }
        }
        Value::Object(map) => resolve_object(map, path, env, diagnostics),
        _ => {}
    }
}

fn resolve_object(
    map: &mut Map<String, Value>,
    path: &str,
    env: &dyn Fn(&str) -> Option<String>,
    diagnostics: &mut Diagnostics,
) {
    for (key, child) in map.iter_mut() {
        let child_path = if path.is_empty() {
            key.clone()
        } else {
            format!("{path}.{key}")
        };
        resolve_env_refs(child, &child_path, env, diagnostics);
    }
}

fn display_key_path(path: &str) -> String {
    if path.is_empty() {
        "document".to_string()
    } else {
        path.to_string()
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Render the default document for `vpack init`.
pub fn config_stub() -> String {
    let mut text = templates::DEFAULT_CONFIG_JSON.to_string();
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

/// Write the default document to `path`.
pub fn write_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(anyhow::anyhow!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        ));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, config_stub()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
