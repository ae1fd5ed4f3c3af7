//! Business services and the structural rules they must satisfy.
//!
//! Services are parsed from `client_data.services` into closed types, then
//! checked against a [`ConstraintSet`]. Schema and column synthesis live in
//! the submodules and only ever see a validated list.
use crate::error::{BuildError, ConstraintViolation};
use crate::util::slugify;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

mod columns;
mod schema;

use columns::{generate_csv_columns, generate_properties_guide};
use schema::{build_appointment_schema, build_modify_schema};

pub use columns::{column_map, csv_header_line, required_properties_map, service_map};

/// Closed set of property value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveType {
    String,
    Number,
    Boolean,
    Enum,
}

impl PrimitiveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveType::String => "string",
            PrimitiveType::Number => "number",
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Enum => "enum",
        }
    }

    /// JSON schema `type` for this primitive. Enums are string-valued.
    pub fn json_type(&self) -> &'static str {
        match self {
            PrimitiveType::String | PrimitiveType::Enum => "string",
            PrimitiveType::Number => "number",
            PrimitiveType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrimitiveType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "string" => Ok(PrimitiveType::String),
            "number" => Ok(PrimitiveType::Number),
            "boolean" => Ok(PrimitiveType::Boolean),
            "enum" => Ok(PrimitiveType::Enum),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    pub kind: PrimitiveType,
    pub prompt: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertySet {
    pub required: Vec<Property>,
    pub optional: Vec<Property>,
}

impl PropertySet {
    pub fn len(&self) -> usize {
        self.required.len() + self.optional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub name: String,
    pub slug: String,
    pub duration_minutes: u32,
    pub description: Option<String>,
    pub price: Option<String>,
    pub properties: PropertySet,
}

/// Structural bounds for the configured service list.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConstraintSet {
    pub max_services: usize,
    pub max_required_props_per_service: usize,
    pub max_optional_props_per_service: usize,
    pub max_total_dynamic_columns: usize,
}

impl Default for ConstraintSet {
    fn default() -> Self {
        Self {
            max_services: 8,
            max_required_props_per_service: 3,
            max_optional_props_per_service: 2,
            max_total_dynamic_columns: 40,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawService {
    #[serde(default)]
    name: String,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    duration_minutes: Option<u32>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    price: Option<Value>,
    #[serde(default)]
    properties: RawPropertySet,
}

#[derive(Debug, Default, Deserialize)]
struct RawPropertySet {
    #[serde(default)]
    required: Vec<RawProperty>,
    #[serde(default)]
    optional: Vec<RawProperty>,
}

#[derive(Debug, Deserialize)]
struct RawProperty {
    name: String,
    #[serde(rename = "type", default = "default_property_type")]
    kind: String,
    #[serde(default)]
    prompt: String,
    #[serde(default)]
    options: Vec<String>,
}

fn default_property_type() -> String {
    "string".to_string()
}

pub const DEFAULT_DURATION_MINUTES: u32 = 30;

/// Parse `client_data.services` into typed services.
///
/// An absent list is empty. Shape errors are configuration errors; unknown
/// property types are constraint violations naming the service.
pub fn parse_services(raw: &Value) -> Result<Vec<Service>> {
    if raw.is_null() {
        return Ok(Vec::new());
    }
    let raw_services: Vec<RawService> = serde_json::from_value(raw.clone())
        .map_err(|err| BuildError::configuration("client_data.services", err.to_string()))?;

    let mut services = Vec::with_capacity(raw_services.len());
    for (index, raw) in raw_services.into_iter().enumerate() {
        let name = raw.name.trim().to_string();
        if name.is_empty() {
            return Err(ConstraintViolation::EmptyServiceName { index }.into());
        }
        let slug = raw
            .slug
            .as_deref()
            .map(str::trim)
            .filter(|slug| !slug.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| slugify(&name));
        let properties = PropertySet {
            required: convert_properties(&name, raw.properties.required)?,
            optional: convert_properties(&name, raw.properties.optional)?,
        };
        services.push(Service {
            slug,
            duration_minutes: raw.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES),
            description: raw
                .description
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty()),
            price: raw.price.and_then(|price| match price {
                Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
                Value::Number(number) => Some(number.to_string()),
                _ => None,
            }),
            properties,
            name,
        });
    }
    Ok(services)
}

fn convert_properties(service: &str, raw: Vec<RawProperty>) -> Result<Vec<Property>> {
    raw.into_iter()
        .map(|property| -> Result<Property> {
            let kind = property.kind.parse::<PrimitiveType>().map_err(|kind| {
                ConstraintViolation::UnknownPropertyType {
                    service: service.to_string(),
                    property: property.name.clone(),
                    kind,
                }
            })?;
            if kind == PrimitiveType::Enum && property.options.is_empty() {
                return Err(ConstraintViolation::EnumWithoutOptions {
                    service: service.to_string(),
                    property: property.name.clone(),
                }
                .into());
            }
            Ok(Property {
                name: property.name.trim().to_string(),
                kind,
                prompt: property.prompt.trim().to_string(),
                options: property.options,
            })
        })
        .collect()
}

/// Total dynamic columns the list contributes to tabular output.
pub fn dynamic_column_count(services: &[Service]) -> usize {
    services.iter().map(|service| service.properties.len()).sum()
}

/// Check every structural bound. Nothing is generated unless this passes.
pub fn validate(services: &[Service], constraints: &ConstraintSet) -> Result<(), ConstraintViolation> {
    if services.len() > constraints.max_services {
        return Err(ConstraintViolation::TooManyServices {
            count: services.len(),
            max: constraints.max_services,
        });
    }

    let mut slugs = BTreeSet::new();
    for service in services {
        if !slugs.insert(service.slug.as_str()) {
            return Err(ConstraintViolation::DuplicateSlug {
                slug: service.slug.clone(),
            });
        }
        let required = service.properties.required.len();
        if required > constraints.max_required_props_per_service {
            return Err(ConstraintViolation::TooManyRequired {
                service: service.name.clone(),
                count: required,
                max: constraints.max_required_props_per_service,
            });
        }
        let optional = service.properties.optional.len();
        if optional > constraints.max_optional_props_per_service {
            return Err(ConstraintViolation::TooManyOptional {
                service: service.name.clone(),
                count: optional,
                max: constraints.max_optional_props_per_service,
            });
        }
    }

    let total = dynamic_column_count(services);
    if total > constraints.max_total_dynamic_columns {
        return Err(ConstraintViolation::TooManyColumns {
            total,
            max: constraints.max_total_dynamic_columns,
        });
    }
    Ok(())
}

/// Everything generated from a validated service list, computed once per build.
#[derive(Debug, Clone)]
pub struct ServiceArtifacts {
    pub services: Vec<Service>,
    pub appointment_schema: Value,
    pub modify_schema: Value,
    pub csv_columns: Vec<String>,
    pub properties_guide: String,
}

impl ServiceArtifacts {
    /// Validate `services` and synthesize every derived structure.
    pub fn generate(services: Vec<Service>, constraints: &ConstraintSet) -> Result<Self> {
        validate(&services, constraints).map_err(BuildError::from)?;
        let appointment_schema = build_appointment_schema(&services);
        let modify_schema = build_modify_schema(&services);
        let csv_columns = generate_csv_columns(&services);
        let properties_guide = generate_properties_guide(&services);
        tracing::debug!(
            services = services.len(),
            dynamic_columns = dynamic_column_count(&services),
            "service schemas generated"
        );
        Ok(Self {
            services,
            appointment_schema,
            modify_schema,
            csv_columns,
            properties_guide,
        })
    }

    pub fn dynamic_columns(&self) -> usize {
        dynamic_column_count(&self.services)
    }
}

#[cfg(test)]
#[path = "services/services_tests.rs"]
mod tests;
