use super::{Property, PrimitiveType, Service};
use serde_json::{json, Map, Value};

/// Base appointment fields: (name, JSON type, description).
const BASE_FIELDS: [(&str, &str, &str); 7] = [
    ("caller_name", "string", "Full name of the caller"),
    ("caller_phone", "string", "Caller phone number in E.164 format"),
    ("caller_email", "string", "Caller email address, if offered"),
    ("appointment_date", "string", "Requested date in YYYY-MM-DD format"),
    ("appointment_time", "string", "Requested start time in HH:MM 24-hour format"),
    ("timezone", "string", "IANA timezone of the requested time"),
    ("notes", "string", "Anything else the caller wants the business to know"),
];

const APPOINTMENT_REQUIRED: [&str; 4] = [
    "caller_name",
    "caller_phone",
    "appointment_date",
    "appointment_time",
];

/// Fields a modification can change, plus the phone used to find the booking.
const MODIFY_FIELDS: [(&str, &str, &str); 5] = [
    ("caller_phone", "string", "Phone number the existing appointment was booked under"),
    ("appointment_date", "string", "New date in YYYY-MM-DD format, only if it changes"),
    ("appointment_time", "string", "New start time in HH:MM 24-hour format, only if it changes"),
    ("timezone", "string", "IANA timezone of the new time, only if it changes"),
    ("notes", "string", "Updated notes, only if they change"),
];

const MODIFY_REQUIRED: [&str; 1] = ["caller_phone"];

fn property_schema(property: &Property) -> Value {
    let mut schema = Map::new();
    schema.insert("type".to_string(), json!(property.kind.json_type()));
    if !property.prompt.is_empty() {
        schema.insert("description".to_string(), json!(property.prompt));
    }
    if property.kind == PrimitiveType::Enum {
        schema.insert("enum".to_string(), json!(property.options));
    }
    Value::Object(schema)
}

/// Per-service property schemas keyed by slug.
///
/// Each entry's `required` list is exactly the service's configured required
/// property names, in configured order.
pub fn generate_properties_schema(services: &[Service]) -> Value {
    let mut by_slug = Map::new();
    for service in services {
        let mut properties = Map::new();
        for property in service
            .properties
            .required
            .iter()
            .chain(service.properties.optional.iter())
        {
            properties.insert(property.name.clone(), property_schema(property));
        }
        let required: Vec<&str> = service
            .properties
            .required
            .iter()
            .map(|property| property.name.as_str())
            .collect();
        by_slug.insert(
            service.slug.clone(),
            json!({
                "type": "object",
                "description": format!("Details to collect for {}", service.name),
                "properties": properties,
                "required": required,
            }),
        );
    }
    Value::Object(by_slug)
}

pub fn generate_selection_schema(services: &[Service]) -> Value {
    let mut flags = Map::new();
    for service in services {
        flags.insert(
            service.slug.clone(),
            json!({
                "type": "boolean",
                "description": format!("Set to true if the request concerns {}", service.name),
            }),
        );
    }
    Value::Object(flags)
}

fn compose(
    services: &[Service],
    fields: &[(&str, &str, &str)],
    required: &[&str],
    selection_description: &str,
    selection_required: bool,
) -> Value {
    let mut properties = Map::new();
    for (name, kind, description) in fields {
        properties.insert(
            (*name).to_string(),
            json!({ "type": kind, "description": description }),
        );
    }
    let mut required: Vec<String> = required.iter().map(|name| (*name).to_string()).collect();
    if !services.is_empty() {
        properties.insert(
            "services".to_string(),
            json!({
                "type": "object",
                "description": selection_description,
                "properties": generate_selection_schema(services),
            }),
        );
        properties.insert(
            "service_properties".to_string(),
            json!({
                "type": "object",
                "description": "Service-specific details keyed by service slug",
                "properties": generate_properties_schema(services),
            }),
        );
        if selection_required {
            required.push("services".to_string());
        }
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

pub fn build_appointment_schema(services: &[Service]) -> Value {
    compose(
        services,
        &BASE_FIELDS,
        &APPOINTMENT_REQUIRED,
        "Which service the caller wants to book",
        true,
    )
}

/// Parameter schema for the modification tool.
///
/// Identity fields other than the lookup phone are omitted; date, time,
/// timezone and notes are present but optional since a modification only
/// carries what changes.
pub fn build_modify_schema(services: &[Service]) -> Value {
    compose(
        services,
        &MODIFY_FIELDS,
        &MODIFY_REQUIRED,
        "Which service the appointment should be changed to, only if it changes",
        false,
    )
}
