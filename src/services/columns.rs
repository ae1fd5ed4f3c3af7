use super::{Property, Service};
use crate::util::snake_to_title;
use serde_json::{json, Map, Value};

/// Fixed leading columns of the bookings sheet.
pub const BASE_CSV_COLUMNS: [&str; 11] = [
    "Timestamp",
    "Call ID",
    "Caller Name",
    "Caller Phone",
    "Caller Email",
    "Service",
    "Appointment Date",
    "Appointment Time",
    "Timezone",
    "Status",
    "Notes",
];

pub const NO_PROPERTIES_GUIDE: &str =
    "No additional details are required for any service. Collect only the standard booking details.";

fn dynamic_column_name(service: &Service, property: &Property) -> String {
    format!("{} - {}", service.name, snake_to_title(&property.name))
}

fn all_properties(service: &Service) -> impl Iterator<Item = &Property> {
    service
        .properties
        .required
        .iter()
        .chain(service.properties.optional.iter())
}

/// Base columns followed by one column per required then optional property.
pub fn generate_csv_columns(services: &[Service]) -> Vec<String> {
    let mut columns: Vec<String> = BASE_CSV_COLUMNS.iter().map(|c| (*c).to_string()).collect();
    for service in services {
        for property in all_properties(service) {
            columns.push(dynamic_column_name(service, property));
        }
    }
    columns
}

pub fn csv_header_line(columns: &[String]) -> String {
    columns
        .iter()
        .map(|column| {
            if column.contains([',', '"', '\n']) {
                format!("\"{}\"", column.replace('"', "\"\""))
            } else {
                column.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

pub fn service_map(services: &[Service]) -> Value {
    let map: Map<String, Value> = services
        .iter()
        .map(|service| (service.slug.clone(), json!(service.name)))
        .collect();
    Value::Object(map)
}

pub fn required_properties_map(services: &[Service]) -> Value {
    let map: Map<String, Value> = services
        .iter()
        .map(|service| {
            let names: Vec<&str> = service
                .properties
                .required
                .iter()
                .map(|property| property.name.as_str())
                .collect();
            (service.slug.clone(), json!(names))
        })
        .collect();
    Value::Object(map)
}

/// `{ "slug.property": "Service Name - Property Title" }` for workflow scripts.
pub fn column_map(services: &[Service]) -> Value {
    let mut map = Map::new();
    for service in services {
        for property in all_properties(service) {
            map.insert(
                format!("{}.{}", service.slug, property.name),
                json!(dynamic_column_name(service, property)),
            );
        }
    }
    Value::Object(map)
}

fn guide_entry(property: &Property) -> String {
    if property.prompt.is_empty() {
        property.name.clone()
    } else {
        format!("{} ({})", property.name, property.prompt)
    }
}

/// Conversational listing of what to collect per service.
pub fn generate_properties_guide(services: &[Service]) -> String {
    let mut lines = Vec::new();
    for service in services.iter().filter(|s| !s.properties.is_empty()) {
        let mut line = format!("{}:", service.name);
        if !service.properties.required.is_empty() {
            let required: Vec<String> =
                service.properties.required.iter().map(guide_entry).collect();
            line.push_str(&format!(" always ask for {}.", required.join("; ")));
        }
        if !service.properties.optional.is_empty() {
            let optional: Vec<String> =
                service.properties.optional.iter().map(guide_entry).collect();
            line.push_str(&format!(" If it fits the conversation, also ask for {}.", optional.join("; ")));
        }
        lines.push(format!("- {line}"));
    }
    if lines.is_empty() {
        return NO_PROPERTIES_GUIDE.to_string();
    }
    lines.join("\n")
}
