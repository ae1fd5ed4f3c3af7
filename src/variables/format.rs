use crate::services::Service;
use crate::util::title_case;
use serde_json::Value;

pub const DAYS: [(&str, &str); 7] = [
    ("monday", "Monday"),
    ("tuesday", "Tuesday"),
    ("wednesday", "Wednesday"),
    ("thursday", "Thursday"),
    ("friday", "Friday"),
    ("saturday", "Saturday"),
    ("sunday", "Sunday"),
];

pub const NO_HOURS_FALLBACK: &str = "Please contact us for our current hours.";
pub const GENERIC_BUSINESS_NAME: &str = "My Business";

/// Tokens that describe the repository rather than the business.
const REPOSITORY_STOPWORDS: [&str; 17] = [
    "template",
    "templates",
    "voice",
    "agent",
    "agents",
    "ai",
    "bot",
    "receptionist",
    "assistant",
    "retell",
    "n8n",
    "workflow",
    "workflows",
    "repo",
    "starter",
    "kit",
    "config",
];

pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn day_hours(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            let text = text.trim();
            if text.is_empty() || text.eq_ignore_ascii_case("closed") {
                None
            } else {
                Some(text.to_string())
            }
        }
        Value::Object(map) => {
            if map.get("closed").and_then(Value::as_bool).unwrap_or(false) {
                return None;
            }
            if let Some(hours) = map.get("hours").and_then(scalar_to_string) {
                return day_hours(&Value::String(hours));
            }
            let open = map.get("open").and_then(Value::as_str).map(str::trim);
            let close = map.get("close").and_then(Value::as_str).map(str::trim);
            match (open, close) {
                (Some(open), Some(close)) if !open.is_empty() && !close.is_empty() => {
                    Some(format!("{open} - {close}"))
                }
                _ => None,
            }
        }
        _ => None,
    }
}

/// `Monday: 9-5, Tuesday: 9-5, ...` over the fixed week, skipping closed days.
pub fn format_business_hours(hours: &Value) -> String {
    let open_days: Vec<String> = DAYS
        .iter()
        .filter_map(|(key, label)| {
            hours
                .get(*key)
                .and_then(day_hours)
                .map(|text| format!("{label}: {text}"))
        })
        .collect();
    if open_days.is_empty() {
        NO_HOURS_FALLBACK.to_string()
    } else {
        open_days.join(", ")
    }
}

/// Turn a repository identifier into a display name.
///
/// `acme-dental_voice-agent-template` becomes `Acme Dental`.
pub fn derive_business_name(repository: &str) -> String {
    let spaced = repository.replace(['-', '_'], " ");
    let kept: Vec<&str> = spaced
        .split_whitespace()
        .filter(|word| {
            !REPOSITORY_STOPWORDS
                .iter()
                .any(|stop| stop.eq_ignore_ascii_case(word))
        })
        .collect();
    if kept.is_empty() {
        return GENERIC_BUSINESS_NAME.to_string();
    }
    title_case(&kept.join(" "))
}

pub fn format_address(address: &Value) -> (String, String) {
    if let Some(text) = address.as_str() {
        let text = text.trim().to_string();
        return (text.clone(), text);
    }
    let field = |key: &str| {
        address
            .get(key)
            .and_then(scalar_to_string)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
    };
    let street = field("street");
    let locality = {
        let city = field("city");
        let region = match (field("state"), field("zip")) {
            (Some(state), Some(zip)) => Some(format!("{state} {zip}")),
            (state, zip) => state.or(zip),
        };
        match (city, region) {
            (Some(city), Some(region)) => Some(format!("{city}, {region}")),
            (city, region) => city.or(region),
        }
    };
    let country = field("country");

    let parts: Vec<String> = [street, locality, country].into_iter().flatten().collect();
    (parts.join(", "), parts.join("\n"))
}

pub fn format_services_description(services: &[Service]) -> String {
    services
        .iter()
        .map(|service| {
            let mut facts = vec![format!("{} minutes", service.duration_minutes)];
            if let Some(price) = &service.price {
                facts.push(price.clone());
            }
            let mut line = format!("- {} ({})", service.name, facts.join(", "));
            if let Some(description) = &service.description {
                line.push_str(": ");
                line.push_str(description);
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_faq_block(faqs: &Value) -> String {
    let Some(items) = faqs.as_array() else {
        return String::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let question = item.get("question").and_then(Value::as_str)?.trim();
            let answer = item.get("answer").and_then(Value::as_str)?.trim();
            if question.is_empty() || answer.is_empty() {
                return None;
            }
            Some(format!("Q: {question}\nA: {answer}"))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn policy_entries(policies: &Value) -> Vec<(String, String)> {
    let Some(map) = policies.as_object() else {
        return Vec::new();
    };
    map.iter()
        .filter_map(|(key, value)| {
            scalar_to_string(value)
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
                .map(|text| (key.clone(), text))
        })
        .collect()
}

pub fn format_policies_block(entries: &[(String, String)]) -> String {
    entries
        .iter()
        .map(|(key, text)| format!("- {}: {}", crate::util::snake_to_title(key), text))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
#[path = "format_tests.rs"]
mod tests;
