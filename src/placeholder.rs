//! Flat `{{name}}` substitution.
use regex::{Captures, Regex};
use std::collections::BTreeSet;
use std::sync::OnceLock;

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("regex for placeholders")
    })
}

/// Result of one substitution pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substituted {
    pub text: String,
    pub resolved: BTreeSet<String>,
    pub unresolved: BTreeSet<String>,
}

/// Replace every placeholder whose key `lookup` can answer.
pub fn substitute<'a, F>(text: &str, lookup: F) -> Substituted
where
    F: Fn(&str) -> Option<&'a str>,
{
    let mut resolved = BTreeSet::new();
    let mut unresolved = BTreeSet::new();
    let replaced = placeholder_regex().replace_all(text, |caps: &Captures| {
        let key = &caps[1];
        match lookup(key) {
            Some(value) => {
                resolved.insert(key.to_string());
                value.to_string()
            }
            None => {
                unresolved.insert(key.to_string());
                caps[0].to_string()
            }
        }
    });
    Substituted {
        text: replaced.into_owned(),
        resolved,
        unresolved,
    }
}
