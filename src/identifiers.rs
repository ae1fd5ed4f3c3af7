//! Deterministic endpoint identifiers for externally routed callbacks.
//!
//! A hash is a pure function of the business name and the logical tool
//! name, so the agent descriptor and the workflow triggers compiled in the
//! same (or any later) build always agree on routing paths.
use serde::Serialize;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_HASH_LENGTH: usize = 8;
pub const MIN_HASH_LENGTH: usize = 4;

/// Logical tools exposed by the agent and backed by workflows.
pub const KNOWN_TOOLS: [&str; 6] = [
    "check_availability",
    "book_appointment",
    "modify_appointment",
    "cancel_appointment",
    "answer_question",
    "log_call",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha224,
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha224 => "sha224",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    /// Length of the full lower-case hex digest.
    pub fn hex_len(&self) -> usize {
        match self {
            HashAlgorithm::Sha224 => 56,
            HashAlgorithm::Sha256 => 64,
            HashAlgorithm::Sha384 => 96,
            HashAlgorithm::Sha512 => 128,
        }
    }

    fn digest_hex(&self, input: &[u8]) -> String {
        match self {
            HashAlgorithm::Sha224 => format!("{:x}", Sha224::digest(input)),
            HashAlgorithm::Sha256 => format!("{:x}", Sha256::digest(input)),
            HashAlgorithm::Sha384 => format!("{:x}", Sha384::digest(input)),
            HashAlgorithm::Sha512 => format!("{:x}", Sha512::digest(input)),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "").as_str() {
            "sha224" => Ok(HashAlgorithm::Sha224),
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha384" => Ok(HashAlgorithm::Sha384),
            "sha512" => Ok(HashAlgorithm::Sha512),
            other => Err(format!(
                "unsupported hash algorithm {other:?} (expected sha224, sha256, sha384 or sha512)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashSettings {
    pub algorithm: HashAlgorithm,
    pub length: usize,
}

impl Default for HashSettings {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::default(),
            length: DEFAULT_HASH_LENGTH,
        }
    }
}

impl HashSettings {
    /// Accept `requested` when it fits the algorithm's digest; otherwise fall
    /// back to the default length. The flag reports whether it was accepted.
    pub fn with_length(algorithm: HashAlgorithm, requested: usize) -> (Self, bool) {
        if (MIN_HASH_LENGTH..=algorithm.hex_len()).contains(&requested) {
            (
                Self {
                    algorithm,
                    length: requested,
                },
                true,
            )
        } else {
            (
                Self {
                    algorithm,
                    length: DEFAULT_HASH_LENGTH,
                },
                false,
            )
        }
    }
}

/// Truncated digest of `"{business}-{tool}"`, over `tool_name` exactly as
/// given. [`IdentifierGenerator::identify`] normalizes through [`tool_key`]
/// first, so `hash(b, "Book-Appointment")` is not the hash `identify` issues
/// for the same name.
pub fn hash(business_name: &str, tool_name: &str, settings: &HashSettings) -> String {
    let input = format!("{business_name}-{tool_name}");
    let mut digest = settings.algorithm.digest_hex(input.as_bytes());
    digest.truncate(settings.length.min(settings.algorithm.hex_len()));
    digest
}

/// `{base}/webhook/{endpoint_base}-{hash}`. Trailing slashes on the base are
/// dropped so the path never doubles a separator.
pub fn build_url(base_url: &str, endpoint_base: &str, hash: &str) -> String {
    format!(
        "{}/webhook/{}",
        base_url.trim_end_matches('/'),
        webhook_path(endpoint_base, hash)
    )
}

/// Trigger path segment shared by the callback URL and the workflow node.
pub fn webhook_path(endpoint_base: &str, hash: &str) -> String {
    format!("{endpoint_base}-{hash}")
}

/// `book_appointment` -> `book-appointment`.
pub fn endpoint_base(tool_name: &str) -> String {
    tool_name.trim().replace('_', "-")
}

/// Normalize a tool or workflow name to its logical tool key.
pub fn tool_key(name: &str) -> String {
    name.trim().replace('-', "_").to_ascii_lowercase()
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EndpointIdentifier {
    pub tool_name: String,
    pub hash: String,
    pub url: String,
}

impl EndpointIdentifier {
    pub fn path(&self) -> String {
        webhook_path(&endpoint_base(&self.tool_name), &self.hash)
    }
}

/// Issues identifiers for one business and records each one it hands out.
#[derive(Debug, Clone)]
pub struct IdentifierGenerator {
    business_name: String,
    base_url: String,
    settings: HashSettings,
    issued: BTreeMap<String, EndpointIdentifier>,
}

impl IdentifierGenerator {
    pub fn new(business_name: &str, base_url: &str, settings: HashSettings) -> Self {
        Self {
            business_name: business_name.to_string(),
            base_url: base_url.to_string(),
            settings,
            issued: BTreeMap::new(),
        }
    }

    /// Identifier for a logical tool. The name is normalized with [`tool_key`]
    /// before hashing, so `Book-Appointment` and `book_appointment` share one
    /// endpoint.
    pub fn identify(&mut self, tool_name: &str) -> EndpointIdentifier {
        let key = tool_key(tool_name);
        if let Some(existing) = self.issued.get(&key) {
            return existing.clone();
        }
        let hash = hash(&self.business_name, &key, &self.settings);
        let identifier = EndpointIdentifier {
            url: build_url(&self.base_url, &endpoint_base(&key), &hash),
            tool_name: key.clone(),
            hash,
        };
        self.issued.insert(key, identifier.clone());
        identifier
    }

    /// Every identifier issued so far, ordered by tool name.
    pub fn issued(&self) -> Vec<EndpointIdentifier> {
        self.issued.values().cloned().collect()
    }
}
