//! Recoverable build problems.
//!
//! Warnings are collected for the build report and echoed to the log as they
//! are recorded; they never stop a build.
use serde::Serialize;
use std::fmt;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A JSON-bearing artifact failed to parse and was emitted unchanged.
    Parse,
    /// An env indirection, placeholder, or injection target could not be found.
    Reference,
    /// An optional configuration field was missing or unusable.
    Config,
}

impl WarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningKind::Parse => "parse",
            WarningKind::Reference => "reference",
            WarningKind::Config => "config",
        }
    }
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct Warning {
    pub kind: WarningKind,
    pub subject: String,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.subject, self.message)
    }
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, kind: WarningKind, subject: impl Into<String>, message: impl Into<String>) {
        let warning = Warning {
            kind,
            subject: subject.into(),
            message: message.into(),
        };
        tracing::warn!(
            kind = warning.kind.as_str(),
            subject = %warning.subject,
            "{}",
            warning.message
        );
        self.warnings.push(warning);
    }

    #[cfg(test)]
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    #[cfg(test)]
    pub fn count(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}
