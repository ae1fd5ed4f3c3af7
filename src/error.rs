use thiserror::Error;

/// Errors that abort a build before any artifact is written.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("configuration error in {section}: {message}")]
    Configuration { section: String, message: String },

    #[error("constraint violation: {0}")]
    Constraint(#[from] ConstraintViolation),
}

impl BuildError {
    pub fn configuration(section: impl Into<String>, message: impl Into<String>) -> Self {
        BuildError::Configuration {
            section: section.into(),
            message: message.into(),
        }
    }
}

/// Structural bounds or shape rules violated by the configured service list.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConstraintViolation {
    #[error("{count} services configured but at most {max} are allowed")]
    TooManyServices { count: usize, max: usize },

    #[error("service {service:?} defines {count} required properties (max {max})")]
    TooManyRequired {
        service: String,
        count: usize,
        max: usize,
    },

    #[error("service {service:?} defines {count} optional properties (max {max})")]
    TooManyOptional {
        service: String,
        count: usize,
        max: usize,
    },

    #[error("services define {total} dynamic columns in total (max {max})")]
    TooManyColumns { total: usize, max: usize },

    #[error("service slug {slug:?} is used by more than one service")]
    DuplicateSlug { slug: String },

    #[error("service at index {index} has an empty name")]
    EmptyServiceName { index: usize },

    #[error("service {service:?} property {property:?} has unknown type {kind:?} (expected string, number, boolean or enum)")]
    UnknownPropertyType {
        service: String,
        property: String,
        kind: String,
    },

    #[error("service {service:?} property {property:?} is an enum without options")]
    EnumWithoutOptions { service: String, property: String },
}
