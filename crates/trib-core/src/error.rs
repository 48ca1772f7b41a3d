//! Error types for trib-core

use thiserror::Error;

/// Core error type for Tributary
#[derive(Error, Debug)]
pub enum CoreError {
    /// E001: Configuration file not found
    #[error("[E001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// E002: Failed to parse configuration file
    #[error("[E002] Failed to parse config: {message}")]
    ConfigParseError { message: String },

    /// E003: Invalid configuration value
    #[error("[E003] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// E004: Catalog file could not be parsed
    #[error("[E004] Failed to parse catalog {path}: {message}")]
    CatalogParseError { path: String, message: String },

    /// E005: Relation name does not have the `database.schema.name` shape
    #[error("[E005] Invalid relation name '{name}': expected database.schema.name")]
    InvalidRelationName { name: String },

    /// E006: A record was built with a missing required field
    #[error("[E006] {record} must have {field}")]
    MissingField {
        record: &'static str,
        field: &'static str,
    },

    /// E007: Empty name where a non-empty one is required
    #[error("[E007] Empty name not allowed: {context}")]
    EmptyName { context: String },

    /// E008: Unknown enumeration value (dependency kind, BI tool, ...)
    #[error("[E008] Invalid {kind} '{value}'")]
    InvalidVariant { kind: &'static str, value: String },

    /// IO error with file path context
    #[error("IO error on {path}: {source}")]
    IoWithPath {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;

impl From<serde_yaml::Error> for CoreError {
    fn from(err: serde_yaml::Error) -> Self {
        CoreError::ConfigParseError {
            message: err.to_string(),
        }
    }
}
