//! Error types for tw-core

use thiserror::Error;

/// Core error type for Tidewater
#[derive(Error, Debug)]
pub enum CoreError {
    /// C001: Configuration file not found
    #[error("[C001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// C002: Failed to parse configuration file
    #[error("[C002] Failed to parse config: {message}")]
    ConfigParseError { message: String },

    /// C003: Invalid configuration value
    #[error("[C003] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// C004: Migration step rejected at load time
    #[error("[C004] Invalid migration step at position {position}: {reason}")]
    InvalidMigrationStep { position: usize, reason: String },

    /// C005: Two migration steps share a name
    #[error("[C005] Duplicate migration name '{name}' at positions {first} and {second}")]
    DuplicateMigrationName {
        name: String,
        first: usize,
        second: usize,
    },

    /// C006: Migration file could not be parsed
    #[error("[C006] Failed to parse migration file {path}: {details}")]
    MigrationFileParseError { path: String, details: String },

    /// C007: Unknown frame format
    #[error("[C007] Unknown frame format '{0}': expected 'csv' or 'ndjson'")]
    UnknownFrameFormat(String),

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
