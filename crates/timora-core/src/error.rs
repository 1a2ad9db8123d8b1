//! Core error types for timora-core.
//!
//! Every failure in the core is either corrected locally or reported upward
//! as one of these recoverable variants; nothing here terminates the process.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for timora-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed request, rejected before generation.
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    /// A substituted plan broke one of the scheduling rules.
    #[error("Rule violation: {0}")]
    RuleViolation(#[from] RuleViolation),

    /// Writing to the external progress store failed.
    #[error("Persistence failure: {0}")]
    Persistence(#[from] PersistenceFailure),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Remote optimizer transport or payload errors
    #[error("Optimizer error: {0}")]
    Optimizer(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Request validation errors (the `InvalidRequest` family).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Empty collection
    #[error("Empty collection: {0}")]
    EmptyCollection(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// The rule set cannot produce a day inside 00:00-24:00.
    #[error("Rule set does not fit in a day: {0}")]
    UnsatisfiableRules(String),
}

impl ValidationError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// A plan that does not satisfy the rule set.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleViolation {
    #[error("expected {expected} days, plan has {actual}")]
    DayCount { expected: u32, actual: usize },

    #[error("day {day}: {message}")]
    Day { day: u32, message: String },

    #[error("malformed plan: {0}")]
    Malformed(String),
}

impl RuleViolation {
    pub fn day(day: u32, message: impl Into<String>) -> Self {
        RuleViolation::Day {
            day,
            message: message.into(),
        }
    }
}

/// Failed write against the external progress store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PersistenceFailure {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("write rejected: {0}")]
    Rejected(String),

    #[error("gave up after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

impl PersistenceFailure {
    /// Rejections are permanent; everything else is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PersistenceFailure::Unavailable(_))
    }
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-path key
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseBusy
                    || err.code == rusqlite::ErrorCode::DatabaseLocked
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(err: reqwest::Error) -> Self {
        CoreError::Optimizer(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
