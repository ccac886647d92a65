//! Error types for recurrence-engine operations.

use thiserror::Error;

/// Why a source record's recurrence rule was rejected by the extractor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid range: start {start} is after end {end}")]
    InvalidRange { start: String, end: String },

    #[error("Invalid cadence: {0}")]
    InvalidCadence(String),

    #[error("Invalid interval: {value} (allowed 1..={max})")]
    InvalidInterval { value: i64, max: u32 },

    #[error("Invalid repeat count: {value} (allowed 1..={max})")]
    InvalidCount { value: i64, max: u32 },

    #[error("Missing stop condition: either a repeat count or a repeat end date is required")]
    MissingStopCondition,

    #[error("Conflicting stop condition: a repeat count and a repeat end date were both given")]
    ConflictingStopCondition,

    #[error("Start date {start} is more than {max_years} years in the future")]
    DateTooFarFuture { start: String, max_years: u32 },
}

/// Failure reported by a [`crate::storage::Storage`] collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Unknown record type: {0}")]
    UnknownType(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Non-fatal failure while copying one attribute onto a generated occurrence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("Field '{field}' expects {expected}, found {found}")]
    KindMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Failure of a whole synchronization run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(#[from] ValidationError),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),
}

impl From<StorageError> for SyncError {
    fn from(err: StorageError) -> Self {
        SyncError::GenerationFailed(err.to_string())
    }
}

/// Invalid [`crate::config::EngineConfig`] values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid engine config: {0} must be at least 1")]
    ZeroLimit(&'static str),

    #[error("Invalid timezone: '{0}'")]
    InvalidTimezone(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
