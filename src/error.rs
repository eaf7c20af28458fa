//! Error types for doclens.
//!
//! All errors are strongly typed using thiserror. Almost every failure inside
//! the crate has a fallback (no match, dropped field, empty store), so these
//! types surface only at construction, explicit saves, and poisoned locks.

use std::path::PathBuf;

use thiserror::Error;

/// Validation errors raised while checking input values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Document key cannot be empty")]
    EmptyKey,

    #[error("Field '{field}' has an empty value")]
    EmptyValue {
        field: String,
    },

    #[error("Field '{field}' value '{value}' is not a valid name")]
    InvalidName {
        field: String,
        value: String,
    },

    #[error("Field '{field}' value '{value}' is not an unsigned amount")]
    InvalidAmount {
        field: String,
        value: String,
    },

    #[error("Field '{field}' value '{value}' is not a calendar date")]
    InvalidDate {
        field: String,
        value: String,
    },

    #[error("Year {year} is out of range [{min}, {max}]")]
    YearOutOfRange {
        year: i32,
        min: i32,
        max: i32,
    },

    #[error("Invalid year range: {low} must not exceed {high}")]
    InvalidYearRange {
        low: i32,
        high: i32,
    },

    #[error("Invalid {name} pattern: {reason}")]
    InvalidPattern {
        name: String,
        reason: String,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

impl ValidationError {
    /// Name of the field the error refers to, if any.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::EmptyValue { field }
            | Self::InvalidName { field, .. }
            | Self::InvalidAmount { field, .. }
            | Self::InvalidDate { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Errors from the metadata store and its persistence layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Store file {path} is corrupt: {reason}")]
    Corrupt {
        path: PathBuf,
        reason: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Poisoned lock: {0}")]
    PoisonedLock(&'static str),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Top-level error type for doclens.
#[derive(Debug, Error)]
pub enum LensError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {message}")]
    Config {
        message: String,
    },
}

impl LensError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a storage error.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}

impl From<figment::Error> for LensError {
    fn from(err: figment::Error) -> Self {
        Self::config(err.to_string())
    }
}

/// Result type alias for doclens operations.
pub type LensResult<T> = Result<T, LensError>;
