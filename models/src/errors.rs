// models/src/errors.rs
use std::fmt;
use std::io;
pub use thiserror::Error;
use uuid::Error as UuidError;
use anyhow::Error as AnyhowError;
use serde_json::Error as SerdeJsonError;
use serde::{Serialize, Deserialize};
use tokio::task::JoinError;

#[derive(Debug, Serialize, Deserialize, Error, Clone, PartialEq)]
pub enum ClinicError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String), // Missing, malformed, expired or unresolvable credential
    #[error("Access denied: {0}")]
    Forbidden(String), // Role or ownership check failed
    #[error("{0} not found")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(ValidationErrors),
    #[error("Conflict: {0}")]
    Conflict(String), // Duplicate unique key, double-booked slot, stale version
    #[error("{0}")]
    InvalidState(String), // Status precondition not met for the requested transition
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("An internal error occurred: {0}")]
    InternalError(String),
}

impl ClinicError {
    /// Shorthand for a validation failure on a single field.
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        ClinicError::Validation(ValidationErrors::single(field, message))
    }

    /// Errors the caller cannot act on. The API layer hides their details.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            ClinicError::StorageError(_)
                | ClinicError::Serialization(_)
                | ClinicError::Io(_)
                | ClinicError::ConfigurationError(_)
                | ClinicError::InternalError(_)
        )
    }
}

// Implement the From trait for &str
impl From<&str> for ClinicError {
    fn from(error: &str) -> Self {
        ClinicError::InternalError(error.to_string())
    }
}

// Implement From for serde_json::Error
impl From<SerdeJsonError> for ClinicError {
    fn from(err: SerdeJsonError) -> Self {
        ClinicError::Serialization(format!("JSON serialization error: {}", err))
    }
}

// Implement From for anyhow::Error
impl From<AnyhowError> for ClinicError {
    fn from(err: AnyhowError) -> Self {
        ClinicError::StorageError(format!("Underlying storage operation failed: {}", err))
    }
}

// Implement From for JoinError
impl From<JoinError> for ClinicError {
    fn from(err: JoinError) -> Self {
        ClinicError::InternalError(format!("Task failed to join: {}", err))
    }
}

// Implement From for io::Error
impl From<io::Error> for ClinicError {
    fn from(err: io::Error) -> Self {
        ClinicError::Io(format!("IO error: {}", err))
    }
}

// Implement From for UuidError
impl From<UuidError> for ClinicError {
    fn from(err: UuidError) -> Self {
        ClinicError::StorageError(format!("UUID error: {}", err))
    }
}

// Implement From for ValidationErrors
impl From<ValidationErrors> for ClinicError {
    fn from(err: ValidationErrors) -> Self {
        ClinicError::Validation(err)
    }
}

// Implement From for sled::Error
#[cfg(feature = "sled-errors")]
impl From<sled::Error> for ClinicError {
    fn from(err: sled::Error) -> Self {
        ClinicError::StorageError(format!("Sled error: {}", err))
    }
}

/// One offending input field.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Every field that failed validation for a single request.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Default)]
#[serde(transparent)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError { field: field.to_string(), message: message.into() });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.field.as_str()).collect()
    }

    /// Turns the collected failures into an error, or `Ok` when nothing was collected.
    pub fn into_result(self) -> ValidationResult<()> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|e| format!("{}: {}", e.field, e.message)).collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// A type alias for a `Result` that returns a `ClinicError` on failure.
pub type ClinicResult<T> = Result<T, ClinicError>;

/// A type alias for a `Result` that returns `ValidationErrors` on failure.
pub type ValidationResult<T> = Result<T, ValidationErrors>;
