//! Error types for resource admission

use crate::validation::FieldErrors;
use thiserror::Error;

/// Errors that can occur when admitting resources
#[derive(Debug, Error)]
pub enum CrdError {
    /// The object failed validation; every offending field is listed
    #[error("{kind} \"{name}\" is invalid: {errors}")]
    Invalid {
        kind: String,
        name: String,
        errors: FieldErrors,
    },
}

impl CrdError {
    /// Field errors carried by an `Invalid` error
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            CrdError::Invalid { errors, .. } => Some(errors),
        }
    }
}

/// Result type for resource operations
pub type Result<T> = std::result::Result<T, CrdError>;
