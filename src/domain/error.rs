//! Domain errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Validation: {0}")]
    Validation(String),

    /// Uniqueness violation in the store. For API keys this means the
    /// secret generator produced a duplicate.
    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn key_not_found(id: i32) -> Self {
        Self::NotFound {
            entity: "api_key",
            field: "id",
            value: id.to_string(),
        }
    }

    pub fn name_not_found(name: &str) -> Self {
        Self::NotFound {
            entity: "api_key",
            field: "name",
            value: name.to_string(),
        }
    }

    pub fn secret_not_found() -> Self {
        // The secret itself is never echoed back.
        Self::NotFound {
            entity: "api_key",
            field: "key",
            value: "<redacted>".to_string(),
        }
    }
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
