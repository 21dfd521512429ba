use thiserror::Error;
use vetcare_domain::DomainError;

use crate::input::FieldError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] FieldError),
    #[error("Operation not allowed: {0}")]
    Precondition(String),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Not authorized: {0}")]
    Unauthorized(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serde(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Uniqueness and revision conflicts may succeed when retried.
    pub fn is_conflict(&self) -> bool {
        matches!(self, CoreError::Conflict(_))
    }

    /// Failures originating below the service layer.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            CoreError::Storage(_) | CoreError::Serde(_) | CoreError::Io(_)
        )
    }
}

impl From<DomainError> for CoreError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(message) => CoreError::Validation(message),
            DomainError::Precondition(message) => CoreError::Precondition(message),
            DomainError::NotFound(what) => CoreError::NotFound {
                entity: "record",
                id: what,
            },
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serde(err.to_string())
    }
}
