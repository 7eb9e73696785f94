use thiserror::Error;

/// Rejected payload. Raised before anything is written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Validation error on `{field}`: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors surfaced by progress store operations. Remote and cache failures
/// never appear here; they are absorbed by the fallback path.
#[derive(Debug, Error)]
pub enum ProgressError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
}

impl ProgressError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        ProgressError::NotFound {
            kind,
            id: id.into(),
        }
    }
}
