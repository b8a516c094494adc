use thiserror::Error;

/// Failure reported by an external collaborator (ledger query, address decoding).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    /// The collaborator could not be reached or answered with a transport error.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The collaborator answered, but the payload could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl CollaboratorError {
    /// Signal-level faults degrade to a zero contribution; only an unreachable
    /// collaborator aborts a classification.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CollaboratorError::Unavailable(_))
    }
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("classification unavailable: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("registry error: {0}")]
    Registry(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ClassifyError>;
