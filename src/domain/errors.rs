use thiserror::Error;

/// Domain-level errors shared across application components.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The incoming payload missed a required field or violated invariants.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested entity was not found in the review store.
    #[error("not found: {0}")]
    NotFound(String),

    /// Catch-all for storage-related failures we don't want to leak directly.
    #[error("storage failure: {0}")]
    Storage(String),

    /// The model call failed (shape mismatch, transport error, malformed output).
    #[error("inference failed: {0}")]
    Inference(String),

    /// The classifier artifact could not be read or parsed.
    #[error("artifact unavailable: {0}")]
    Artifact(String),

    /// Any other unexpected failure.
    #[error("unexpected error: {0}")]
    Other(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    pub fn artifact(msg: impl Into<String>) -> Self {
        Self::Artifact(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Short machine-readable code used in HTTP error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "VALIDATION_FAILED",
            DomainError::NotFound(_) => "NOT_FOUND",
            DomainError::Storage(_) => "STORAGE_FAILED",
            DomainError::Inference(_) => "INFERENCE_FAILED",
            DomainError::Artifact(_) => "ARTIFACT_UNAVAILABLE",
            DomainError::Other(_) => "UNEXPECTED",
        }
    }
}
