use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Empty password")]
    EmptyPassword,

    #[error("Password too long (maximum {max} bytes, got {actual})")]
    PasswordTooLong { max: usize, actual: usize },

    #[error("Empty hash")]
    EmptyHash,

    #[error("Salt generation failed: {0}")]
    SaltGeneration(String),

    #[error("Hashing failed: {0}")]
    HashFailed(String),

    #[error("Hashing pool saturated")]
    Overloaded,

    #[error("Hashing did not complete in time")]
    Timeout,

    #[error("Hashing task failed: {0}")]
    TaskFailed(String),
}

impl DomainError {
    /// true when the caller sent bad input, false for server-side faults
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DomainError::EmptyPassword | DomainError::PasswordTooLong { .. } | DomainError::EmptyHash
        )
    }
}
