use crate::domain::{
    error::DomainError,
    models::credential::{HashedPassword, PlainPassword},
};

/// Service for hashing and verifying passwords.
///
/// Both operations are CPU and memory bound. Callers on an async runtime go
/// through `HashingPool` rather than invoking them directly.
pub trait PasswordHasher: Clone {
    /// Hash a plain text password with a fresh salt
    fn hash(&self, plain_password: &PlainPassword) -> Result<HashedPassword, DomainError>;

    /// Verify a plain text password against an encoded hash.
    /// Malformed or unsupported hashes yield `Ok(false)`.
    fn verify(
        &self,
        plain_password: &PlainPassword,
        hashed_password: &HashedPassword,
    ) -> Result<bool, DomainError>;
}
