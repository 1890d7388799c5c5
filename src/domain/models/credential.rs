use zeroize::Zeroizing;

use crate::domain::error::DomainError;

/// Plaintext password accepted for hashing or verification.
///
/// The buffer is wiped on drop. Length is bounded in bytes because Argon2
/// prehashes the whole input and callers should not be able to push
/// arbitrarily large payloads through the blocking pool.
#[derive(Clone)]
pub struct PlainPassword(Zeroizing<String>);

impl PlainPassword {
    pub fn new(value: String, max_bytes: usize) -> Result<Self, DomainError> {
        let value = Zeroizing::new(value);
        if value.is_empty() {
            return Err(DomainError::EmptyPassword);
        }
        if value.len() > max_bytes {
            return Err(DomainError::PasswordTooLong {
                max: max_bytes,
                actual: value.len(),
            });
        }
        Ok(Self(value))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

// never print the secret
impl std::fmt::Debug for PlainPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PlainPassword(***)")
    }
}

/// Value object representing an encoded (PHC) password hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedPassword(String);

impl HashedPassword {
    /// Wrap a hash received from a caller. Only emptiness is checked here,
    /// format problems are the hasher's business.
    pub fn parse(hash: String) -> Result<Self, DomainError> {
        if hash.is_empty() {
            return Err(DomainError::EmptyHash);
        }
        Ok(Self(hash))
    }

    /// Create a new HashedPassword from a string the hasher just produced
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    /// Get the hash as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}
