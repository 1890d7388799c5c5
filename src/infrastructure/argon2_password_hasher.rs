use std::sync::Arc;

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordVerifier, Version,
    password_hash::{Error as PasswordHashError, PasswordHasher as _, SaltString},
};
use rand_core::{OsRng, TryRngCore};
use tracing::debug;

use crate::domain::{
    error::DomainError,
    models::credential::{HashedPassword, PlainPassword},
    services::password_service::PasswordHasher,
};

/// Salt length in bytes (encodes to 22 base64 characters in the PHC string)
pub const SALT_LEN: usize = 16;

/// Argon2id cost parameters.
///
/// The defaults are the floor for newly produced hashes: 256 MiB of memory,
/// 6 passes, 1 lane. The same type doubles as the ceiling applied to
/// parameters embedded in hashes presented for verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Cost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Argon2Cost {
    pub const MIN_MEMORY_KIB: u32 = 256 * 1024;
    pub const MIN_ITERATIONS: u32 = 6;
    pub const MAX_PARALLELISM: u32 = 16;

    pub fn params(&self) -> Result<Params, argon2::Error> {
        Params::new(self.memory_kib, self.iterations, self.parallelism, None)
    }

    fn admits(&self, params: &Params) -> bool {
        params.m_cost() <= self.memory_kib
            && params.t_cost() <= self.iterations
            && params.p_cost() <= self.parallelism
    }
}

impl Default for Argon2Cost {
    fn default() -> Self {
        Self {
            memory_kib: Self::MIN_MEMORY_KIB,
            iterations: Self::MIN_ITERATIONS,
            parallelism: 1,
        }
    }
}

#[derive(Clone)]
pub struct Argon2PasswordHasher {
    params: Params,
    verify_limit: Argon2Cost,
    // hash of a random secret at the configured cost, burned through when a
    // presented hash is rejected before any Argon2 work
    dummy_hash: Arc<str>,
}

impl Argon2PasswordHasher {
    /// Runs one full hash at `cost` to produce the dummy hash
    pub fn new(cost: Argon2Cost, verify_limit: Argon2Cost) -> Result<Self, DomainError> {
        let params = cost
            .params()
            .map_err(|e| DomainError::HashFailed(e.to_string()))?;

        let mut secret = [0u8; SALT_LEN];
        OsRng
            .try_fill_bytes(&mut secret)
            .map_err(|e| DomainError::SaltGeneration(e.to_string()))?;
        let dummy_hash = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.clone())
            .hash_password(&secret, &Self::generate_salt()?)
            .map_err(|e| DomainError::HashFailed(e.to_string()))?
            .to_string();

        Ok(Self {
            params,
            verify_limit,
            dummy_hash: dummy_hash.into(),
        })
    }

    /// Tiny parameters so tests don't allocate 256 MiB per hash
    #[cfg(test)]
    pub fn cheap() -> Self {
        let cost = Argon2Cost {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        };
        Self::new(cost, cost).expect("Invalid Argon2 params")
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Spend the same work a real verification would, then report no match
    fn reject(&self, plain_password: &PlainPassword) -> Result<bool, DomainError> {
        if let Ok(dummy) = PasswordHash::new(&self.dummy_hash) {
            let _ = self.argon2().verify_password(plain_password.as_bytes(), &dummy);
        }
        Ok(false)
    }

    fn generate_salt() -> Result<SaltString, DomainError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|e| DomainError::SaltGeneration(e.to_string()))?;

        SaltString::encode_b64(&salt).map_err(|e| DomainError::SaltGeneration(e.to_string()))
    }
}

impl PasswordHasher for Argon2PasswordHasher {
    fn hash(&self, plain_password: &PlainPassword) -> Result<HashedPassword, DomainError> {
        let salt = Self::generate_salt()?;

        let hash = self
            .argon2()
            .hash_password(plain_password.as_bytes(), &salt)
            .map_err(|e| DomainError::HashFailed(e.to_string()))?
            .to_string();

        Ok(HashedPassword::new(hash))
    }

    // Every rejection of the stored hash collapses into Ok(false) after a
    // dummy verification at the configured cost, so neither the response nor
    // its latency tells a malformed hash apart from a wrong password.
    // Digest comparison happens inside password-hash's constant-time Output eq.
    fn verify(
        &self,
        plain_password: &PlainPassword,
        hashed_password: &HashedPassword,
    ) -> Result<bool, DomainError> {
        let parsed_hash = match PasswordHash::new(hashed_password.as_str()) {
            Ok(hash) => hash,
            Err(e) => {
                debug!(error = %e, "unparsable password hash");
                return self.reject(plain_password);
            }
        };

        if parsed_hash.algorithm != Algorithm::Argon2id.ident() {
            debug!(algorithm = %parsed_hash.algorithm, "unsupported hash algorithm");
            return self.reject(plain_password);
        }

        let params = match Params::try_from(&parsed_hash) {
            Ok(params) => params,
            Err(e) => {
                debug!(error = %e, "invalid argon2 parameters in hash");
                return self.reject(plain_password);
            }
        };

        if !self.verify_limit.admits(&params) {
            debug!(
                m_cost = params.m_cost(),
                t_cost = params.t_cost(),
                p_cost = params.p_cost(),
                "hash parameters exceed verification ceiling"
            );
            return self.reject(plain_password);
        }

        match Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
            .verify_password(plain_password.as_bytes(), &parsed_hash)
        {
            Ok(()) => Ok(true),
            Err(PasswordHashError::Password) => Ok(false),
            Err(e) => {
                debug!(error = %e, "password hash rejected");
                Ok(false)
            }
        }
    }
}
