//! Environment driven settings.
//!
//! Everything has a default so the service starts with no `.env` at all.
//! Argon2 costs can only be raised above the built in floor.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    str::FromStr,
    time::Duration,
};

use thiserror::Error;

use crate::infrastructure::argon2_password_hasher::Argon2Cost;

pub const DEFAULT_PORT: u16 = 4002;
pub const DEFAULT_MAX_PASSWORD_BYTES: usize = 1024;
pub const DEFAULT_MAX_CONCURRENT_HASHES: usize = 4;
pub const DEFAULT_ADMISSION_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_HASH_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("{key} must be at least {min}, got {actual}")]
    TooLow {
        key: &'static str,
        min: u64,
        actual: u64,
    },

    #[error("{key} must be at most {max}, got {actual}")]
    TooHigh {
        key: &'static str,
        max: u64,
        actual: u64,
    },
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub addr: SocketAddr,
    pub max_password_bytes: usize,
    pub max_concurrent_hashes: usize,
    pub admission_timeout: Duration,
    pub hash_timeout: Duration,
    pub cost: Argon2Cost,
    pub verify_limit: Argon2Cost,
    pub strict_status_codes: bool,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| dotenvy::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host: IpAddr = parse_or(&lookup, "HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?;
        let port: u16 = parse_or(&lookup, "PORT", DEFAULT_PORT)?;

        let max_password_bytes = parse_or(&lookup, "MAX_PASSWORD_BYTES", DEFAULT_MAX_PASSWORD_BYTES)?;
        at_least("MAX_PASSWORD_BYTES", max_password_bytes as u64, 1)?;

        let max_concurrent_hashes =
            parse_or(&lookup, "MAX_CONCURRENT_HASHES", DEFAULT_MAX_CONCURRENT_HASHES)?;
        at_least("MAX_CONCURRENT_HASHES", max_concurrent_hashes as u64, 1)?;

        let admission_timeout_ms =
            parse_or(&lookup, "ADMISSION_TIMEOUT_MS", DEFAULT_ADMISSION_TIMEOUT_MS)?;
        at_least("ADMISSION_TIMEOUT_MS", admission_timeout_ms, 1)?;

        let hash_timeout_ms = parse_or(&lookup, "HASH_TIMEOUT_MS", DEFAULT_HASH_TIMEOUT_MS)?;
        at_least("HASH_TIMEOUT_MS", hash_timeout_ms, 1)?;

        let floor = Argon2Cost::default();
        let cost = Argon2Cost {
            memory_kib: parse_or(&lookup, "ARGON2_MEMORY_KIB", floor.memory_kib)?,
            iterations: parse_or(&lookup, "ARGON2_ITERATIONS", floor.iterations)?,
            parallelism: parse_or(&lookup, "ARGON2_PARALLELISM", floor.parallelism)?,
        };
        at_least("ARGON2_MEMORY_KIB", cost.memory_kib.into(), Argon2Cost::MIN_MEMORY_KIB.into())?;
        at_least("ARGON2_ITERATIONS", cost.iterations.into(), Argon2Cost::MIN_ITERATIONS.into())?;
        at_least("ARGON2_PARALLELISM", cost.parallelism.into(), 1)?;
        at_most(
            "ARGON2_PARALLELISM",
            cost.parallelism.into(),
            Argon2Cost::MAX_PARALLELISM.into(),
        )?;

        let verify_limit = Argon2Cost {
            memory_kib: parse_or(&lookup, "ARGON2_MAX_VERIFY_MEMORY_KIB", cost.memory_kib)?,
            iterations: parse_or(&lookup, "ARGON2_MAX_VERIFY_ITERATIONS", cost.iterations)?,
            parallelism: Argon2Cost::MAX_PARALLELISM,
        };
        // hashes we produce ourselves must always stay verifiable
        at_least(
            "ARGON2_MAX_VERIFY_MEMORY_KIB",
            verify_limit.memory_kib.into(),
            cost.memory_kib.into(),
        )?;
        at_least(
            "ARGON2_MAX_VERIFY_ITERATIONS",
            verify_limit.iterations.into(),
            cost.iterations.into(),
        )?;

        let strict_status_codes = parse_or(&lookup, "STRICT_STATUS_CODES", false)?;

        Ok(Self {
            addr: SocketAddr::new(host, port),
            max_password_bytes,
            max_concurrent_hashes,
            admission_timeout: Duration::from_millis(admission_timeout_ms),
            hash_timeout: Duration::from_millis(hash_timeout_ms),
            cost,
            verify_limit,
            strict_status_codes,
        })
    }

    /// Argon2 memory held when every pool slot is busy
    pub fn worst_case_memory_kib(&self) -> u64 {
        self.max_concurrent_hashes as u64 * u64::from(self.cost.memory_kib)
    }
}

fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn at_least(key: &'static str, actual: u64, min: u64) -> Result<(), ConfigError> {
    if actual < min {
        return Err(ConfigError::TooLow { key, min, actual });
    }
    Ok(())
}

fn at_most(key: &'static str, actual: u64, max: u64) -> Result<(), ConfigError> {
    if actual > max {
        return Err(ConfigError::TooHigh { key, max, actual });
    }
    Ok(())
}
