//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// What to do when the account document exists but cannot be parsed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CorruptStorePolicy {
    /// Refuse to start; an operator has to repair or remove the file.
    Fail,
    /// Move the unreadable file aside and start with no accounts.
    StartEmpty,
}

impl FromStr for CorruptStorePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "empty" => Ok(Self::StartEmpty),
            other => Err(format!("'{}' is not one of 'fail' or 'empty'", other)),
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub accounts_path: PathBuf,
    pub on_corrupt_store: CorruptStorePolicy,
    pub log_level: Level,
    pub max_upload_bytes: usize,
    pub session_ttl_minutes: i64,
    pub allowed_origin: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 3000)),
            accounts_path: PathBuf::from("./users.json"),
            on_corrupt_store: CorruptStorePolicy::Fail,
            log_level: Level::INFO,
            max_upload_bytes: 10 * 1024 * 1024,
            session_ttl_minutes: 120,
            allowed_origin: "http://localhost:3000".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        let defaults = Self::default();

        // --- Load Server Settings ---
        let bind_address = parse_var("BIND_ADDRESS")?.unwrap_or(defaults.bind_address);
        let allowed_origin =
            std::env::var("ALLOWED_ORIGIN").unwrap_or(defaults.allowed_origin);

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Account Store Settings ---
        let accounts_path = std::env::var("ACCOUNTS_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.accounts_path);
        let on_corrupt_store =
            parse_var("ACCOUNT_STORE_ON_CORRUPT")?.unwrap_or(defaults.on_corrupt_store);

        // --- Load Session and Upload Limits ---
        let max_upload_bytes =
            parse_var("MAX_UPLOAD_BYTES")?.unwrap_or(defaults.max_upload_bytes);
        let session_ttl_minutes: i64 =
            parse_var("SESSION_TTL_MINUTES")?.unwrap_or(defaults.session_ttl_minutes);
        if session_ttl_minutes <= 0 {
            return Err(ConfigError::InvalidValue(
                "SESSION_TTL_MINUTES".to_string(),
                "must be a positive number of minutes".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            accounts_path,
            on_corrupt_store,
            log_level,
            max_upload_bytes,
            session_ttl_minutes,
            allowed_origin,
        })
    }
}

/// Reads an optional variable and parses it, reporting the variable name on failure.
fn parse_var<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_store_policy_parses_known_values() {
        assert_eq!("fail".parse::<CorruptStorePolicy>(), Ok(CorruptStorePolicy::Fail));
        assert_eq!("EMPTY".parse::<CorruptStorePolicy>(), Ok(CorruptStorePolicy::StartEmpty));
        assert!("ignore".parse::<CorruptStorePolicy>().is_err());
    }

    #[test]
    fn parse_var_reports_the_variable_name() {
        std::env::set_var("ENHANCER_TEST_BAD_NUMBER", "ten");
        let err = parse_var::<usize>("ENHANCER_TEST_BAD_NUMBER").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(name, _) if name == "ENHANCER_TEST_BAD_NUMBER"));
        assert!(parse_var::<usize>("ENHANCER_TEST_UNSET_VAR").unwrap().is_none());
    }
}
