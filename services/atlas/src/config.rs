//! services/atlas/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use atlas_core::Tunables;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the hosted project, e.g. `https://xyz.supabase.co`.
    pub api_url: String,
    /// Public (anonymous) API key sent with every request.
    pub anon_key: String,
    pub session_path: PathBuf,
    pub log_level: Level,
    pub page_size: usize,
    pub cache_ttl: Duration,
    pub vote_cooldown: Duration,
    pub search_debounce: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // --- Backend Settings ---
        let api_url = lookup("ATLAS_API_URL")
            .ok_or_else(|| ConfigError::MissingVar("ATLAS_API_URL".to_string()))?
            .trim_end_matches('/')
            .to_string();
        let anon_key = lookup("ATLAS_ANON_KEY")
            .ok_or_else(|| ConfigError::MissingVar("ATLAS_ANON_KEY".to_string()))?;
        let session_path = lookup("ATLAS_SESSION_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./.atlas-session.json"));

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Client Tunables ---
        let page_size: usize = parse_or(&lookup, "ATLAS_PAGE_SIZE", 10)?;
        if page_size == 0 {
            return Err(ConfigError::InvalidValue(
                "ATLAS_PAGE_SIZE".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let cache_ttl = Duration::from_secs(parse_or(&lookup, "ATLAS_CACHE_TTL_SECS", 300)?);
        let vote_cooldown =
            Duration::from_millis(parse_or(&lookup, "ATLAS_VOTE_COOLDOWN_MS", 500)?);
        let search_debounce =
            Duration::from_millis(parse_or(&lookup, "ATLAS_SEARCH_DEBOUNCE_MS", 300)?);

        Ok(Self {
            api_url,
            anon_key,
            session_path,
            log_level,
            page_size,
            cache_ttl,
            vote_cooldown,
            search_debounce,
        })
    }

    pub fn tunables(&self) -> Tunables {
        Tunables {
            page_size: self.page_size,
            cache_ttl: self.cache_ttl,
            vote_cooldown: self.vote_cooldown,
            search_debounce: self.search_debounce,
            ..Tunables::default()
        }
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
    }
}
