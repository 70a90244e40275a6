//! Configuration management for the server.

use std::env;
use std::fmt;
use std::time::Duration;

use tally_engine::DEFAULT_BATCH_SIZE;

/// Server configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// SQLite URL of the local staging table
    pub local_database_url: String,
    /// PostgreSQL URL of the remote table
    pub remote_database_url: String,
    /// Bot token used to verify init data
    pub bot_token: String,
    /// Time between reconciliation ticks
    pub sync_interval: Duration,
    /// Rows drained per tick
    pub sync_batch_size: usize,
    /// Upper bound for a single remote call
    pub remote_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = lookup("PORT")
            .unwrap_or_else(|| "8000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let local_database_url =
            lookup("LOCAL_DATABASE_URL").unwrap_or_else(|| "sqlite://tally.db".to_string());

        let remote_database_url =
            lookup("REMOTE_DATABASE_URL").ok_or(ConfigError::MissingRemoteDatabaseUrl)?;

        let bot_token = lookup("BOT_TOKEN").ok_or(ConfigError::MissingBotToken)?;

        let number = |name: &'static str, default: u64| positive(name, lookup(name), default);
        let sync_interval = Duration::from_secs(number("SYNC_INTERVAL_SECS", 600)?);
        let sync_batch_size = number("SYNC_BATCH_SIZE", DEFAULT_BATCH_SIZE as u64)? as usize;
        let remote_timeout = Duration::from_millis(number("REMOTE_TIMEOUT_MS", 5_000)?);

        Ok(Self {
            host,
            port,
            local_database_url,
            remote_database_url,
            bot_token,
            sync_interval,
            sync_batch_size,
            remote_timeout,
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("local_database_url", &self.local_database_url)
            .field("remote_database_url", &"<redacted>")
            .field("bot_token", &"<redacted>")
            .field("sync_interval", &self.sync_interval)
            .field("sync_batch_size", &self.sync_batch_size)
            .field("remote_timeout", &self.remote_timeout)
            .finish()
    }
}

fn positive(name: &'static str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    let value = match raw {
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidNumber(name))?,
        None => default,
    };
    if value == 0 {
        return Err(ConfigError::InvalidNumber(name));
    }
    Ok(value)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("REMOTE_DATABASE_URL environment variable is required")]
    MissingRemoteDatabaseUrl,

    #[error("BOT_TOKEN environment variable is required")]
    MissingBotToken,

    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("{0} must be a positive integer")]
    InvalidNumber(&'static str),
}
