//! Configuration module.
//!
//! Loads configuration from environment variables. Missing required values
//! surface as [`Error::ConfigMissing`] so startup aborts before any
//! connection is attempted.

use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use crate::chatlog::SinkConfig;
use crate::error::Error;

/// Default chat log label, used in rotation file names and queue metadata.
const DEFAULT_LOG_LABEL: &str = "DISCORD";

/// Default rotation threshold (entries per file).
const DEFAULT_ROTATE_ENTRIES: usize = 1000;

/// Default cache TTL in minutes.
const DEFAULT_CACHE_EXPIRY_MINUTES: i64 = 1;

/// Default cache capacity (entries per cache).
const DEFAULT_CACHE_CAPACITY: usize = 100;

/// Default AMQP port.
const DEFAULT_RMQ_PORT: u16 = 5672;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Platform client id, held for the gateway collaborator.
    pub client_id: Option<String>,
    /// Platform client secret, held for the gateway collaborator.
    pub client_secret: Option<String>,
    /// Platform bot token, required by the gateway to authenticate.
    pub bot_token: String,

    /// Log backend: local rotating files or a remote queue.
    pub log_backend: SinkConfig,

    /// Metadata cache TTL. `None` means entries never expire.
    pub cache_expiry: Option<Duration>,
    /// Metadata cache capacity (entries per cache).
    pub cache_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables (after `.env`).
    pub fn from_env() -> Result<Self, Error> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;
        info!(backend = ?config.log_backend_kind(), "configuration loaded");
        Ok(config)
    }

    /// Build configuration from an arbitrary variable source.
    pub(crate) fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let bot_token = get("BOT_TOKEN").ok_or(Error::ConfigMissing("BOT_TOKEN"))?;

        let log_backend = if let Some(directory) = get("LOG_DIR") {
            SinkConfig::File {
                directory: PathBuf::from(directory),
                label: get("LOG_LABEL").unwrap_or_else(|| DEFAULT_LOG_LABEL.to_string()),
                max_entries_per_file: get("LOG_ROTATE_ENTRIES")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_ROTATE_ENTRIES),
            }
        } else if let Some(host) = get("RMQ_HOSTNAME") {
            SinkConfig::Queue {
                host,
                port: get("RMQ_PORT")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_RMQ_PORT),
                username: get("RMQ_USERNAME").ok_or(Error::ConfigMissing("RMQ_USERNAME"))?,
                password: get("RMQ_PASSWORD").ok_or(Error::ConfigMissing("RMQ_PASSWORD"))?,
                queue_name: get("LOG_QUEUE").ok_or(Error::ConfigMissing("LOG_QUEUE"))?,
            }
        } else {
            return Err(Error::ConfigMissing("LOG_DIR or RMQ_HOSTNAME"));
        };

        let cache_expiry_minutes = get("CACHE_EXPIRY")
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(DEFAULT_CACHE_EXPIRY_MINUTES);
        // Zero or negative is the explicit "never expires" sentinel.
        let cache_expiry = if cache_expiry_minutes > 0 {
            Some(Duration::from_secs(cache_expiry_minutes as u64 * 60))
        } else {
            None
        };

        let cache_capacity = get("CACHE_CAPACITY")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_CACHE_CAPACITY);

        Ok(Self {
            client_id: get("CLIENT_ID"),
            client_secret: get("CLIENT_SECRET"),
            bot_token,
            log_backend,
            cache_expiry,
            cache_capacity,
        })
    }

    fn log_backend_kind(&self) -> &'static str {
        match self.log_backend {
            SinkConfig::File { .. } => "file",
            SinkConfig::Queue { .. } => "queue",
        }
    }
}
