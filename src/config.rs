//! Configuration and settings management
//!
//! Loads settings from config files and environment variables and defines
//! delivery constants.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    #[serde(default)]
    pub bot_token: String,

    /// Older name for the token, used only when `bot_token` is empty
    #[serde(default, skip_serializing)]
    pub telegram_token: Option<String>,

    /// Comma-separated list of channels required for the default category
    pub required_channels: Option<String>,

    /// JSON object mapping a catalog category to its own channel list
    pub category_channels: Option<String>,

    /// JSON-encoded file catalog
    pub file_database: Option<String>,

    /// Second JSON catalog merged on top of `file_database`
    pub file_database_extra: Option<String>,

    /// Port of the liveness endpoint
    #[serde(default = "default_port")]
    pub port: u16,

    /// Chat that receives operator error notifications
    pub admin_id: Option<i64>,

    /// Contact link shown to users when a delivery fails
    pub support_contact: Option<String>,

    /// Seconds before a sent file is deleted from the chat
    #[serde(default = "default_delete_after_secs")]
    pub delete_after_secs: u64,

    /// Timeout for direct-link downloads
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,

    /// Seconds a blocked batch request waits for a membership re-check
    #[serde(default = "default_pending_batch_ttl_secs")]
    pub pending_batch_ttl_secs: u64,
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

const fn default_delete_after_secs() -> u64 {
    DEFAULT_DELETE_AFTER_SECS
}

const fn default_download_timeout_secs() -> u64 {
    DEFAULT_DOWNLOAD_TIMEOUT_SECS
}

const fn default_pending_batch_ttl_secs() -> u64 {
    DEFAULT_PENDING_BATCH_TTL_SECS
}

/// Builds the layered configuration source shared by all settings loaders.
///
/// # Errors
///
/// Returns a `ConfigError` if a source cannot be read.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        .add_source(File::with_name("config/local").required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        // Unprefixed variables: UPPER_SNAKE_CASE maps to snake_case keys
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use filegate_bot::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or the bot token is missing.
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_config(build_config()?)
    }

    /// Deserialize settings from an already built configuration.
    ///
    /// `TELEGRAM_TOKEN` fills in the token only when `BOT_TOKEN` is unset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if deserialization fails or no token is set.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let mut settings: Self = config.try_deserialize()?;

        if settings.bot_token.trim().is_empty() {
            if let Some(token) = settings.telegram_token.take() {
                settings.bot_token = token;
            }
        }
        if settings.bot_token.trim().is_empty() {
            return Err(ConfigError::Message("BOT_TOKEN is not set".to_string()));
        }

        Ok(settings)
    }

    /// Delay before a delivered message is removed
    #[must_use]
    pub const fn delete_after(&self) -> Duration {
        Duration::from_secs(self.delete_after_secs)
    }

    /// Timeout applied to direct-link downloads
    #[must_use]
    pub const fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Lifetime of a pending batch request
    #[must_use]
    pub const fn pending_batch_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_batch_ttl_secs)
    }

    /// Raw catalog blobs in merge order, skipping unset ones
    #[must_use]
    pub fn catalog_sources(&self) -> Vec<&str> {
        [&self.file_database, &self.file_database_extra]
            .into_iter()
            .filter_map(|s| s.as_deref())
            .filter(|s| !s.trim().is_empty())
            .collect()
    }

    /// Per-category channel lists from `CATEGORY_CHANNELS`.
    ///
    /// Malformed JSON is logged and treated as no category overrides.
    #[must_use]
    pub fn category_channel_lists(&self) -> HashMap<String, String> {
        let Some(raw) = self.category_channels.as_deref() else {
            return HashMap::new();
        };
        if raw.trim().is_empty() {
            return HashMap::new();
        }
        match serde_json::from_str::<HashMap<String, String>>(raw) {
            Ok(map) => map,
            Err(e) => {
                warn!(error = %e, "CATEGORY_CHANNELS is not a valid JSON object, ignoring it");
                HashMap::new()
            }
        }
    }
}

/// Default liveness port
pub const DEFAULT_PORT: u16 = 8080;
/// Default delay before a sent file is deleted
pub const DEFAULT_DELETE_AFTER_SECS: u64 = 30;
/// Default direct-link download timeout
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 30;
/// Default lifetime of a pending batch request (1 hour)
pub const DEFAULT_PENDING_BATCH_TTL_SECS: u64 = 3600;
/// Upper bound on stored pending batch requests
pub const PENDING_BATCH_MAX_SIZE: u64 = 10_000;

/// Category used for entries that do not name one
pub const DEFAULT_CATEGORY: &str = "default";
