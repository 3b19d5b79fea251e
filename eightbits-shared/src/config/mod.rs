use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf};
use thiserror::Error;

/// Smallest useful history page. The `list_posts` window includes its `end`,
/// which is the oldest post already shown, so a page of one adds nothing.
pub const MIN_HISTORY_PAGE_SIZE: u32 = 2;

/// Largest history page the server is asked for in one request.
pub const MAX_HISTORY_PAGE_SIZE: u32 = 1000;

/// Errors raised while resolving a [`SyncConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported configuration format {0:?}. Use 'yaml' or 'json'.")]
    UnsupportedFormat(PathBuf),

    #[error("Invalid {var} value {value:?}: {reason}")]
    InvalidEnv {
        var: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Tunables for post synchronization.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    /// Posts asked for per history request
    pub history_page_size: u32,

    /// Pixels short of the bottom that still count as "at the bottom"
    pub bottom_tolerance_px: i32,

    /// Logging level
    pub log_level: String,

    /// Server-sent channel endpoint the browser subscribes to
    pub channel_url: String,

    /// Base URL of the RPC endpoints (`list_posts`, `post`)
    pub rpc_base_url: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl SyncConfig {
    /// Generates a default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            history_page_size: crate::models::DEFAULT_HISTORY_COUNT,
            bottom_tolerance_px: 0,
            log_level: "info".to_string(),
            channel_url: "/channel".to_string(),
            rpc_base_url: "/rpc".to_string(),
        }
    }

    /// Loads the configuration from a file, environment variables, or defaults.
    ///
    /// Environment variables only apply to values the file left at their
    /// default, and `page_size_override` beats both.
    ///
    /// # Errors
    /// Fails when the file cannot be read or parsed, when an environment
    /// variable does not parse, or when the result does not validate.
    pub fn load_config(
        config_path: Option<PathBuf>,
        page_size_override: Option<u32>,
    ) -> Result<Self, ConfigError> {
        let defaults = Self::with_defaults();
        let mut config = Self::with_defaults();

        if let Some(path) = config_path {
            let content = fs::read_to_string(&path)?;
            config = match path.extension().and_then(|ext| ext.to_str()) {
                Some("yaml" | "yml") => serde_yml::from_str(&content)?,
                Some("json") => serde_json::from_str(&content)?,
                _ => return Err(ConfigError::UnsupportedFormat(path)),
            };
        }

        if config.history_page_size == defaults.history_page_size
            && let Ok(value) = env::var("EIGHTBITS_HISTORY_PAGE_SIZE")
        {
            config.history_page_size = value.parse().map_err(|_| ConfigError::InvalidEnv {
                var: "EIGHTBITS_HISTORY_PAGE_SIZE",
                value,
                reason: "must be a positive number",
            })?;
        }
        if config.bottom_tolerance_px == defaults.bottom_tolerance_px
            && let Ok(value) = env::var("EIGHTBITS_BOTTOM_TOLERANCE_PX")
        {
            config.bottom_tolerance_px = value.parse().map_err(|_| ConfigError::InvalidEnv {
                var: "EIGHTBITS_BOTTOM_TOLERANCE_PX",
                value,
                reason: "must be a whole number of pixels",
            })?;
        }
        if config.log_level == defaults.log_level
            && let Ok(log_level) = env::var("EIGHTBITS_LOG_LEVEL")
        {
            config.log_level = log_level;
        }
        if config.channel_url == defaults.channel_url
            && let Ok(url) = env::var("EIGHTBITS_CHANNEL_URL")
        {
            config.channel_url = url;
        }
        if config.rpc_base_url == defaults.rpc_base_url
            && let Ok(url) = env::var("EIGHTBITS_RPC_BASE_URL")
        {
            config.rpc_base_url = url;
        }

        if let Some(page_size) = page_size_override {
            config.history_page_size = page_size;
        }

        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// Checks every value, collecting all problems.
    ///
    /// # Errors
    /// Returns one message per invalid value.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !(MIN_HISTORY_PAGE_SIZE..=MAX_HISTORY_PAGE_SIZE).contains(&self.history_page_size) {
            errors.push(format!(
                "Invalid history page size {}. Must be between {MIN_HISTORY_PAGE_SIZE} and {MAX_HISTORY_PAGE_SIZE}.",
                self.history_page_size
            ));
        }
        if self.bottom_tolerance_px < 0 {
            errors.push(format!(
                "Invalid bottom tolerance {}. Must not be negative.",
                self.bottom_tolerance_px
            ));
        }
        if self.log_level.trim().is_empty() {
            errors.push("Log level must not be empty.".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
