use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::clustering::ClusteringConfig;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// State backend configuration
    pub state: StateConfig,

    /// Pipeline processing configuration
    pub processing: ProcessingConfig,

    /// Clustering thresholds and windows
    #[serde(default)]
    pub clustering: ClusteringConfig,

    /// Retention configuration
    pub retention: RetentionConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: STORYCLUSTER_)
            .add_source(
                config::Environment::with_prefix("STORYCLUSTER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// State backend type
    #[serde(default)]
    pub backend: StateBackend,

    /// Path for the embedded database (sled)
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StateBackend {
    #[default]
    Memory,
    Sled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Number of pipeline worker tasks
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Capacity of the item ingest queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Max retries for transient store failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff between retries (milliseconds, doubled per attempt)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Max match-or-create rounds before giving up on a create race
    #[serde(default = "default_match_attempts")]
    pub match_attempts: u32,

    /// Keywords that establish beat relevance for the relevance gate and
    /// for last-name-only entity matches
    #[serde(default)]
    pub focus_keywords: Vec<String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            match_attempts: default_match_attempts(),
            focus_keywords: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Clusters stale for longer than this are purged (days)
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    /// Cron schedule for the retention sweep (seconds-resolution cron)
    #[serde(default = "default_retention_schedule")]
    pub schedule: String,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            schedule: default_retention_schedule(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            prometheus_enabled: default_true(),
        }
    }
}

// Default value functions

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    200
}

fn default_match_attempts() -> u32 {
    3
}

fn default_retention_days() -> i64 {
    30
}

fn default_retention_schedule() -> String {
    // Daily at 03:00
    "0 0 3 * * *".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
