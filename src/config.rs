use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Postings storage configuration
    pub storage: StorageConfig,

    /// Indexing pipeline configuration
    pub pipeline: PipelineConfig,

    /// Search configuration
    pub search: SearchConfig,

    /// Messaging configuration (distributed pipeline only)
    #[serde(default)]
    pub messaging: Option<MessagingConfig>,

    /// Observability configuration
    #[serde(default)]
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
            // Override with environment variables (prefix: CSE_)
            .add_source(
                config::Environment::with_prefix("CSE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            pipeline: PipelineConfig::default(),
            search: SearchConfig::default(),
            messaging: None,
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Backend used for postings storage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// In-process storage, lost on shutdown
    #[default]
    Memory,
    /// File-backed storage under `data_dir`
    Sled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage backend selection
    #[serde(default)]
    pub backend: StorageBackend,

    /// Directory for file-backed catalogs
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Capacity of the local agent's event queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Resolution retries for a not-yet-visible address before the event
    /// is dropped
    #[serde(default = "default_visibility_retries")]
    pub max_visibility_retries: u32,

    /// Delay between resolution attempts (milliseconds)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Times a failed batch is requeued before it is dead-lettered
    #[serde(default = "default_batch_attempts")]
    pub max_batch_attempts: u32,
}

impl PipelineConfig {
    /// Delay between resolution attempts
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            max_visibility_retries: default_visibility_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            max_batch_attempts: default_batch_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Maximum ranked hits returned per search
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Maximum suggestions returned per prefix expansion
    #[serde(default = "default_suggest_limit")]
    pub suggest_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            suggest_limit: default_suggest_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// Enable the distributed pipeline
    #[serde(default)]
    pub enabled: bool,

    /// Subject prefix for event batches
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,

    /// NATS connection settings
    #[serde(default)]
    pub nats: NatsConfig,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            subject_prefix: default_subject_prefix(),
            nats: NatsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NatsConfig {
    /// NATS server URLs
    #[serde(default = "default_nats_servers")]
    pub servers: Vec<String>,

    /// Connection name reported to the broker
    #[serde(default = "default_connection_name")]
    pub connection_name: String,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            servers: default_nats_servers(),
            connection_name: default_connection_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Register Prometheus metrics
    #[serde(default)]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            prometheus_enabled: false,
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data/index")
}

fn default_queue_capacity() -> usize {
    256
}

fn default_visibility_retries() -> u32 {
    5
}

fn default_retry_delay_ms() -> u64 {
    100
}

fn default_batch_attempts() -> u32 {
    3
}

fn default_max_results() -> usize {
    50
}

fn default_suggest_limit() -> usize {
    10
}

fn default_subject_prefix() -> String {
    "cse.index".to_string()
}

fn default_nats_servers() -> Vec<String> {
    vec!["nats://127.0.0.1:4222".to_string()]
}

fn default_connection_name() -> String {
    "content-search-engine".to_string()
}
