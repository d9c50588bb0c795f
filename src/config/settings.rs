//! Application settings and configuration
//!
//! One immutable `Settings` value is built at startup and passed by
//! reference into each component's constructor.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Stream broker configuration
    #[serde(default)]
    pub redis: RedisSettings,
    /// Exchange feed configuration
    #[serde(default)]
    pub exchange: ExchangeSettings,
    /// Pair discovery configuration
    #[serde(default)]
    pub discovery: DiscoverySettings,
    /// Ingestion configuration
    #[serde(default)]
    pub ingest: IngestSettings,
    /// Health surface configuration
    #[serde(default)]
    pub health: HealthSettings,
}

/// Stream broker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Approximate cap on retained entries per pair stream
    #[serde(default = "default_max_stream_len")]
    pub max_stream_len: usize,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_max_stream_len() -> usize {
    10_000
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            max_stream_len: default_max_stream_len(),
        }
    }
}

/// Exchange feed settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeSettings {
    /// WebSocket base URL; connections use `{ws_url}/stream?streams=...`
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
}

fn default_ws_url() -> String {
    "wss://stream.binance.com:9443".to_string()
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
        }
    }
}

/// Pair discovery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySettings {
    /// Market-cap ranking endpoint
    #[serde(default = "default_ranking_url")]
    pub ranking_url: String,
    /// Exchange tradable-symbols endpoint
    #[serde(default = "default_exchange_info_url")]
    pub exchange_info_url: String,
    /// Quote asset required for a pair to be eligible
    #[serde(default = "default_quote_asset")]
    pub quote_asset: String,
    /// Number of ranked assets fetched per refresh
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Maximum size of the working set
    #[serde(default = "default_pair_limit")]
    pub pair_limit: usize,
    /// Refresh interval in seconds
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    /// Bound on the initial refresh at startup, in seconds
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,
    /// Pairs always included, and used alone if every source fails
    #[serde(default = "default_fallback_pairs")]
    pub fallback_pairs: Vec<String>,
}

fn default_ranking_url() -> String {
    "https://api.coingecko.com/api/v3/coins/markets".to_string()
}

fn default_exchange_info_url() -> String {
    "https://api.binance.com/api/v3/exchangeInfo".to_string()
}

fn default_quote_asset() -> String {
    "USDT".to_string()
}

fn default_top_n() -> usize {
    100
}

fn default_pair_limit() -> usize {
    100
}

fn default_refresh_interval() -> u64 {
    3600 // 1 hour
}

fn default_startup_timeout() -> u64 {
    30
}

fn default_fallback_pairs() -> Vec<String> {
    vec![
        "BTCUSDT".to_string(),
        "ETHUSDT".to_string(),
        "BNBUSDT".to_string(),
        "SOLUSDT".to_string(),
        "XRPUSDT".to_string(),
    ]
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            ranking_url: default_ranking_url(),
            exchange_info_url: default_exchange_info_url(),
            quote_asset: default_quote_asset(),
            top_n: default_top_n(),
            pair_limit: default_pair_limit(),
            refresh_interval_secs: default_refresh_interval(),
            startup_timeout_secs: default_startup_timeout(),
            fallback_pairs: default_fallback_pairs(),
        }
    }
}

impl DiscoverySettings {
    /// Refresh interval as a [`Duration`].
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Startup timeout as a [`Duration`].
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }
}

/// Ingestion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSettings {
    /// Pairs multiplexed onto a single connection
    #[serde(default = "default_pairs_per_connection")]
    pub pairs_per_connection: usize,
    /// Initial reconnection delay in seconds
    #[serde(default = "default_backoff_base")]
    pub backoff_base_secs: u64,
    /// Maximum reconnection delay in seconds
    #[serde(default = "default_backoff_max")]
    pub backoff_max_secs: u64,
    /// Maximum reconnection attempts before a connection is abandoned
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_pairs_per_connection() -> usize {
    50
}

fn default_backoff_base() -> u64 {
    1
}

fn default_backoff_max() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    10
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            pairs_per_connection: default_pairs_per_connection(),
            backoff_base_secs: default_backoff_base(),
            backoff_max_secs: default_backoff_max(),
            max_retries: default_max_retries(),
        }
    }
}

impl IngestSettings {
    /// Base backoff delay as a [`Duration`].
    pub fn backoff_base(&self) -> Duration {
        Duration::from_secs(self.backoff_base_secs)
    }

    /// Backoff delay cap as a [`Duration`].
    pub fn backoff_max(&self) -> Duration {
        Duration::from_secs(self.backoff_max_secs)
    }
}

/// Health surface settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSettings {
    /// Bind address for the health/stats/pairs surface
    #[serde(default = "default_health_bind")]
    pub bind: String,
}

fn default_health_bind() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            bind: default_health_bind(),
        }
    }
}

impl Settings {
    /// Load settings from configuration files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_prefix("INGESTOR")
    }

    /// Load settings with a custom environment variable prefix
    pub fn load_with_prefix(env_prefix: &str) -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config_dir = Self::config_dir();

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
            // Add environment-specific configuration
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            // Add local overrides (not checked into git)
            .add_source(File::with_name(&format!("{}/local", config_dir)).required(false))
            // Add environment variables (e.g., INGESTOR__REDIS__URL)
            .add_source(
                Environment::with_prefix(env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }

    /// Get the configuration directory path
    fn config_dir() -> String {
        std::env::var("INGESTOR_CONFIG_DIR").unwrap_or_else(|_| "config".into())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            redis: RedisSettings::default(),
            exchange: ExchangeSettings::default(),
            discovery: DiscoverySettings::default(),
            ingest: IngestSettings::default(),
            health: HealthSettings::default(),
        }
    }
}
