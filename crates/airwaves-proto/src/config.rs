use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub player: PlayerConfig,
}

/// Station directory mirrors and query limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Interchangeable API hosts, tried in order.
    #[serde(default = "default_mirrors")]
    pub mirrors: Vec<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Countries kept after sorting by station count.
    #[serde(default = "default_country_limit")]
    pub country_limit: usize,
    /// Tags shown on the home view.
    #[serde(default = "default_tag_limit")]
    pub tag_limit: usize,
    /// Stations requested per country / tag listing.
    #[serde(default = "default_station_limit")]
    pub station_limit: usize,
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Country and tag listings.
    #[serde(default = "default_listing_ttl_secs")]
    pub listing_ttl_secs: u64,
    /// Free-text search.
    #[serde(default = "default_search_ttl_secs")]
    pub search_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_search_debounce_ms")]
    pub search_debounce_ms: u64,
    #[serde(default = "default_search_min_chars")]
    pub search_min_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON key/value file backing favorites and custom stations.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "default_volume")]
    pub volume: f32,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            mirrors: default_mirrors(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
            country_limit: default_country_limit(),
            tag_limit: default_tag_limit(),
            station_limit: default_station_limit(),
            search_limit: default_search_limit(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            listing_ttl_secs: default_listing_ttl_secs(),
            search_ttl_secs: default_search_ttl_secs(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            search_debounce_ms: default_search_debounce_ms(),
            search_min_chars: default_search_min_chars(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            volume: default_volume(),
        }
    }
}

impl DirectoryConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl CacheConfig {
    pub fn listing_ttl(&self) -> Duration {
        Duration::from_secs(self.listing_ttl_secs)
    }

    pub fn search_ttl(&self) -> Duration {
        Duration::from_secs(self.search_ttl_secs)
    }
}

impl UiConfig {
    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}

fn default_mirrors() -> Vec<String> {
    vec![
        "https://de1.api.radio-browser.info".to_string(),
        "https://nl1.api.radio-browser.info".to_string(),
        "https://at1.api.radio-browser.info".to_string(),
    ]
}

fn default_user_agent() -> String {
    format!("airwaves/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_country_limit() -> usize {
    120
}

fn default_tag_limit() -> usize {
    40
}

fn default_station_limit() -> usize {
    100
}

fn default_search_limit() -> usize {
    50
}

fn default_listing_ttl_secs() -> u64 {
    60 * 60
}

fn default_search_ttl_secs() -> u64 {
    10 * 60
}

fn default_search_debounce_ms() -> u64 {
    250
}

fn default_search_min_chars() -> usize {
    1
}

fn default_http_enabled() -> bool {
    true
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8990
}

fn default_state_file() -> PathBuf {
    platform::data_dir().join("storage.json")
}

fn default_volume() -> f32 {
    0.6
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
