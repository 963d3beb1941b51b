use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::state::{NavKey, SnackbarDuration};

/// Environment variable that overrides `api.api_key`
pub const API_KEY_ENV: &str = "NEWSAPI_KEY";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
}

/// Remote search API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the news API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// API key sent with every request
    #[serde(default)]
    pub api_key: Option<String>,
    /// Articles per result page
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Seconds allowed for establishing a connection
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Seconds allowed for a whole request, including the body
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            page_size: default_page_size(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ApiConfig {
    /// API key from the environment, falling back to the config file
    pub fn resolved_api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.api_key.clone())
    }
}

fn default_base_url() -> String {
    "https://newsapi.org".to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    15
}

/// Article store settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file, defaults to the platform data directory
    #[serde(default)]
    pub path: Option<String>,
}

/// Notification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Pause before a dismissed notification is cleared
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
    /// Duration used for error notifications
    #[serde(default)]
    pub default_duration: SnackbarDuration,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay(),
            default_duration: SnackbarDuration::default(),
        }
    }
}

impl NotificationConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

fn default_settle_delay() -> u64 {
    300
}

/// Navigation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationConfig {
    /// Tab shown at startup
    #[serde(default = "default_start_tab")]
    pub start_tab: NavKey,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            start_tab: default_start_tab(),
        }
    }
}

fn default_start_tab() -> NavKey {
    NavKey::NewsList
}

impl Config {
    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("com", "newsreader", "Newsreader")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        let config_dir = dirs.config_dir();
        std::fs::create_dir_all(config_dir)?;

        Ok(config_dir.join("config.toml"))
    }

    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a specific file, defaults if it does not exist
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            config.validate()?;
            tracing::info!("Loaded configuration from {:?}", path);
            Ok(config)
        } else {
            tracing::info!("No configuration file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        self.validate()?;
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !self.navigation.start_tab.is_top_level() {
            anyhow::bail!(
                "navigation.start_tab must be a top-level tab, got {}",
                self.navigation.start_tab
            );
        }
        if self.api.page_size == 0 {
            anyhow::bail!("api.page_size must be at least 1");
        }
        Ok(())
    }
}
