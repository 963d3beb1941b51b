//! Configuration management commands

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;

use crate::cli::output::{OutputFormat, print_formatted, print_success};
use crate::config::Config;
use crate::state::NavKey;

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Get a specific config value
    Get {
        /// Config key (e.g., "api.page_size", "navigation.start_tab")
        key: String,
    },

    /// Set a config value
    Set {
        /// Config key (e.g., "api.page_size", "navigation.start_tab")
        key: String,

        /// Value to set
        value: String,
    },

    /// Show config file path
    Path,
}

#[derive(Serialize)]
struct ConfigPathResult {
    path: String,
    exists: bool,
}

pub async fn run(command: ConfigCommands, format: OutputFormat, quiet: bool) -> Result<()> {
    match command {
        ConfigCommands::Show => show(format).await,
        ConfigCommands::Get { key } => get(&key, format).await,
        ConfigCommands::Set { key, value } => set(&key, &value, quiet).await,
        ConfigCommands::Path => path(format).await,
    }
}

async fn show(format: OutputFormat) -> Result<()> {
    let mut config = Config::load()?;
    if config.api.api_key.is_some() {
        config.api.api_key = Some("<hidden>".to_string());
    }

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            let toml = toml::to_string_pretty(&config)?;
            println!("{}", toml);
        }
    }

    Ok(())
}

async fn get(key: &str, format: OutputFormat) -> Result<()> {
    let config = Config::load()?;

    let value = get_config_value(&config, key)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(&value)?);
        }
        OutputFormat::Text => {
            println!("{}", value);
        }
    }

    Ok(())
}

fn get_config_value(config: &Config, key: &str) -> Result<String> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["api", "base_url"] => Ok(config.api.base_url.clone()),
        ["api", "api_key"] => Ok(if config.api.resolved_api_key().is_some() {
            "<set>".to_string()
        } else {
            "<not set>".to_string()
        }),
        ["api", "page_size"] => Ok(config.api.page_size.to_string()),
        ["api", "connect_timeout_secs"] => Ok(config.api.connect_timeout_secs.to_string()),
        ["api", "request_timeout_secs"] => Ok(config.api.request_timeout_secs.to_string()),
        ["store", "path"] => Ok(config
            .store
            .path
            .clone()
            .unwrap_or_else(|| "<default>".to_string())),
        ["notifications", "settle_delay_ms"] => {
            Ok(config.notifications.settle_delay_ms.to_string())
        }
        ["notifications", "default_duration"] => {
            Ok(config.notifications.default_duration.to_string())
        }
        ["navigation", "start_tab"] => Ok(config.navigation.start_tab.title().to_lowercase()),
        _ => anyhow::bail!("Unknown config key: {}", key),
    }
}

async fn set(key: &str, value: &str, quiet: bool) -> Result<()> {
    let mut config = Config::load()?;

    set_config_value(&mut config, key, value)?;
    config.save()?;

    let shown = if key == "api.api_key" { "<hidden>" } else { value };
    print_success(&format!("Set {} = {}", key, shown), quiet);
    Ok(())
}

fn set_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["api", "base_url"] => {
            config.api.base_url = value.to_string();
        }
        ["api", "api_key"] => {
            config.api.api_key = if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            };
        }
        ["api", "page_size"] => {
            config.api.page_size = value.parse()?;
        }
        ["api", "connect_timeout_secs"] => {
            config.api.connect_timeout_secs = value.parse()?;
        }
        ["api", "request_timeout_secs"] => {
            config.api.request_timeout_secs = value.parse()?;
        }
        ["store", "path"] => {
            config.store.path = if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            };
        }
        ["notifications", "settle_delay_ms"] => {
            config.notifications.settle_delay_ms = value.parse()?;
        }
        ["notifications", "default_duration"] => {
            config.notifications.default_duration = value.parse()?;
        }
        ["navigation", "start_tab"] => {
            let tab: NavKey = value.parse()?;
            if !tab.is_top_level() {
                anyhow::bail!("{} is not a tab", value);
            }
            config.navigation.start_tab = tab;
        }
        _ => anyhow::bail!("Unknown or read-only config key: {}", key),
    }

    Ok(())
}

async fn path(format: OutputFormat) -> Result<()> {
    let path = Config::config_path()?;
    let exists = path.exists();

    let result = ConfigPathResult {
        path: path.to_string_lossy().to_string(),
        exists,
    };

    print_formatted(&result, format, |r| {
        format!("{}{}", r.path, if r.exists { "" } else { " (not found)" })
    });

    Ok(())
}
