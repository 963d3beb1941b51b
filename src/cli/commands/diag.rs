//! Diagnostic and debugging commands

use anyhow::Result;
use clap::Subcommand;
use futures::StreamExt;
use serde::Serialize;

use crate::cache::{DiskImageCache, ImageCache};
use crate::cli::output::{OutputFormat, format_size, print_formatted, print_success};
use crate::config::Config;
use crate::db::SqliteArticleStore;
use crate::repository::ArticleStore;

#[derive(Subcommand, Debug)]
pub enum DiagCommands {
    /// Show all data paths (config, database, image cache)
    Paths,

    /// Verify configuration, store and API key
    Check,

    /// Clear the image cache
    ClearCache,
}

#[derive(Serialize)]
struct PathsResult {
    config_file: String,
    database: String,
    image_cache: String,
}

#[derive(Serialize)]
struct CheckResult {
    config_exists: bool,
    database_accessible: bool,
    saved_articles: usize,
    api_key_configured: bool,
    image_cache_bytes: u64,
}

pub async fn run(command: DiagCommands, format: OutputFormat, quiet: bool) -> Result<()> {
    match command {
        DiagCommands::Paths => paths(format).await,
        DiagCommands::Check => check(format).await,
        DiagCommands::ClearCache => clear_cache(quiet).await,
    }
}

fn database_path(config: Option<&Config>) -> Result<std::path::PathBuf> {
    match config.and_then(|c| c.store.path.as_ref()) {
        Some(path) => Ok(path.into()),
        None => SqliteArticleStore::default_path(),
    }
}

fn display(path: Result<std::path::PathBuf>) -> String {
    path.map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| "<error>".to_string())
}

async fn paths(format: OutputFormat) -> Result<()> {
    let config = Config::load().ok();

    let result = PathsResult {
        config_file: display(Config::config_path()),
        database: display(database_path(config.as_ref())),
        image_cache: display(DiskImageCache::default_dir()),
    };

    print_formatted(&result, format, |r| {
        [
            format!("Config file:  {}", r.config_file),
            format!("Database:     {}", r.database),
            format!("Image cache:  {}", r.image_cache),
        ]
        .join("\n")
    });

    Ok(())
}

async fn check(format: OutputFormat) -> Result<()> {
    let config_exists = Config::config_path().is_ok_and(|p| p.exists());
    let config = Config::load().ok();

    let store = database_path(config.as_ref())
        .ok()
        .and_then(|path| SqliteArticleStore::open(&path).ok());
    let database_accessible = store.is_some();
    let saved_articles = match &store {
        Some(store) => match store.observe_all().next().await {
            Some(Ok(articles)) => articles.len(),
            _ => 0,
        },
        None => 0,
    };

    let api_key_configured = config
        .as_ref()
        .is_some_and(|c| c.api.resolved_api_key().is_some());

    let image_cache_bytes = DiskImageCache::default_dir()
        .ok()
        .and_then(|dir| DiskImageCache::new(dir).size_on_disk().ok())
        .unwrap_or(0);

    let result = CheckResult {
        config_exists,
        database_accessible,
        saved_articles,
        api_key_configured,
        image_cache_bytes,
    };

    print_formatted(&result, format, |r| {
        let mut lines = Vec::new();

        print_status_line(&mut lines, r.config_exists, "Config file exists");
        print_status_line(
            &mut lines,
            r.database_accessible,
            &format!("Database accessible ({} saved articles)", r.saved_articles),
        );
        print_status_line(&mut lines, r.api_key_configured, "API key configured");
        lines.push(format!("     Image cache: {}", format_size(r.image_cache_bytes)));

        lines.join("\n")
    });

    Ok(())
}

fn print_status_line(lines: &mut Vec<String>, ok: bool, message: &str) {
    if ok {
        lines.push(format!("[OK] {}", message));
    } else {
        lines.push(format!("[  ] {}", message));
    }
}

async fn clear_cache(quiet: bool) -> Result<()> {
    let cache = DiskImageCache::new(DiskImageCache::default_dir()?);
    let size = cache.size_on_disk()?;
    cache.clear()?;

    print_success(&format!("Cleared image cache ({})", format_size(size)), quiet);

    Ok(())
}
