//! Article and search result types shared by the store, the remote API and the
//! controllers.
//!
//! The JSON shape follows the remote news API (`News { status, totalResults,
//! articles }`), so these types deserialize directly from a response body.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Publisher of an article
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
}

impl Source {
    /// Source known only by name (the store keeps the name alone)
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

/// A news article.
///
/// `id` is `None` for articles that came from a search and have not been
/// saved yet; the store assigns it on first upsert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    /// ISO-8601 timestamp as delivered by the API
    #[serde(default)]
    pub published_at: String,
    #[serde(default)]
    pub source: Source,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub url_to_image: Option<String>,
}

impl Article {
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Publication time in local time, or the raw string if it does not parse
    pub fn published_display(&self) -> String {
        match DateTime::parse_from_rfc3339(&self.published_at) {
            Ok(dt) => dt
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
                .to_string(),
            Err(_) => self.published_at.clone(),
        }
    }
}

/// One page of search results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct News {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub total_results: u32,
    #[serde(default)]
    pub articles: Vec<Article>,
}

impl News {
    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }
}
