//! HTTP client for the remote news search API.
//!
//! This module provides:
//!
//! - `NewsApiClient`: `reqwest` wrapper with timeouts and API key handling
//! - `NewsApiError`: failures split into non-success status and failed request
//!
//! Only the `v2/everything` endpoint is used. Response bodies deserialize
//! straight into [`News`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::config::ApiConfig;
use crate::model::News;
use crate::pipeline::{ErrorInfo, ErrorKind};
use crate::repository::NewsTransport;

/// User agent for API requests
const USER_AGENT: &str = concat!("newsreader/", env!("CARGO_PKG_VERSION"));

/// Search endpoint, relative to the configured base URL
const EVERYTHING_PATH: &str = "v2/everything";

/// Errors that can occur while talking to the news API
#[derive(Error, Debug)]
pub enum NewsApiError {
    #[error("response is not successful: {message}")]
    Http { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("response body is empty")]
    EmptyBody,

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("no API key configured (set api.api_key or NEWSAPI_KEY)")]
    MissingApiKey,
}

impl From<NewsApiError> for ErrorInfo {
    fn from(e: NewsApiError) -> Self {
        let kind = match &e {
            NewsApiError::Http { status, .. } => ErrorKind::Http { status: *status },
            _ => ErrorKind::Transport,
        };
        ErrorInfo::new(kind, e.to_string())
    }
}

/// "401 Unauthorized" style text for a status code
fn status_message(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

/// News API client
#[derive(Clone)]
pub struct NewsApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    page_size: u32,
}

impl NewsApiClient {
    /// Create a client from the `[api]` configuration section
    pub fn new(config: &ApiConfig) -> Result<Self, NewsApiError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.resolved_api_key(),
            page_size: config.page_size,
        })
    }

    fn everything_url(&self) -> String {
        format!("{}/{}", self.base_url, EVERYTHING_PATH)
    }
}

#[async_trait]
impl NewsTransport for NewsApiClient {
    async fn search(&self, query: &str, page: u32) -> Result<News, NewsApiError> {
        let api_key = self.api_key.as_deref().ok_or(NewsApiError::MissingApiKey)?;
        let start = Instant::now();
        let url = self.everything_url();

        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", api_key)
            .query(&[
                ("q", query.to_string()),
                ("page", page.to_string()),
                ("pageSize", self.page_size.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(
            "GET {} q={:?} page={} -> {} in {} ms",
            url,
            query,
            page,
            status,
            start.elapsed().as_millis()
        );

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!("Error body: {}", body.chars().take(200).collect::<String>());
            return Err(NewsApiError::Http {
                status: status.as_u16(),
                message: status_message(status),
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(NewsApiError::EmptyBody);
        }
        let news: News = serde_json::from_slice(&bytes)?;

        tracing::debug!(
            "Received {} articles ({} total results)",
            news.articles.len(),
            news.total_results
        );
        Ok(news)
    }
}
