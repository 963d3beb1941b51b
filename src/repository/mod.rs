//! Repositories: the controllers' only view of the outside world.
//!
//! Each repository wraps a collaborator (the remote search transport or the
//! article store) and exposes its results as [`AsyncResult`] streams. The
//! collaborators are traits so the controllers can be exercised against fakes.
//!
//! [`AsyncResult`]: crate::pipeline::AsyncResult

mod articles;
mod news;

pub use articles::ArticleRepository;
pub use news::NewsRepository;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::db::StoreError;
use crate::model::{Article, News};
use crate::news_api::NewsApiError;

/// Remote search endpoint.
///
/// Implementations must distinguish a non-success HTTP status from a failed
/// request and must give up within a bounded time.
#[async_trait]
pub trait NewsTransport: Send + Sync {
    async fn search(&self, query: &str, page: u32) -> Result<News, NewsApiError>;
}

/// Persistent article list.
///
/// A successful `upsert` or `remove` must be visible in the next snapshot that
/// `observe_all` yields.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Current contents, then a new snapshot after every change
    fn observe_all(&self) -> BoxStream<'static, Result<Vec<Article>, StoreError>>;

    /// Insert, or replace the row with the same id. Returns the row id.
    async fn upsert(&self, article: &Article) -> Result<i64, StoreError>;

    /// Delete the row with the article's id. Returns false when no such row
    /// existed, in which case nothing was published.
    async fn remove(&self, article: &Article) -> Result<bool, StoreError>;
}
