//! Saved-article repository

use std::sync::Arc;

use futures::stream::BoxStream;

use super::ArticleStore;
use crate::model::Article;
use crate::pipeline::{self, AsyncResult};

/// Store access for the saved-articles controller
#[derive(Clone)]
pub struct ArticleRepository {
    store: Arc<dyn ArticleStore>,
}

impl ArticleRepository {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self { store }
    }

    /// Live view of the store.
    ///
    /// Starts with `Loading`, then one `Success` per distinct snapshot.
    /// Consecutive identical snapshots are suppressed.
    pub fn observe(&self) -> BoxStream<'static, AsyncResult<Vec<Article>>> {
        pipeline::distinct_successes(pipeline::continuous(self.store.observe_all()))
    }

    /// Insert or replace `article`; resolves to the stored row id
    pub async fn upsert(&self, article: &Article) -> AsyncResult<i64> {
        let store = Arc::clone(&self.store);
        let article = article.clone();
        pipeline::terminal(pipeline::one_shot(async move {
            let id = store.upsert(&article).await?;
            tracing::debug!("Upserted article {} ({})", id, article.title);
            Ok::<_, crate::db::StoreError>(id)
        }))
        .await
    }

    /// Delete `article`; resolves to whether a row was actually deleted
    pub async fn remove(&self, article: &Article) -> AsyncResult<bool> {
        let store = Arc::clone(&self.store);
        let article = article.clone();
        pipeline::terminal(pipeline::one_shot(async move {
            let deleted = store.remove(&article).await?;
            tracing::debug!("Removed article {:?} ({}): {}", article.id, article.title, deleted);
            Ok::<_, crate::db::StoreError>(deleted)
        }))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteArticleStore;
    use crate::testing::{sample_article, ScriptedStore};
    use futures::StreamExt;

    #[tokio::test]
    async fn test_upsert_then_remove_round_trip() {
        let store = Arc::new(SqliteArticleStore::open_in_memory().unwrap());
        let repo = ArticleRepository::new(store.clone());
        let mut observed = repo.observe();

        assert_eq!(observed.next().await, Some(AsyncResult::Loading));
        assert_eq!(
            observed.next().await,
            Some(AsyncResult::Success { data: vec![] })
        );

        let article = sample_article("Saved story");
        assert!(repo.upsert(&article).await.is_success());

        let saved = match observed.next().await {
            Some(AsyncResult::Success { data }) => data,
            other => panic!("unexpected snapshot: {:?}", other),
        };
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].title, "Saved story");
        assert!(saved[0].is_persisted());

        assert_eq!(repo.remove(&saved[0]).await, AsyncResult::Success { data: true });
        assert_eq!(
            observed.next().await,
            Some(AsyncResult::Success { data: vec![] })
        );
    }

    #[tokio::test]
    async fn test_observe_suppresses_duplicate_snapshots() {
        let store = Arc::new(ScriptedStore::default());
        let repo = ArticleRepository::new(store.clone());
        let mut observed = repo.observe();

        let list = vec![sample_article("one")];
        store.emit(Ok(list.clone()));
        store.emit(Ok(list.clone()));
        store.emit(Ok(vec![]));

        assert_eq!(observed.next().await, Some(AsyncResult::Loading));
        assert_eq!(
            observed.next().await,
            Some(AsyncResult::Success { data: list })
        );
        assert_eq!(
            observed.next().await,
            Some(AsyncResult::Success { data: vec![] })
        );
    }

    #[tokio::test]
    async fn test_remove_unsaved_article_is_an_error() {
        let store = Arc::new(SqliteArticleStore::open_in_memory().unwrap());
        let repo = ArticleRepository::new(store);

        let result = repo.remove(&sample_article("never saved")).await;
        assert!(result.error().is_some());
    }
}
