use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cache::{DiskImageCache, ImageCache};
use crate::config::Config;
use crate::db::SqliteArticleStore;
use crate::news_api::NewsApiClient;
use crate::repository::{ArticleRepository, ArticleStore, NewsRepository, NewsTransport};
use crate::state::{
    ArticlesController, ErrorChannel, ErrorNotification, ErrorSubscription, Navigator,
    PendingError, SearchController, SnackbarOutcome, StateEvent,
};

/// Main application state
pub struct NewsApp {
    /// Shared navigation stacks
    pub navigator: Navigator,
    /// Shared notification slot
    pub errors: ErrorChannel,
    /// Search screen
    pub search: SearchController,
    /// Saved articles and web view
    pub articles: ArticlesController,
    /// Presenter's subscription to the notification slot
    notifications: ErrorSubscription,
    /// Notification currently on screen
    shown: Option<ErrorNotification>,
}

impl NewsApp {
    /// Build the application from configuration, opening the store and the
    /// API client
    pub fn new(config: Config) -> Result<Self> {
        let db_path = match &config.store.path {
            Some(path) => PathBuf::from(path),
            None => SqliteArticleStore::default_path()?,
        };
        let store = SqliteArticleStore::open(&db_path)
            .with_context(|| format!("Failed to open article store at {:?}", db_path))?;
        let client = NewsApiClient::new(&config.api)?;
        let image_cache = DiskImageCache::new(DiskImageCache::default_dir()?);

        Ok(Self::with_collaborators(
            config,
            Arc::new(client),
            Arc::new(store),
            Arc::new(image_cache),
        ))
    }

    /// Build the application around the given collaborators
    pub fn with_collaborators(
        config: Config,
        transport: Arc<dyn NewsTransport>,
        store: Arc<dyn ArticleStore>,
        image_cache: Arc<dyn ImageCache>,
    ) -> Self {
        let navigator = Navigator::new(config.navigation.start_tab);
        let errors = ErrorChannel::from_config(&config.notifications);
        let notifications = errors.subscribe();

        let search = SearchController::new(
            NewsRepository::new(transport),
            errors.clone(),
            image_cache,
        );
        let articles = ArticlesController::new(
            ArticleRepository::new(store),
            navigator.clone(),
            errors.clone(),
        );

        tracing::info!("Application ready, start tab {}", config.navigation.start_tab);

        Self {
            navigator,
            errors,
            search,
            articles,
            notifications,
            shown: None,
        }
    }

    /// Poll both controllers and the notification subscription
    pub fn poll(&mut self) -> Vec<StateEvent> {
        let mut events = self.search.poll();
        events.extend(self.articles.poll());
        self.poll_notifications();
        events
    }

    /// Wait for the running search, then poll
    pub async fn finish_search(&mut self) -> Vec<StateEvent> {
        let mut events = self.search.wait_for_search().await;
        events.extend(self.poll());
        events
    }

    /// Wait for pending store writes, then poll
    pub async fn finish_writes(&mut self) -> Vec<StateEvent> {
        let mut events = self.articles.settle().await;
        events.extend(self.poll());
        events
    }

    fn poll_notifications(&mut self) {
        for change in self.notifications.drain() {
            self.shown = match change {
                PendingError::Pending(notification) => Some(notification),
                PendingError::Empty => None,
            };
        }
    }

    /// Notification the presenter should show, if any
    pub fn notification(&mut self) -> Option<&ErrorNotification> {
        self.poll_notifications();
        self.shown.as_ref()
    }

    /// Finish the shown notification with `outcome`.
    ///
    /// Runs the callback, acknowledges, performs deferred navigation, then
    /// applies anything the callback queued. Only the notification last
    /// returned by [`NewsApp::notification`] is resolved; one raised since
    /// then becomes the next notification to show.
    pub async fn resolve_notification(&mut self, outcome: SnackbarOutcome) -> Vec<StateEvent> {
        let Some(notification) = self.shown.take() else {
            return Vec::new();
        };

        tracing::debug!("Resolving notification {:?} with {:?}", notification.message, outcome);
        self.errors
            .resolve(&notification, outcome, &self.navigator)
            .await;

        if outcome == SnackbarOutcome::ActionPerformed {
            self.finish_writes().await
        } else {
            self.poll()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::SqliteArticleStore;
    use crate::model::News;
    use crate::state::{ArticleIntent, NavKey, NewsIntent};
    use crate::testing::{CountingImageCache, ScriptedTransport, sample_article};

    fn app(transport: Arc<ScriptedTransport>) -> NewsApp {
        let mut config = Config::default();
        config.notifications.settle_delay_ms = 0;
        NewsApp::with_collaborators(
            config,
            transport,
            Arc::new(SqliteArticleStore::open_in_memory().unwrap()),
            Arc::new(CountingImageCache::default()),
        )
    }

    #[tokio::test]
    async fn test_search_save_remove_undo() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.respond(
            "rust",
            Ok(News {
                status: "ok".to_string(),
                total_results: 1,
                articles: vec![sample_article("Ferris")],
            }),
        );
        let mut app = app(transport);
        app.articles.wait_loaded().await;

        app.search
            .handle_intent(NewsIntent::SearchTextChange("rust".to_string()));
        app.search.handle_intent(NewsIntent::TriggerSearch);
        app.finish_search().await;
        let found = app.search.news().news.clone().unwrap().articles.remove(0);

        app.articles.handle_intent(ArticleIntent::ShowWebArticle {
            from_search: true,
            article: found,
        });
        assert_eq!(app.navigator.top(), NavKey::ArticleWeb);
        app.articles.handle_intent(ArticleIntent::SaveArticle);
        let events = app.finish_writes().await;
        assert!(events.contains(&StateEvent::StatusMessage("Article saved".to_string())));

        let saved = app.articles.articles().articles.clone().unwrap();
        app.articles
            .handle_intent(ArticleIntent::RemoveArticle(saved[0].clone()));
        app.finish_writes().await;
        assert!(app.notification().is_some_and(|n| n.has_action()));

        app.resolve_notification(SnackbarOutcome::ActionPerformed)
            .await;
        assert!(app.notification().is_none());
        assert_eq!(app.articles.articles().articles, Some(saved));
    }

    #[tokio::test]
    async fn test_dismissed_error_clears_notification() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.respond("down", Err(crate::news_api::NewsApiError::EmptyBody));
        let mut app = app(transport);

        app.search
            .handle_intent(NewsIntent::SearchTextChange("down".to_string()));
        app.search.handle_intent(NewsIntent::TriggerSearch);
        app.finish_search().await;

        let message = app.notification().map(|n| n.message.clone());
        assert_eq!(message.as_deref(), Some("response body is empty"));

        app.resolve_notification(SnackbarOutcome::Dismissed).await;
        assert!(app.notification().is_none());
        assert!(app.errors.pending().is_none());
    }

    #[tokio::test]
    async fn test_resolve_keeps_notification_raised_while_shown() {
        let mut app = app(Arc::new(ScriptedTransport::default()));
        app.errors.raise(ErrorNotification::new("Search failed"));
        assert_eq!(
            app.notification().map(|n| n.message.clone()).as_deref(),
            Some("Search failed")
        );

        app.errors.raise(ErrorNotification::new("Save failed"));
        app.resolve_notification(SnackbarOutcome::Dismissed).await;

        assert_eq!(
            app.notification().map(|n| n.message.clone()).as_deref(),
            Some("Save failed")
        );
        app.resolve_notification(SnackbarOutcome::Dismissed).await;
        assert!(app.notification().is_none());
        assert!(app.errors.pending().is_none());
    }
}
