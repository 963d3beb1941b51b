//! Saved-articles and web-article state

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::model::Article;
use crate::pipeline::AsyncResult;
use crate::repository::ArticleRepository;
use crate::state::{ErrorChannel, ErrorNotification, NavKey, Navigator, StateEvent};
use crate::task::Subscription;

/// How long `settle` waits for the store to publish its writes
const SNAPSHOT_WAIT: Duration = Duration::from_millis(250);

/// Live view of the saved articles
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticlesUiState {
    pub loading: bool,
    /// `None` until the store has delivered its first snapshot
    pub articles: Option<Vec<Article>>,
}

/// Article shown in the web view
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebArticleUiState {
    /// Opened from the search results rather than the saved list
    pub is_from_search: bool,
    pub article: Option<Article>,
}

impl WebArticleUiState {
    /// Tab that back navigation returns to
    pub fn back_target(&self) -> NavKey {
        if self.is_from_search {
            NavKey::NewsList
        } else {
            NavKey::ArticlesList
        }
    }
}

/// Intents accepted by [`ArticlesController`]
#[derive(Debug, Clone, PartialEq)]
pub enum ArticleIntent {
    ShowWebArticle { from_search: bool, article: Article },
    /// Save the article currently shown in the web view
    SaveArticle,
    RemoveArticle(Article),
    /// Restore the most recently removed article
    UndoRemoveArticle,
    /// Leave the web view
    CloseWebArticle,
}

/// Result of a store write, delivered back to the controller
enum OpOutcome {
    Saved(AsyncResult<i64>),
    Removed {
        article: Article,
        result: AsyncResult<bool>,
    },
    Restored {
        article: Article,
        result: AsyncResult<i64>,
    },
}

/// A finished write that the store observation has not shown yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unpublished {
    Stored(i64),
    Deleted(i64),
}

impl Unpublished {
    fn visible_in(self, articles: &[Article]) -> bool {
        match self {
            Unpublished::Stored(id) => articles.iter().any(|a| a.id == Some(id)),
            Unpublished::Deleted(id) => articles.iter().all(|a| a.id != Some(id)),
        }
    }
}

/// Saved-articles controller.
///
/// Subscribes to the store on construction and keeps `ArticlesUiState` in step
/// with it. Writes never touch `ArticlesUiState` directly; the store
/// observation reconciles it. Dropping the controller cancels the observation
/// and every write still in flight.
pub struct ArticlesController {
    repository: ArticleRepository,
    navigator: Navigator,
    errors: ErrorChannel,
    articles: ArticlesUiState,
    web_article: WebArticleUiState,
    /// Single undo slot, overwritten by every removal
    recently_removed: Option<Article>,
    observer: Subscription<AsyncResult<Vec<Article>>>,
    ops_tx: mpsc::UnboundedSender<OpOutcome>,
    ops_rx: mpsc::UnboundedReceiver<OpOutcome>,
    ops: Vec<JoinHandle<()>>,
    pending_ops: usize,
    intent_tx: mpsc::UnboundedSender<ArticleIntent>,
    intent_rx: mpsc::UnboundedReceiver<ArticleIntent>,
    unpublished: Vec<Unpublished>,
}

impl ArticlesController {
    pub fn new(repository: ArticleRepository, navigator: Navigator, errors: ErrorChannel) -> Self {
        let observer = Subscription::spawn(repository.observe());
        let (ops_tx, ops_rx) = mpsc::unbounded_channel();
        let (intent_tx, intent_rx) = mpsc::unbounded_channel();

        Self {
            repository,
            navigator,
            errors,
            articles: ArticlesUiState::default(),
            web_article: WebArticleUiState::default(),
            recently_removed: None,
            observer,
            ops_tx,
            ops_rx,
            ops: Vec::new(),
            pending_ops: 0,
            intent_tx,
            intent_rx,
            unpublished: Vec::new(),
        }
    }

    pub fn articles(&self) -> &ArticlesUiState {
        &self.articles
    }

    pub fn web_article(&self) -> &WebArticleUiState {
        &self.web_article
    }

    /// Article that `UndoRemoveArticle` would restore
    pub fn recently_removed(&self) -> Option<&Article> {
        self.recently_removed.as_ref()
    }

    pub fn handle_intent(&mut self, intent: ArticleIntent) -> Vec<StateEvent> {
        tracing::debug!("Article intent: {:?}", intent);
        match intent {
            ArticleIntent::ShowWebArticle {
                from_search,
                article,
            } => {
                self.web_article = WebArticleUiState {
                    is_from_search: from_search,
                    article: Some(article),
                };
                self.navigator.push(NavKey::ArticleWeb);
                vec![StateEvent::WebArticleChanged]
            }
            ArticleIntent::SaveArticle => {
                let Some(article) = self.web_article.article.clone() else {
                    tracing::debug!("SaveArticle with no article shown");
                    return Vec::new();
                };
                let repository = self.repository.clone();
                self.spawn_op(async move { OpOutcome::Saved(repository.upsert(&article).await) });
                Vec::new()
            }
            ArticleIntent::RemoveArticle(article) => {
                let repository = self.repository.clone();
                self.spawn_op(async move {
                    let result = repository.remove(&article).await;
                    OpOutcome::Removed { article, result }
                });
                Vec::new()
            }
            ArticleIntent::UndoRemoveArticle => {
                let Some(article) = self.recently_removed.clone() else {
                    tracing::debug!("Nothing to undo");
                    return Vec::new();
                };
                let repository = self.repository.clone();
                self.spawn_op(async move {
                    let result = repository.upsert(&article).await;
                    OpOutcome::Restored { article, result }
                });
                Vec::new()
            }
            ArticleIntent::CloseWebArticle => {
                let target = self.web_article.back_target();
                self.navigator.pop();
                if self.navigator.current_tab() != target {
                    self.navigator.switch_top_level(target);
                }
                self.web_article.article = None;
                vec![StateEvent::WebArticleChanged]
            }
        }
    }

    fn spawn_op<F>(&mut self, op: F)
    where
        F: Future<Output = OpOutcome> + Send + 'static,
    {
        self.ops.retain(|handle| !handle.is_finished());
        self.pending_ops += 1;

        let tx = self.ops_tx.clone();
        self.ops.push(tokio::spawn(async move {
            let _ = tx.send(op.await);
        }));
    }

    /// Apply queued intents, finished writes and new store snapshots
    pub fn poll(&mut self) -> Vec<StateEvent> {
        let mut events = Vec::new();

        while let Ok(intent) = self.intent_rx.try_recv() {
            events.extend(self.handle_intent(intent));
        }
        while let Ok(outcome) = self.ops_rx.try_recv() {
            events.extend(self.apply_outcome(outcome));
        }
        for snapshot in self.observer.drain() {
            events.extend(self.apply_snapshot(snapshot));
        }

        events
    }

    /// Wait for the next store snapshot and apply it.
    /// Returns `None` once the observation has ended.
    pub async fn next_update(&mut self) -> Option<Vec<StateEvent>> {
        let snapshot = self.observer.next().await?;
        Some(self.apply_snapshot(snapshot))
    }

    /// Wait until the first snapshot has arrived or the observation ended
    pub async fn wait_loaded(&mut self) -> Vec<StateEvent> {
        let mut events = self.poll();
        while self.articles.articles.is_none() {
            let Some(update) = self.next_update().await else {
                break;
            };
            events.extend(update);
            if self.articles.articles.is_none() && !self.articles.loading {
                // Observation failed before delivering anything
                break;
            }
        }
        events
    }

    /// Wait for every write in flight, including writes queued by
    /// notification callbacks, then for store snapshots showing all of them.
    ///
    /// Snapshots read before a write finished are applied on the way but do
    /// not end the wait. Gives up on the store after `SNAPSHOT_WAIT`.
    pub async fn settle(&mut self) -> Vec<StateEvent> {
        let mut events = self.poll();

        while self.pending_ops > 0 {
            match self.ops_rx.recv().await {
                Some(outcome) => events.extend(self.apply_outcome(outcome)),
                None => break,
            }
            while let Ok(intent) = self.intent_rx.try_recv() {
                events.extend(self.handle_intent(intent));
            }
        }

        let deadline = tokio::time::Instant::now() + SNAPSHOT_WAIT;
        while !self.unpublished.is_empty() {
            match tokio::time::timeout_at(deadline, self.next_update()).await {
                Ok(Some(update)) => events.extend(update),
                Ok(None) => {
                    tracing::debug!("Store observation ended before publishing writes");
                    self.unpublished.clear();
                }
                Err(_) => {
                    tracing::debug!("Store has not published {:?}", self.unpublished);
                    self.unpublished.clear();
                }
            }
        }
        events.extend(self.poll());
        events
    }

    /// Remember `change` until a snapshot shows it
    fn expect_published(&mut self, change: Unpublished) {
        let shown = self
            .articles
            .articles
            .as_deref()
            .is_some_and(|articles| change.visible_in(articles));
        if !shown {
            self.unpublished.push(change);
        }
    }

    fn apply_outcome(&mut self, outcome: OpOutcome) -> Vec<StateEvent> {
        self.pending_ops = self.pending_ops.saturating_sub(1);

        match outcome {
            OpOutcome::Saved(result) => match result {
                AsyncResult::Success { data: id } => {
                    self.expect_published(Unpublished::Stored(id));
                    vec![StateEvent::StatusMessage("Article saved".to_string())]
                }
                AsyncResult::Error { cause } => {
                    self.errors.raise_error(&cause);
                    Vec::new()
                }
                AsyncResult::Loading => Vec::new(),
            },
            OpOutcome::Removed { article, result } => match result {
                AsyncResult::Success { data: true } => {
                    if let Some(id) = article.id {
                        self.expect_published(Unpublished::Deleted(id));
                    }
                    tracing::info!("Removed article: {}", article.title);
                    self.offer_undo(&article);
                    self.recently_removed = Some(article);
                    Vec::new()
                }
                AsyncResult::Success { data: false } => {
                    // Nothing was deleted, so there is nothing to undo
                    tracing::info!("Article already removed: {}", article.title);
                    vec![StateEvent::StatusMessage(
                        "Article was already removed".to_string(),
                    )]
                }
                AsyncResult::Error { cause } => {
                    self.errors.raise_error(&cause);
                    Vec::new()
                }
                AsyncResult::Loading => Vec::new(),
            },
            OpOutcome::Restored { article, result } => match result {
                AsyncResult::Error { cause } => {
                    // Slot kept so the undo can be retried
                    self.errors.raise_error(&cause);
                    Vec::new()
                }
                AsyncResult::Loading => Vec::new(),
                AsyncResult::Success { data: id } => {
                    self.expect_published(Unpublished::Stored(id));
                    tracing::info!("Restored article: {}", article.title);
                    if self.recently_removed.as_ref() == Some(&article) {
                        self.recently_removed = None;
                    }
                    vec![StateEvent::StatusMessage("Article restored".to_string())]
                }
            },
        }
    }

    fn offer_undo(&self, article: &Article) {
        let intents = self.intent_tx.clone();
        let notification = ErrorNotification::new(format!("Removed \"{}\"", article.title))
            .with_action("Undo", move || {
                let _ = intents.send(ArticleIntent::UndoRemoveArticle);
            })
            .duration(self.errors.default_duration());
        self.errors.raise(notification);
    }

    fn apply_snapshot(&mut self, snapshot: AsyncResult<Vec<Article>>) -> Vec<StateEvent> {
        match snapshot {
            AsyncResult::Loading => {
                if self.articles.loading {
                    return Vec::new();
                }
                self.articles.loading = true;
                vec![StateEvent::ArticlesChanged]
            }
            AsyncResult::Success { data } => {
                self.unpublished.retain(|change| !change.visible_in(&data));
                if !self.articles.loading && self.articles.articles.as_ref() == Some(&data) {
                    return Vec::new();
                }
                tracing::debug!("Saved articles: {}", data.len());
                self.articles.loading = false;
                self.articles.articles = Some(data);
                vec![StateEvent::ArticlesChanged]
            }
            AsyncResult::Error { cause } => {
                // The observation has ended, nothing more will be published
                self.unpublished.clear();
                self.articles.loading = false;
                self.errors.raise_error(&cause);
                vec![StateEvent::ArticlesChanged]
            }
        }
    }
}

impl Drop for ArticlesController {
    fn drop(&mut self) {
        for handle in &self.ops {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteArticleStore;
    use crate::state::SnackbarOutcome;
    use crate::testing::{ScriptedStore, sample_article};
    use std::sync::Arc;

    fn errors() -> ErrorChannel {
        ErrorChannel::new(Duration::ZERO, Default::default())
    }

    fn sqlite_controller() -> (ArticlesController, Navigator, ErrorChannel) {
        let store = Arc::new(SqliteArticleStore::open_in_memory().unwrap());
        let navigator = Navigator::new(NavKey::NewsList);
        let errors = errors();
        let controller =
            ArticlesController::new(ArticleRepository::new(store), navigator.clone(), errors.clone());
        (controller, navigator, errors)
    }

    fn titles(controller: &ArticlesController) -> Vec<String> {
        controller
            .articles()
            .articles
            .iter()
            .flatten()
            .map(|a| a.title.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_identical_snapshots_update_state_once() {
        let store = Arc::new(ScriptedStore::default());
        let mut controller = ArticlesController::new(
            ArticleRepository::new(store.clone()),
            Navigator::new(NavKey::ArticlesList),
            errors(),
        );

        let first = vec![sample_article("one")];
        let second = vec![sample_article("one"), sample_article("two")];
        store.emit(Ok(first.clone()));
        store.emit(Ok(first.clone()));
        store.emit(Ok(second.clone()));

        // Loading, then one update per distinct snapshot
        assert_eq!(controller.next_update().await, Some(vec![StateEvent::ArticlesChanged]));
        assert!(controller.articles().loading);
        assert_eq!(controller.next_update().await, Some(vec![StateEvent::ArticlesChanged]));
        assert_eq!(controller.articles().articles, Some(first));
        assert_eq!(controller.next_update().await, Some(vec![StateEvent::ArticlesChanged]));
        assert_eq!(controller.articles().articles, Some(second));

        tokio::task::yield_now().await;
        assert!(controller.poll().is_empty());
    }

    #[tokio::test]
    async fn test_show_web_article_pushes_web_screen() {
        let (mut controller, navigator, _) = sqlite_controller();
        let article = sample_article("Story");

        let events = controller.handle_intent(ArticleIntent::ShowWebArticle {
            from_search: true,
            article: article.clone(),
        });
        assert_eq!(events, vec![StateEvent::WebArticleChanged]);
        assert_eq!(controller.web_article().article.as_ref(), Some(&article));
        assert_eq!(navigator.current_stack(), vec![NavKey::NewsList, NavKey::ArticleWeb]);

        controller.handle_intent(ArticleIntent::CloseWebArticle);
        assert_eq!(navigator.current_stack(), vec![NavKey::NewsList]);
        assert!(controller.web_article().article.is_none());
    }

    #[tokio::test]
    async fn test_close_returns_to_opening_tab() {
        let (mut controller, navigator, _) = sqlite_controller();
        navigator.switch_top_level(NavKey::ArticlesList);
        controller.handle_intent(ArticleIntent::ShowWebArticle {
            from_search: false,
            article: sample_article("Saved one"),
        });
        assert_eq!(controller.web_article().back_target(), NavKey::ArticlesList);

        controller.handle_intent(ArticleIntent::CloseWebArticle);
        assert_eq!(navigator.current_tab(), NavKey::ArticlesList);
        assert_eq!(navigator.current_stack(), vec![NavKey::ArticlesList]);
    }

    #[tokio::test]
    async fn test_save_shown_article() {
        let (mut controller, _, _) = sqlite_controller();
        controller.wait_loaded().await;
        assert_eq!(controller.articles().articles, Some(vec![]));

        // Nothing shown yet, nothing saved
        controller.handle_intent(ArticleIntent::SaveArticle);
        assert!(controller.settle().await.is_empty());

        controller.handle_intent(ArticleIntent::ShowWebArticle {
            from_search: true,
            article: sample_article("Keep me"),
        });
        controller.handle_intent(ArticleIntent::SaveArticle);
        let events = controller.settle().await;

        assert!(events.contains(&StateEvent::StatusMessage("Article saved".to_string())));
        assert_eq!(titles(&controller), vec!["Keep me"]);
        assert!(controller.articles().articles.as_ref().unwrap()[0].is_persisted());
    }

    #[tokio::test]
    async fn test_save_before_first_snapshot_is_shown() {
        let (mut controller, _, _) = sqlite_controller();

        controller.handle_intent(ArticleIntent::ShowWebArticle {
            from_search: true,
            article: sample_article("Early bird"),
        });
        controller.handle_intent(ArticleIntent::SaveArticle);
        controller.settle().await;

        assert!(!controller.articles().loading);
        assert_eq!(titles(&controller), vec!["Early bird"]);
    }

    #[tokio::test]
    async fn test_settle_skips_snapshot_read_before_write() {
        let store = Arc::new(ScriptedStore::default());
        let mut controller = ArticlesController::new(
            ArticleRepository::new(store.clone()),
            Navigator::new(NavKey::NewsList),
            errors(),
        );

        // Read taken before the write lands
        store.emit(Ok(vec![]));
        controller.handle_intent(ArticleIntent::ShowWebArticle {
            from_search: true,
            article: sample_article("Fresh"),
        });
        controller.handle_intent(ArticleIntent::SaveArticle);

        let publisher = tokio::spawn({
            let store = store.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                let mut saved = sample_article("Fresh");
                saved.id = Some(1);
                store.emit(Ok(vec![saved]));
            }
        });
        controller.settle().await;
        publisher.await.unwrap();

        assert_eq!(titles(&controller), vec!["Fresh"]);
        assert_eq!(controller.articles().articles.as_ref().unwrap()[0].id, Some(1));
    }

    #[tokio::test]
    async fn test_removing_missing_row_offers_no_undo() {
        let (mut controller, _, errors) = sqlite_controller();
        controller.wait_loaded().await;

        controller.handle_intent(ArticleIntent::ShowWebArticle {
            from_search: true,
            article: sample_article("Twice"),
        });
        controller.handle_intent(ArticleIntent::SaveArticle);
        controller.settle().await;
        let saved = controller.articles().articles.clone().unwrap().remove(0);

        controller.handle_intent(ArticleIntent::RemoveArticle(saved.clone()));
        controller.settle().await;
        errors.acknowledge().await;
        assert!(errors.pending().is_none());

        // Stale copy of a row that is already gone
        controller.handle_intent(ArticleIntent::RemoveArticle(saved.clone()));
        let events = controller.settle().await;

        assert!(events.contains(&StateEvent::StatusMessage(
            "Article was already removed".to_string()
        )));
        assert!(errors.pending().is_none());
        assert_eq!(controller.recently_removed(), Some(&saved));
    }

    #[tokio::test]
    async fn test_drop_cancels_observation_and_writes() {
        let store = Arc::new(ScriptedStore::default());
        store.delay_writes(Duration::from_millis(50));
        let errors = errors();
        let mut controller = ArticlesController::new(
            ArticleRepository::new(store.clone()),
            Navigator::new(NavKey::NewsList),
            errors.clone(),
        );

        controller.handle_intent(ArticleIntent::ShowWebArticle {
            from_search: true,
            article: sample_article("Never stored"),
        });
        controller.handle_intent(ArticleIntent::SaveArticle);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(store.observed());

        drop(controller);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(store.upserts().is_empty());
        assert!(!store.observed());
        assert!(errors.pending().is_none());
    }

    #[tokio::test]
    async fn test_undo_flow() {
        let (mut controller, navigator, errors) = sqlite_controller();
        controller.wait_loaded().await;

        controller.handle_intent(ArticleIntent::ShowWebArticle {
            from_search: true,
            article: sample_article("Undo me"),
        });
        controller.handle_intent(ArticleIntent::SaveArticle);
        controller.settle().await;
        let saved = controller.articles().articles.clone().unwrap().remove(0);

        controller.handle_intent(ArticleIntent::RemoveArticle(saved.clone()));
        controller.settle().await;
        assert!(titles(&controller).is_empty());
        assert_eq!(controller.recently_removed(), Some(&saved));

        let offer = errors.pending().unwrap();
        assert_eq!(offer.action_label.as_deref(), Some("Undo"));

        // The presenter performs the action; the callback queues the undo
        errors
            .resolve(&offer, SnackbarOutcome::ActionPerformed, &navigator)
            .await;
        assert!(errors.pending().is_none());
        let events = controller.settle().await;

        assert!(events.contains(&StateEvent::StatusMessage("Article restored".to_string())));
        assert_eq!(titles(&controller), vec!["Undo me"]);
        assert_eq!(controller.articles().articles.as_ref().unwrap()[0].id, saved.id);
        assert!(controller.recently_removed().is_none());
    }

    #[tokio::test]
    async fn test_second_removal_overwrites_undo_slot() {
        let (mut controller, _, _) = sqlite_controller();
        controller.wait_loaded().await;

        for title in ["first", "second"] {
            controller.handle_intent(ArticleIntent::ShowWebArticle {
                from_search: true,
                article: sample_article(title),
            });
            controller.handle_intent(ArticleIntent::SaveArticle);
            controller.settle().await;
        }
        let saved = controller.articles().articles.clone().unwrap();

        for article in &saved {
            controller.handle_intent(ArticleIntent::RemoveArticle(article.clone()));
            controller.settle().await;
        }
        assert_eq!(controller.recently_removed(), saved.last());

        controller.handle_intent(ArticleIntent::UndoRemoveArticle);
        controller.settle().await;
        assert_eq!(titles(&controller), vec![saved.last().unwrap().title.clone()]);

        // Slot is empty now, a second undo does nothing
        controller.handle_intent(ArticleIntent::UndoRemoveArticle);
        assert!(controller.settle().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_undo_keeps_slot() {
        let store = Arc::new(ScriptedStore::default());
        let errors = errors();
        let mut controller = ArticlesController::new(
            ArticleRepository::new(store.clone()),
            Navigator::new(NavKey::ArticlesList),
            errors.clone(),
        );

        let mut article = sample_article("Fragile");
        article.id = Some(7);
        controller.handle_intent(ArticleIntent::RemoveArticle(article.clone()));
        controller.settle().await;
        assert_eq!(controller.recently_removed(), Some(&article));
        assert_eq!(store.removes(), vec![article.clone()]);

        store.fail_writes(true);
        controller.handle_intent(ArticleIntent::UndoRemoveArticle);
        controller.settle().await;

        assert_eq!(controller.recently_removed(), Some(&article));
        assert!(errors.pending().unwrap().message.contains("disk full"));
        assert_eq!(store.upserts().len(), 0);
    }

    #[tokio::test]
    async fn test_remove_unsaved_article_raises_error() {
        let (mut controller, _, errors) = sqlite_controller();
        controller.wait_loaded().await;

        controller.handle_intent(ArticleIntent::RemoveArticle(sample_article("ghost")));
        controller.settle().await;

        assert!(controller.recently_removed().is_none());
        let pending = errors.pending().unwrap();
        assert!(!pending.has_action());
        assert_eq!(pending.message, "Article has not been saved yet");
    }
}
