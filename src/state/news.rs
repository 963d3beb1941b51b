//! Search screen state

use std::sync::Arc;

use crate::cache::ImageCache;
use crate::model::News;
use crate::pipeline::AsyncResult;
use crate::repository::NewsRepository;
use crate::state::{ErrorChannel, StateEvent};
use crate::task::Subscription;

/// Contents of the search field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchUiState {
    pub search_text: String,
}

/// Search results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewsUiState {
    /// A search is in flight
    pub loading: bool,
    /// Last successful result, `None` before the first one
    pub news: Option<News>,
}

/// Intents accepted by [`SearchController`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewsIntent {
    /// Search field edited. Does not start a search.
    SearchTextChange(String),
    /// Search for the current text, first page
    TriggerSearch,
}

/// Search controller.
///
/// A new `TriggerSearch` replaces the running search. The replaced
/// subscription is dropped, which aborts its task, so a late result from it
/// can never reach `NewsUiState`.
pub struct SearchController {
    repository: NewsRepository,
    errors: ErrorChannel,
    image_cache: Arc<dyn ImageCache>,
    search: SearchUiState,
    news: NewsUiState,
    in_flight: Option<Subscription<AsyncResult<News>>>,
}

impl SearchController {
    pub fn new(
        repository: NewsRepository,
        errors: ErrorChannel,
        image_cache: Arc<dyn ImageCache>,
    ) -> Self {
        Self {
            repository,
            errors,
            image_cache,
            search: SearchUiState::default(),
            news: NewsUiState::default(),
            in_flight: None,
        }
    }

    pub fn search(&self) -> &SearchUiState {
        &self.search
    }

    pub fn news(&self) -> &NewsUiState {
        &self.news
    }

    /// Whether a search is still running
    pub fn is_searching(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn handle_intent(&mut self, intent: NewsIntent) -> Vec<StateEvent> {
        match intent {
            NewsIntent::SearchTextChange(text) => {
                if text == self.search.search_text {
                    return Vec::new();
                }
                self.search.search_text = text;
                vec![StateEvent::SearchTextChanged]
            }
            NewsIntent::TriggerSearch => self.trigger_search(),
        }
    }

    fn trigger_search(&mut self) -> Vec<StateEvent> {
        if self.in_flight.is_some() {
            tracing::debug!("Superseding running search");
        }
        tracing::info!("Search triggered: {:?}", self.search.search_text);

        let results = self.repository.search(&self.search.search_text, 1);
        // Replacing the old subscription aborts it
        self.in_flight = Some(Subscription::spawn(results));
        self.news.loading = true;
        vec![StateEvent::NewsChanged]
    }

    /// Apply every result that has arrived since the last call
    pub fn poll(&mut self) -> Vec<StateEvent> {
        let results = match self.in_flight.as_mut() {
            Some(sub) => sub.drain(),
            None => return Vec::new(),
        };

        let mut events = Vec::new();
        for result in results {
            events.extend(self.apply(result));
        }
        events
    }

    /// Wait until the running search reaches a terminal result
    pub async fn wait_for_search(&mut self) -> Vec<StateEvent> {
        let mut events = Vec::new();
        while let Some(sub) = self.in_flight.as_mut() {
            let next = sub.next().await;
            match next {
                Some(result) => events.extend(self.apply(result)),
                None => {
                    // Task ended without a terminal result
                    self.in_flight = None;
                    self.news.loading = false;
                }
            }
        }
        events
    }

    fn apply(&mut self, result: AsyncResult<News>) -> Vec<StateEvent> {
        match result {
            AsyncResult::Loading => {
                self.news.loading = true;
                Vec::new()
            }
            AsyncResult::Success { data } => {
                tracing::info!(
                    "Search finished: {} articles ({} total)",
                    data.articles.len(),
                    data.total_results
                );
                self.in_flight = None;
                self.news.loading = false;
                self.news.news = Some(data);
                vec![StateEvent::NewsChanged]
            }
            AsyncResult::Error { cause } => {
                // Previous results stay on screen
                self.in_flight = None;
                self.news.loading = false;
                self.errors.raise_error(&cause);
                vec![StateEvent::NewsChanged]
            }
        }
    }
}

impl Drop for SearchController {
    fn drop(&mut self) {
        if let Err(e) = self.image_cache.clear() {
            tracing::warn!("Failed to clear image cache: {}", e);
        }
    }
}
