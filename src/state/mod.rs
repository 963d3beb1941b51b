//! Application state modules
//!
//! Feature controllers own the UI state of one screen each and are driven by
//! intents. Navigation and notifications are shared handles the controllers
//! hold by composition.

mod articles;
mod errors;
mod navigation;
mod news;

pub use articles::{ArticleIntent, ArticlesController, ArticlesUiState, WebArticleUiState};
pub use errors::{
    Callback, ErrorChannel, ErrorNotification, ErrorSubscription, PendingError, SnackbarDuration,
    SnackbarOutcome,
};
pub use navigation::{BackStacks, NavKey, Navigator};
pub use news::{NewsIntent, NewsUiState, SearchController, SearchUiState};

/// Events that intent handlers and poll methods return.
/// They tell the presentation layer what to redraw without handing it
/// mutable access to the controllers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateEvent {
    /// Show a transient status line
    StatusMessage(String),

    /// `SearchUiState` changed
    SearchTextChanged,

    /// `NewsUiState` changed
    NewsChanged,

    /// `ArticlesUiState` changed
    ArticlesChanged,

    /// `WebArticleUiState` changed
    WebArticleChanged,
}
