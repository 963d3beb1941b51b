//! Error and notification channel.
//!
//! Holds at most one pending [`ErrorNotification`] and broadcasts every change
//! of that slot to its subscribers. A subscriber that attaches while a
//! notification is pending receives it once on attach.
//!
//! The presentation layer shows the notification, lets the user act on it or
//! dismiss it, then calls [`ErrorChannel::resolve`], which runs the matching
//! callback, acknowledges the notification and only then performs any
//! deferred navigation.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::NotificationConfig;
use crate::pipeline::ErrorInfo;
use crate::state::{NavKey, Navigator};

/// How long a notification stays on screen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnackbarDuration {
    Short,
    #[default]
    Long,
    /// Stays until the user acts on it
    Indefinite,
}

impl fmt::Display for SnackbarDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SnackbarDuration::Short => "short",
            SnackbarDuration::Long => "long",
            SnackbarDuration::Indefinite => "indefinite",
        };
        f.write_str(name)
    }
}

impl FromStr for SnackbarDuration {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "short" => Ok(SnackbarDuration::Short),
            "long" => Ok(SnackbarDuration::Long),
            "indefinite" => Ok(SnackbarDuration::Indefinite),
            _ => anyhow::bail!("Unknown duration: {} (expected short, long or indefinite)", s),
        }
    }
}

/// Notification callback
pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// A user-visible notification.
///
/// Equality compares the visible fields, the deferred target and whether each
/// callback is present. Two notifications built from the same error are equal
/// even though their closures are distinct values.
#[derive(Clone)]
pub struct ErrorNotification {
    pub message: String,
    pub action_label: Option<String>,
    on_action: Option<Callback>,
    pub dismissible: bool,
    on_dismiss: Option<Callback>,
    pub duration: SnackbarDuration,
    pub deferred_target: Option<NavKey>,
}

impl ErrorNotification {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            action_label: None,
            on_action: None,
            dismissible: true,
            on_dismiss: None,
            duration: SnackbarDuration::default(),
            deferred_target: None,
        }
    }

    /// Plain notification carrying the error's message
    pub fn from_error(error: &ErrorInfo) -> Self {
        Self::new(error.message.clone())
    }

    pub fn with_action(
        mut self,
        label: impl Into<String>,
        action: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        self.action_label = Some(label.into());
        self.on_action = Some(Arc::new(action));
        self
    }

    pub fn on_dismiss(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_dismiss = Some(Arc::new(callback));
        self
    }

    pub fn not_dismissible(mut self) -> Self {
        self.dismissible = false;
        self
    }

    pub fn duration(mut self, duration: SnackbarDuration) -> Self {
        self.duration = duration;
        self
    }

    /// Reset `target`'s tab and switch to it once the notification is resolved
    pub fn navigate_to(mut self, target: NavKey) -> Self {
        self.deferred_target = Some(target);
        self
    }

    pub fn has_action(&self) -> bool {
        self.on_action.is_some()
    }

    fn perform_action(&self) {
        if let Some(action) = &self.on_action {
            action();
        }
    }

    fn dismiss(&self) {
        if let Some(callback) = &self.on_dismiss {
            callback();
        }
    }
}

impl PartialEq for ErrorNotification {
    fn eq(&self, other: &Self) -> bool {
        self.message == other.message
            && self.action_label == other.action_label
            && self.on_action.is_some() == other.on_action.is_some()
            && self.dismissible == other.dismissible
            && self.on_dismiss.is_some() == other.on_dismiss.is_some()
            && self.duration == other.duration
            && self.deferred_target == other.deferred_target
    }
}

impl fmt::Debug for ErrorNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorNotification")
            .field("message", &self.message)
            .field("action_label", &self.action_label)
            .field("has_action", &self.on_action.is_some())
            .field("dismissible", &self.dismissible)
            .field("has_on_dismiss", &self.on_dismiss.is_some())
            .field("duration", &self.duration)
            .field("deferred_target", &self.deferred_target)
            .finish()
    }
}

/// Contents of the pending slot
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PendingError {
    #[default]
    Empty,
    Pending(ErrorNotification),
}

/// What the user did with a presented notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnackbarOutcome {
    ActionPerformed,
    Dismissed,
}

struct ChannelState {
    pending: PendingError,
    subscribers: Vec<mpsc::UnboundedSender<PendingError>>,
}

impl ChannelState {
    fn broadcast(&mut self) {
        let value = self.pending.clone();
        self.subscribers.retain(|tx| tx.send(value.clone()).is_ok());
    }
}

/// Shared handle to the notification slot
#[derive(Clone)]
pub struct ErrorChannel {
    state: Arc<Mutex<ChannelState>>,
    settle_delay: Duration,
    default_duration: SnackbarDuration,
}

impl Default for ErrorChannel {
    fn default() -> Self {
        Self::from_config(&NotificationConfig::default())
    }
}

impl ErrorChannel {
    pub fn new(settle_delay: Duration, default_duration: SnackbarDuration) -> Self {
        Self {
            state: Arc::new(Mutex::new(ChannelState {
                pending: PendingError::Empty,
                subscribers: Vec::new(),
            })),
            settle_delay,
            default_duration,
        }
    }

    pub fn from_config(config: &NotificationConfig) -> Self {
        Self::new(config.settle_delay(), config.default_duration)
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Duration given to notifications built from errors
    pub fn default_duration(&self) -> SnackbarDuration {
        self.default_duration
    }

    /// Publish `notification`.
    ///
    /// Returns false and broadcasts nothing when an equal notification is
    /// already pending.
    pub fn raise(&self, notification: ErrorNotification) -> bool {
        let mut state = self.lock();
        if matches!(&state.pending, PendingError::Pending(current) if *current == notification) {
            tracing::debug!("Coalesced duplicate notification: {}", notification.message);
            return false;
        }

        tracing::info!("Notification raised: {}", notification.message);
        state.pending = PendingError::Pending(notification);
        state.broadcast();
        true
    }

    /// Publish a plain notification for an error surfaced by an operation
    pub fn raise_error(&self, error: &ErrorInfo) -> bool {
        tracing::info!("Operation failed: {}", error);
        self.raise(ErrorNotification::from_error(error).duration(self.default_duration))
    }

    /// Currently pending notification, if any
    pub fn pending(&self) -> Option<ErrorNotification> {
        match &self.lock().pending {
            PendingError::Pending(n) => Some(n.clone()),
            PendingError::Empty => None,
        }
    }

    /// Attach a subscriber. A pending notification is delivered immediately.
    pub fn subscribe(&self) -> ErrorSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        if let PendingError::Pending(_) = &state.pending {
            let _ = tx.send(state.pending.clone());
        }
        state.subscribers.push(tx);
        ErrorSubscription { rx }
    }

    /// Clear the pending notification after the settle delay.
    ///
    /// Does nothing when the slot is already empty. A notification raised
    /// during the delay is left in place.
    pub async fn acknowledge(&self) {
        let Some(pending) = self.pending() else {
            return;
        };
        self.acknowledge_notification(&pending).await;
    }

    /// Clear `notification` after the settle delay.
    ///
    /// Only `notification` itself is ever cleared. If the slot holds anything
    /// else, before or after the delay, it is left for its own presentation.
    pub async fn acknowledge_notification(&self, notification: &ErrorNotification) {
        if self.pending().as_ref() != Some(notification) {
            tracing::debug!("Acknowledged notification is no longer pending: {}", notification.message);
            return;
        }

        tokio::time::sleep(self.settle_delay).await;

        let mut state = self.lock();
        match &state.pending {
            PendingError::Pending(current) if current == notification => {
                tracing::debug!("Notification cleared: {}", notification.message);
                state.pending = PendingError::Empty;
                state.broadcast();
            }
            PendingError::Pending(_) => {
                tracing::debug!("Notification replaced during settle delay, keeping it");
            }
            PendingError::Empty => {}
        }
    }

    /// Finish presenting `notification`: run the callback matching `outcome`,
    /// acknowledge it, then perform the deferred navigation if one was
    /// requested. A different notification raised meanwhile stays pending.
    pub async fn resolve(
        &self,
        notification: &ErrorNotification,
        outcome: SnackbarOutcome,
        navigator: &Navigator,
    ) {
        match outcome {
            SnackbarOutcome::ActionPerformed => notification.perform_action(),
            SnackbarOutcome::Dismissed => notification.dismiss(),
        }

        self.acknowledge_notification(notification).await;

        if let Some(target) = notification.deferred_target {
            navigator.pop_to_root_and_navigate(target);
        }
    }
}

/// Receiving end of [`ErrorChannel::subscribe`]
pub struct ErrorSubscription {
    rx: mpsc::UnboundedReceiver<PendingError>,
}

impl ErrorSubscription {
    /// Next slot change, if one has already arrived
    pub fn try_next(&mut self) -> Option<PendingError> {
        self.rx.try_recv().ok()
    }

    pub async fn next(&mut self) -> Option<PendingError> {
        self.rx.recv().await
    }

    /// Every change received so far, oldest first
    pub fn drain(&mut self) -> Vec<PendingError> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn channel() -> ErrorChannel {
        ErrorChannel::new(Duration::from_millis(1), SnackbarDuration::Long)
    }

    #[test]
    fn test_duplicate_raise_broadcasts_once() {
        let errors = channel();
        let mut sub = errors.subscribe();

        assert!(errors.raise(ErrorNotification::new("X")));
        assert!(!errors.raise(ErrorNotification::new("X")));

        assert_eq!(
            sub.drain(),
            vec![PendingError::Pending(ErrorNotification::new("X"))]
        );
    }

    #[test]
    fn test_different_notification_replaces_pending() {
        let errors = channel();
        let mut sub = errors.subscribe();

        errors.raise(ErrorNotification::new("X"));
        errors.raise(ErrorNotification::new("X").duration(SnackbarDuration::Short));

        assert_eq!(sub.drain().len(), 2);
        assert_eq!(
            errors.pending().map(|n| n.duration),
            Some(SnackbarDuration::Short)
        );
    }

    #[test]
    fn test_callbacks_do_not_affect_equality() {
        let a = ErrorNotification::new("Removed").with_action("Undo", || {});
        let b = ErrorNotification::new("Removed").with_action("Undo", || {});
        assert_eq!(a, b);
        assert_ne!(a, ErrorNotification::new("Removed"));
    }

    #[test]
    fn test_late_subscriber_gets_pending_once() {
        let errors = channel();
        let mut empty = errors.subscribe();
        assert!(empty.try_next().is_none());

        errors.raise(ErrorNotification::new("late"));
        let mut late = errors.subscribe();
        assert_eq!(
            late.drain(),
            vec![PendingError::Pending(ErrorNotification::new("late"))]
        );
    }

    #[test]
    fn test_raise_error_uses_message_and_default_duration() {
        let errors = ErrorChannel::new(Duration::ZERO, SnackbarDuration::Indefinite);
        errors.raise_error(&ErrorInfo::new(crate::pipeline::ErrorKind::Transport, ""));

        let pending = errors.pending().unwrap();
        assert_eq!(pending.message, crate::pipeline::UNKNOWN_ERROR);
        assert_eq!(pending.duration, SnackbarDuration::Indefinite);
        assert!(!pending.has_action());
    }

    #[tokio::test]
    async fn test_acknowledge_is_idempotent() {
        let errors = channel();
        errors.raise(ErrorNotification::new("X"));
        let mut sub = errors.subscribe();
        sub.drain();

        errors.acknowledge().await;
        assert!(errors.pending().is_none());
        errors.acknowledge().await;
        assert!(errors.pending().is_none());

        // One clear broadcast, not two
        assert_eq!(sub.drain(), vec![PendingError::Empty]);
    }

    #[tokio::test]
    async fn test_acknowledge_keeps_notification_raised_during_delay() {
        let errors = ErrorChannel::new(Duration::from_millis(50), SnackbarDuration::Long);
        errors.raise(ErrorNotification::new("first"));

        let ack = tokio::spawn({
            let errors = errors.clone();
            async move { errors.acknowledge().await }
        });
        tokio::task::yield_now().await;
        errors.raise(ErrorNotification::new("second"));
        ack.await.unwrap();

        assert_eq!(errors.pending().map(|n| n.message), Some("second".to_string()));
    }

    #[tokio::test]
    async fn test_resolve_runs_matching_callback() {
        let errors = channel();
        let navigator = Navigator::new(NavKey::NewsList);
        let actions = Arc::new(AtomicUsize::new(0));
        let dismissals = Arc::new(AtomicUsize::new(0));

        let notification = ErrorNotification::new("Article removed")
            .with_action("Undo", {
                let actions = actions.clone();
                move || {
                    actions.fetch_add(1, Ordering::SeqCst);
                }
            })
            .on_dismiss({
                let dismissals = dismissals.clone();
                move || {
                    dismissals.fetch_add(1, Ordering::SeqCst);
                }
            });
        errors.raise(notification.clone());

        errors
            .resolve(&notification, SnackbarOutcome::ActionPerformed, &navigator)
            .await;
        assert_eq!(actions.load(Ordering::SeqCst), 1);
        assert_eq!(dismissals.load(Ordering::SeqCst), 0);
        assert!(errors.pending().is_none());

        errors.raise(notification.clone());
        errors
            .resolve(&notification, SnackbarOutcome::Dismissed, &navigator)
            .await;
        assert_eq!(actions.load(Ordering::SeqCst), 1);
        assert_eq!(dismissals.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resolve_leaves_newer_notification_pending() {
        let errors = channel();
        let navigator = Navigator::new(NavKey::NewsList);
        let shown = ErrorNotification::new("Search failed");
        errors.raise(shown.clone());
        errors.raise(ErrorNotification::new("Save failed"));
        let mut sub = errors.subscribe();
        sub.drain();

        errors
            .resolve(&shown, SnackbarOutcome::Dismissed, &navigator)
            .await;

        assert_eq!(errors.pending().map(|n| n.message), Some("Save failed".to_string()));
        assert!(sub.drain().is_empty());

        // The newer one is cleared by its own resolution
        let next = errors.pending().unwrap();
        errors
            .resolve(&next, SnackbarOutcome::Dismissed, &navigator)
            .await;
        assert!(errors.pending().is_none());
    }

    #[tokio::test]
    async fn test_deferred_navigation_happens_after_acknowledge() {
        let errors = ErrorChannel::new(Duration::from_millis(100), SnackbarDuration::Long);
        let navigator = Navigator::new(NavKey::ArticlesList);
        navigator.push(NavKey::ArticleWeb);

        let notification = ErrorNotification::new("Session expired").navigate_to(NavKey::NewsList);
        errors.raise(notification.clone());

        let resolving = tokio::spawn({
            let errors = errors.clone();
            let navigator = navigator.clone();
            async move {
                errors
                    .resolve(&notification, SnackbarOutcome::Dismissed, &navigator)
                    .await
            }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        // Still settling: slot pending, navigation untouched
        assert!(errors.pending().is_some());
        assert_eq!(navigator.current_tab(), NavKey::ArticlesList);
        assert_eq!(navigator.top(), NavKey::ArticleWeb);

        resolving.await.unwrap();
        assert!(errors.pending().is_none());
        assert_eq!(navigator.current_stack(), vec![NavKey::NewsList]);
        assert_eq!(
            navigator.snapshot().stack_for(&NavKey::ArticlesList),
            Some(&[NavKey::ArticlesList, NavKey::ArticleWeb][..])
        );
    }
}
