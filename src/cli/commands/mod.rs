//! CLI command implementations

pub mod articles;
pub mod config;
pub mod diag;
pub mod navigation;
pub mod news;

use anyhow::Result;

use crate::app::NewsApp;
use crate::state::SnackbarOutcome;

/// Turn a pending plain notification into a command error.
///
/// Notifications that offer an action (undo) are not failures and are left
/// for the caller.
pub(crate) async fn fail_on_notification(app: &mut NewsApp) -> Result<()> {
    let message = match app.notification() {
        Some(n) if !n.has_action() => n.message.clone(),
        _ => return Ok(()),
    };
    app.resolve_notification(SnackbarOutcome::Dismissed).await;
    anyhow::bail!(message)
}
