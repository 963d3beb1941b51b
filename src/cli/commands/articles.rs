//! Saved article commands

use anyhow::Result;
use serde::Serialize;

use crate::app::NewsApp;
use crate::cli::output::{OutputFormat, format_article_list, print_formatted, print_success};
use crate::config::Config;
use crate::state::{ArticleIntent, ArticlesUiState, SnackbarOutcome};

use super::fail_on_notification;

#[derive(Serialize)]
struct RemoveResult {
    id: i64,
    title: String,
}

pub async fn list(format: OutputFormat) -> Result<()> {
    let mut app = NewsApp::new(Config::load()?)?;
    app.articles.wait_loaded().await;
    fail_on_notification(&mut app).await?;

    print_saved(app.articles.articles(), format);
    Ok(())
}

pub async fn remove(id: i64, format: OutputFormat, quiet: bool) -> Result<()> {
    let mut app = NewsApp::new(Config::load()?)?;
    app.articles.wait_loaded().await;
    fail_on_notification(&mut app).await?;

    let article = app
        .articles
        .articles()
        .articles
        .iter()
        .flatten()
        .find(|a| a.id == Some(id))
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("No saved article with id {}", id))?;

    app.articles
        .handle_intent(ArticleIntent::RemoveArticle(article.clone()));
    app.finish_writes().await;
    fail_on_notification(&mut app).await?;

    // Nobody is around to press undo
    app.resolve_notification(SnackbarOutcome::Dismissed).await;

    let result = RemoveResult {
        id,
        title: article.title,
    };
    match format {
        OutputFormat::Json => print_formatted(&result, format, |_| String::new()),
        OutputFormat::Text => {
            print_success(&format!("Removed #{} \"{}\"", result.id, result.title), quiet)
        }
    }
    Ok(())
}

/// Print the saved-articles screen
pub fn print_saved(state: &ArticlesUiState, format: OutputFormat) {
    match &state.articles {
        Some(articles) => print_formatted(articles.as_slice(), format, |a| {
            format!("{} saved articles\n{}", a.len(), format_article_list(a))
        }),
        None => println!("Loading saved articles..."),
    }
}
