//! Search commands

use std::sync::Arc;

use anyhow::Result;

use crate::app::NewsApp;
use crate::cli::output::{OutputFormat, format_article_list, print_formatted, print_success};
use crate::config::Config;
use crate::model::News;
use crate::news_api::NewsApiClient;
use crate::pipeline::{self, AsyncResult};
use crate::repository::NewsRepository;
use crate::state::{NewsIntent, NewsUiState};

use super::fail_on_notification;

pub async fn search(query: &str, page: u32, format: OutputFormat, quiet: bool) -> Result<()> {
    let config = Config::load()?;

    if page > 1 {
        // Later pages bypass the search screen, which always starts at page 1
        let client = NewsApiClient::new(&config.api)?;
        let repository = NewsRepository::new(Arc::new(client));
        return match pipeline::terminal(repository.search(query, page)).await {
            AsyncResult::Success { data } => {
                print_news(&data, format, quiet);
                Ok(())
            }
            AsyncResult::Error { cause } => anyhow::bail!(cause),
            AsyncResult::Loading => anyhow::bail!("Search did not finish"),
        };
    }

    let mut app = NewsApp::new(config)?;
    app.search
        .handle_intent(NewsIntent::SearchTextChange(query.to_string()));
    app.search.handle_intent(NewsIntent::TriggerSearch);
    app.finish_search().await;
    fail_on_notification(&mut app).await?;

    print_news_state(app.search.news(), format, quiet);
    Ok(())
}

/// Print the search screen's current results
pub fn print_news_state(state: &NewsUiState, format: OutputFormat, quiet: bool) {
    match &state.news {
        Some(news) => print_news(news, format, quiet),
        None if state.loading => print_success("Searching...", quiet),
        None => print_success("No search yet. Try: search <terms>", quiet),
    }
}

pub fn print_news(news: &News, format: OutputFormat, quiet: bool) {
    if quiet && format == OutputFormat::Text {
        println!("{}", format_article_list(&news.articles));
        return;
    }
    print_formatted(news, format, |n| {
        format!(
            "{} of {} results\n{}",
            n.articles.len(),
            n.total_results,
            format_article_list(&n.articles)
        )
    });
}
