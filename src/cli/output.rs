//! Output formatting utilities for CLI

use serde::Serialize;

use crate::model::Article;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Print a serializable value as JSON or use custom text formatter
pub fn print_formatted<T, F>(value: &T, format: OutputFormat, text_formatter: F)
where
    T: Serialize + ?Sized,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Text => println!("{}", text_formatter(value)),
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(value) {
                println!("{}", json);
            }
        }
    }
}

/// Print a success message (suppressed in quiet mode)
pub fn print_success(message: &str, quiet: bool) {
    if !quiet {
        println!("{}", message);
    }
}

/// Print an error message (never suppressed)
pub fn print_error(message: &str) {
    eprintln!("Error: {}", message);
}

/// Numbered one-line-per-article listing
pub fn format_article_list(articles: &[Article]) -> String {
    if articles.is_empty() {
        return "  (no articles)".to_string();
    }

    articles
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let id = a.id.map(|id| format!(" [#{}]", id)).unwrap_or_default();
            format!(
                "{:>3}. {}{}\n     {} | {}",
                i + 1,
                a.title,
                id,
                display_source(a),
                a.published_display()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Full view of a single article
pub fn format_article(article: &Article) -> String {
    let mut lines = vec![article.title.clone(), "=".repeat(article.title.chars().count().min(72))];
    lines.push(format!("Source:    {}", display_source(article)));
    if let Some(author) = &article.author {
        lines.push(format!("Author:    {}", author));
    }
    lines.push(format!("Published: {}", article.published_display()));
    lines.push(format!("URL:       {}", article.url));
    if let Some(description) = &article.description {
        lines.push(String::new());
        lines.push(description.clone());
    }
    if let Some(content) = &article.content {
        lines.push(String::new());
        lines.push(content.clone());
    }
    lines.join("\n")
}

fn display_source(article: &Article) -> &str {
    if article.source.name.is_empty() {
        "<unknown source>"
    } else {
        &article.source.name
    }
}

/// Format bytes as human-readable size
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
