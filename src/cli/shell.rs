//! Interactive shell
//!
//! Keeps one [`NewsApp`] alive for the whole session and acts as its
//! presentation layer: commands become intents, state events become output,
//! and notifications are shown as a snackbar line. A snackbar that offers an
//! action stays up until the next command. Typing `undo` or the action's
//! label performs the action; any other command dismisses it first unless the
//! notification is not dismissible.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Editor, Helper};

use super::OutputOptions;
use super::commands::{self, articles, navigation, news};
use super::output::{OutputFormat, format_article, print_error, print_success};
use crate::app::NewsApp;
use crate::config::Config;
use crate::model::Article;
use crate::state::{ArticleIntent, ErrorNotification, NavKey, NewsIntent, SnackbarOutcome, StateEvent};

/// Command completer for the shell
struct ShellCompleter {
    commands: Vec<(&'static str, Vec<&'static str>)>,
}

impl ShellCompleter {
    fn new() -> Self {
        Self {
            commands: vec![
                ("search", vec![]),
                ("results", vec![]),
                ("open", vec!["--saved", "--browser"]),
                ("save", vec![]),
                ("saved", vec![]),
                ("remove", vec![]),
                ("undo", vec![]),
                ("back", vec![]),
                ("tab", vec!["news", "saved"]),
                ("stack", vec![]),
                ("config", vec!["show", "get", "set", "path"]),
                ("diag", vec!["paths", "check", "clear-cache"]),
                ("help", vec![]),
                ("exit", vec![]),
                ("quit", vec![]),
            ],
        }
    }

    fn pairs<'a>(names: impl Iterator<Item = &'a str>, prefix: &str) -> Vec<Pair> {
        names
            .filter(|name| name.starts_with(prefix))
            .map(|name| Pair {
                display: name.to_string(),
                replacement: name.to_string(),
            })
            .collect()
    }

    fn subcommands(&self, command: &str) -> Option<&[&'static str]> {
        self.commands
            .iter()
            .find(|(name, _)| *name == command)
            .map(|(_, subs)| subs.as_slice())
    }

    /// Start offset and candidates for the word ending at the cursor
    fn candidates(&self, line: &str) -> (usize, Vec<Pair>) {
        let words: Vec<&str> = line.split_whitespace().collect();
        let at_word_start = words.is_empty() || line.ends_with(char::is_whitespace);
        let start = if at_word_start {
            line.len()
        } else {
            line.rfind(char::is_whitespace).map(|i| i + 1).unwrap_or(0)
        };
        // Index of the word being completed
        let index = if at_word_start { words.len() } else { words.len() - 1 };
        let prefix = if at_word_start { "" } else { words[index] };

        let candidates = match index {
            0 => Self::pairs(self.commands.iter().map(|(name, _)| *name), prefix),
            1 => match self.subcommands(words[0]) {
                Some(subs) => Self::pairs(subs.iter().copied(), prefix),
                None => Vec::new(),
            },
            _ => Vec::new(),
        };
        (start, candidates)
    }
}

impl Completer for ShellCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        Ok(self.candidates(&line[..pos]))
    }
}

impl Hinter for ShellCompleter {
    type Hint = String;

    fn hint(&self, _line: &str, _pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        None
    }
}

impl Highlighter for ShellCompleter {}
impl Validator for ShellCompleter {}
impl Helper for ShellCompleter {}

/// Split a command line into arguments, honouring single and double quotes
fn parse_args(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, c) if c.is_whitespace() => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() {
        args.push(current);
    }

    args
}

/// One shell input line
#[derive(Parser, Debug)]
#[command(name = "newsreader", disable_help_subcommand = true)]
struct ShellLine {
    #[command(flatten)]
    output: OutputOptions,

    #[command(subcommand)]
    command: ShellCommands,
}

#[derive(Subcommand, Debug)]
enum ShellCommands {
    /// Search and show the first page of results
    Search {
        #[arg(required = true)]
        query: Vec<String>,
    },

    /// Show the last search results
    Results,

    /// Open an article by its position in the results
    Open {
        /// Position as shown in the listing, starting at 1
        index: usize,

        /// Pick from the saved list instead of the search results
        #[arg(long)]
        saved: bool,

        /// Also open the article in the system browser
        #[arg(long)]
        browser: bool,
    },

    /// Save the open article
    Save,

    /// List saved articles
    Saved,

    /// Remove a saved article by its position in the saved list
    Remove { index: usize },

    /// Restore the last removed article
    Undo,

    /// Go back one screen
    Back,

    /// Switch to the news or saved tab
    Tab { tab: String },

    /// Show the navigation stacks
    Stack,

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: commands::config::ConfigCommands,
    },

    /// Diagnostics and debugging
    Diag {
        #[command(subcommand)]
        command: commands::diag::DiagCommands,
    },
}

struct Session {
    app: NewsApp,
    /// Snackbar waiting for the user's next command
    awaiting_action: Option<ErrorNotification>,
}

impl Session {
    fn new(app: NewsApp) -> Self {
        Self {
            app,
            awaiting_action: None,
        }
    }

    fn prompt(&self) -> String {
        format!("newsreader [{}]> ", self.app.navigator.top().title())
    }

    /// Run one line. Returns Ok(false) when the user asked to exit.
    async fn run_line(&mut self, args: Vec<String>) -> Result<bool> {
        if args.is_empty() {
            return Ok(true);
        }

        match args[0].as_str() {
            "help" => {
                print_help();
                return Ok(true);
            }
            "exit" | "quit" => {
                self.dismiss_pending().await;
                return Ok(false);
            }
            _ => {}
        }

        // A pending snackbar is resolved before anything else happens
        if let Some(waiting) = &self.awaiting_action {
            let performs_action = args[0] == "undo"
                || waiting
                    .action_label
                    .as_deref()
                    .is_some_and(|label| args[0].eq_ignore_ascii_case(label));
            if performs_action {
                self.awaiting_action = None;
                let events = self
                    .app
                    .resolve_notification(SnackbarOutcome::ActionPerformed)
                    .await;
                self.show_events(&events, false);
                self.present_notification().await;
                return Ok(true);
            }
        }

        let mut argv: Vec<String> = vec!["newsreader".to_string()];
        argv.extend(args);

        let line = match ShellLine::try_parse_from(&argv) {
            Ok(line) => line,
            Err(e) => {
                println!("{}", e);
                return Ok(true);
            }
        };

        self.dismiss_pending().await;

        let result = self.execute(line.command, line.output.format(), line.output.quiet).await;
        self.present_notification().await;
        result?;
        Ok(true)
    }

    async fn execute(
        &mut self,
        command: ShellCommands,
        format: OutputFormat,
        quiet: bool,
    ) -> Result<()> {
        match command {
            ShellCommands::Search { query } => {
                self.app.navigator.switch_top_level(NavKey::NewsList);
                self.app
                    .search
                    .handle_intent(NewsIntent::SearchTextChange(query.join(" ")));
                self.app.search.handle_intent(NewsIntent::TriggerSearch);
                let events = self.app.finish_search().await;
                self.show_events(&events, quiet);
                news::print_news_state(self.app.search.news(), format, quiet);
            }
            ShellCommands::Results => {
                self.app.poll();
                if self.app.search.is_searching() && !quiet {
                    println!("Search still running...");
                }
                news::print_news_state(self.app.search.news(), format, quiet);
            }
            ShellCommands::Open {
                index,
                saved,
                browser,
            } => {
                let article = if saved {
                    self.saved_article(index).await?
                } else {
                    self.result_article(index)?
                };
                let tab = if saved {
                    NavKey::ArticlesList
                } else {
                    NavKey::NewsList
                };
                self.app.navigator.switch_top_level(tab);

                let url = article.url.clone();
                self.app.articles.handle_intent(ArticleIntent::ShowWebArticle {
                    from_search: !saved,
                    article,
                });
                if let Some(article) = &self.app.articles.web_article().article {
                    println!("{}", format_article(article));
                }
                if browser {
                    open::that(&url).with_context(|| format!("Failed to open {}", url))?;
                }
            }
            ShellCommands::Save => {
                if self.app.navigator.top() != NavKey::ArticleWeb {
                    anyhow::bail!("Open an article first");
                }
                self.app.articles.handle_intent(ArticleIntent::SaveArticle);
                let events = self.app.finish_writes().await;
                self.show_events(&events, quiet);
            }
            ShellCommands::Saved => {
                self.app.articles.wait_loaded().await;
                self.app.poll();
                articles::print_saved(self.app.articles.articles(), format);
            }
            ShellCommands::Remove { index } => {
                let article = self.saved_article(index).await?;
                self.app
                    .articles
                    .handle_intent(ArticleIntent::RemoveArticle(article));
                let events = self.app.finish_writes().await;
                self.show_events(&events, quiet);
            }
            ShellCommands::Undo => {
                if self.app.articles.recently_removed().is_none() {
                    print_success("Nothing to undo", quiet);
                    return Ok(());
                }
                self.app
                    .articles
                    .handle_intent(ArticleIntent::UndoRemoveArticle);
                let events = self.app.finish_writes().await;
                self.show_events(&events, quiet);
            }
            ShellCommands::Back => {
                if self.app.navigator.top() == NavKey::ArticleWeb {
                    self.app.articles.handle_intent(ArticleIntent::CloseWebArticle);
                } else if self.app.navigator.pop().is_none() {
                    print_success(
                        &format!("Already at {}", self.app.navigator.current_tab().title()),
                        quiet,
                    );
                }
            }
            ShellCommands::Tab { tab } => {
                let tab: NavKey = tab.parse()?;
                if !tab.is_top_level() {
                    anyhow::bail!("{} is not a tab", tab.title());
                }
                self.app.navigator.switch_top_level(tab);
                match tab {
                    NavKey::ArticlesList => {
                        self.app.articles.wait_loaded().await;
                        articles::print_saved(self.app.articles.articles(), format);
                    }
                    _ => news::print_news_state(self.app.search.news(), format, quiet),
                }
            }
            ShellCommands::Stack => navigation::print_stacks(&self.app.navigator, format),
            ShellCommands::Config { command } => {
                commands::config::run(command, format, quiet).await?
            }
            ShellCommands::Diag { command } => commands::diag::run(command, format, quiet).await?,
        }
        Ok(())
    }

    fn result_article(&self, index: usize) -> Result<Article> {
        let articles = self
            .app
            .search
            .news()
            .news
            .as_ref()
            .map(|n| n.articles.as_slice())
            .unwrap_or_default();
        pick(articles, index)
    }

    async fn saved_article(&mut self, index: usize) -> Result<Article> {
        self.app.articles.wait_loaded().await;
        let articles = self
            .app
            .articles
            .articles()
            .articles
            .as_deref()
            .unwrap_or_default();
        pick(articles, index)
    }

    fn show_events(&self, events: &[StateEvent], quiet: bool) {
        for event in events {
            if let StateEvent::StatusMessage(msg) = event {
                print_success(msg, quiet);
            }
        }
    }

    /// Show whatever the notification slot holds.
    ///
    /// Plain notifications are printed and resolved as dismissed right away.
    /// One with an action stays pending for the next command.
    async fn present_notification(&mut self) {
        self.app.poll();
        let Some(notification) = self.app.notification().cloned() else {
            return;
        };
        if self.awaiting_action.as_ref() == Some(&notification) {
            return;
        }

        match &notification.action_label {
            Some(label) if notification.has_action() => {
                println!(
                    ">> {}  [type '{}' to {}]",
                    notification.message,
                    label.to_lowercase(),
                    label.to_lowercase()
                );
                self.awaiting_action = Some(notification);
            }
            _ => {
                print_error(&notification.message);
                let events = self
                    .app
                    .resolve_notification(SnackbarOutcome::Dismissed)
                    .await;
                self.show_events(&events, false);
            }
        }
    }

    /// Dismiss the waiting notification unless it insists on its action
    async fn dismiss_pending(&mut self) {
        if self.awaiting_action.as_ref().is_some_and(|n| !n.dismissible) {
            return;
        }
        if self.awaiting_action.take().is_some() {
            self.app
                .resolve_notification(SnackbarOutcome::Dismissed)
                .await;
        }
    }
}

/// Article at 1-based `index`
fn pick(articles: &[Article], index: usize) -> Result<Article> {
    index
        .checked_sub(1)
        .and_then(|i| articles.get(i))
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("No article #{} (list has {})", index, articles.len()))
}

fn print_help() {
    println!(
        r#"newsreader interactive shell

Search tab:
  search <terms...>         Search and show the first page of results
  results                   Show the last results again
  open <n> [--browser]      Open result n (optionally in the browser)

Saved tab:
  saved                     List saved articles
  open <n> --saved          Open saved article n
  remove <n>                Remove saved article n
  undo                      Restore the last removed article

Reading:
  save                      Save the open article
  back                      Leave the article, or go back one screen

Navigation:
  tab news|saved            Switch tab (each tab keeps its own history)
  stack                     Show the navigation stacks

  config show|get|set|path  Configuration management
  diag paths|check|clear-cache

  help                      Show this help
  exit, quit                Exit the shell

Flags (can be added to any command):
  --json                    Output in JSON format
  --quiet, -q               Suppress non-essential output
"#
    );
}

/// Get the history file path
fn history_path() -> Option<std::path::PathBuf> {
    directories::ProjectDirs::from("com", "newsreader", "Newsreader")
        .map(|dirs| dirs.data_dir().join("shell_history"))
}

/// Run the interactive shell
pub async fn run() -> Result<()> {
    let config = Config::load()?;
    let mut session = Session::new(NewsApp::new(config)?);

    println!("newsreader v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'help' for available commands, 'exit' to quit.\n");

    let rl_config = rustyline::Config::builder()
        .history_ignore_space(true)
        .completion_type(rustyline::CompletionType::List)
        .build();

    let mut rl = Editor::with_config(rl_config)?;
    rl.set_helper(Some(ShellCompleter::new()));

    if let Some(path) = history_path() {
        let _ = rl.load_history(&path);
    }

    loop {
        match rl.readline(&session.prompt()) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line)?;

                match session.run_line(parse_args(line)).await {
                    Ok(true) => continue,
                    Ok(false) => break,
                    Err(e) => print_error(&e.to_string()),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("exit");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    if let Some(path) = history_path() {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = rl.save_history(&path);
    }

    Ok(())
}
