//! CLI module for newsreader
//!
//! One-off commands run against a fresh application and exit. The interactive
//! shell keeps a single application alive between commands, so navigation,
//! search results and the undo slot carry over.

mod commands;
mod output;
mod shell;

use clap::{Parser, Subcommand};

pub use output::OutputFormat;

/// newsreader - search, save and read news articles
#[derive(Parser, Debug)]
#[command(name = "newsreader")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[command(flatten)]
    pub output: OutputOptions,

    /// Command to run; starts the interactive shell when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Output formatting options
#[derive(Parser, Debug, Clone)]
pub struct OutputOptions {
    /// Output in JSON format (for machine parsing)
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase output verbosity
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl OutputOptions {
    pub fn format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search the news API
    Search {
        /// Search terms
        #[arg(required = true)]
        query: Vec<String>,

        /// Result page to fetch
        #[arg(long, default_value_t = 1)]
        page: u32,
    },

    /// List saved articles
    Saved,

    /// Remove a saved article by id
    Remove {
        /// Article id, as shown by `saved`
        id: i64,
    },

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

    /// Start the interactive shell
    Shell,
}

/// Run the CLI with parsed arguments
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let format = cli.output.format();
    let quiet = cli.output.quiet;

    match cli.command.unwrap_or(Commands::Shell) {
        Commands::Search { query, page } => {
            commands::news::search(&query.join(" "), page, format, quiet).await
        }
        Commands::Saved => commands::articles::list(format).await,
        Commands::Remove { id } => commands::articles::remove(id, format, quiet).await,
        Commands::Config { command } => commands::config::run(command, format, quiet).await,
        Commands::Diag { command } => commands::diag::run(command, format, quiet).await,
        Commands::Shell => shell::run().await,
    }
}
