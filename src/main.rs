//! # Course Assistant CLI (`assist`)
//!
//! ## Usage
//!
//! ```bash
//! assist --config ./config/assist.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `assist index` | Scan, chunk, and embed the corpus |
//! | `assist search "<query>"` | Show the most similar chunks |
//! | `assist ask "<prompt>"` | Answer one question |
//! | `assist chat` | Interactive session with `/clear`, `/cost`, `/history` |
//!
//! Logs go to stderr and honor `RUST_LOG`; `--verbose` raises the default
//! level to `debug`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use course_assistant::{chat, config, index_cmd};

/// Course Assistant: answers course questions with retrieved course material.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/assist.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "assist",
    about = "Course assistant with retrieval over course material",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/assist.toml")]
    config: PathBuf,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan, chunk, and embed the corpus.
    ///
    /// The index is kept in memory, so this reports what would be
    /// available to `ask` and `chat`.
    Index {
        /// Scan and chunk only; no embedding calls.
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the chunks most similar to a query.
    Search {
        query: String,

        /// Number of results (defaults to `retrieval.k`).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Answer a single question.
    Ask {
        prompt: String,

        /// Print the answer once complete instead of streaming it.
        #[arg(long)]
        no_stream: bool,
    },

    /// Start an interactive chat session.
    Chat {
        /// Print answers once complete instead of streaming them.
        #[arg(long)]
        no_stream: bool,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Index { dry_run } => {
            index_cmd::run_index(&cfg, dry_run).await?;
        }
        Commands::Search { query, k } => {
            index_cmd::run_search(&cfg, &query, k).await?;
        }
        Commands::Ask { prompt, no_stream } => {
            chat::run_ask(&cfg, &prompt, !no_stream).await?;
        }
        Commands::Chat { no_stream } => {
            chat::run_chat(&cfg, !no_stream).await?;
        }
    }

    Ok(())
}
