//! # Quarry CLI (`quarry`)
//!
//! ## Usage
//!
//! ```bash
//! quarry --config ./config/quarry.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `quarry init` | Create the SQLite database and run schema migrations |
//! | `quarry ingest <path>` | Index a file or directory |
//! | `quarry ask "<question>"` | Answer a question from the corpus |
//! | `quarry agent "<question>"` | Answer with the tool-using agent |
//! | `quarry tools` | List agent tools |
//! | `quarry stats` | Corpus and cache overview |
//! | `quarry cache stats\|clear\|delete` | Manage the answer cache |
//! | `quarry serve` | Start the HTTP API |

use clap::{Parser, Subcommand};
use quarry_core::agent::MAX_ITERATIONS;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use quarry::{commands, config, ingest, migrate, server, stats};

/// Quarry: question answering over a local document corpus.
#[derive(Parser)]
#[command(name = "quarry", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/quarry.toml")]
    config: PathBuf,

    /// Log at debug level (overridden by `RUST_LOG`).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Index a file or every supported file under a directory.
    Ingest {
        path: PathBuf,
    },

    /// Answer a question from retrieved passages.
    Ask {
        question: String,

        /// Skip the answer cache for both lookup and write.
        #[arg(long)]
        no_cache: bool,

        /// Use the vector index only.
        #[arg(long)]
        vector_only: bool,

        /// Number of passages to retrieve.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Answer with the tool-using agent.
    Agent {
        question: String,

        #[arg(long, value_parser = clap::value_parser!(u64).range(1..=MAX_ITERATIONS as u64))]
        max_iterations: Option<u64>,
    },

    /// List the tools available to the agent.
    Tools,

    /// Show document, chunk, embedding, and cache counts.
    Stats,

    /// Manage the answer cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum CacheAction {
    Stats,
    /// Remove every cached answer.
    Clear,
    /// Remove the cached answer for one question.
    Delete {
        question: String,

        /// Exact context the answer was cached under. Defaults to a fresh
        /// retrieval for the question.
        #[arg(long)]
        context: Option<String>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { path } => {
            ingest::run_ingest(&cfg, &path).await?;
        }
        Commands::Ask {
            question,
            no_cache,
            vector_only,
            top_k,
        } => {
            commands::run_ask(&cfg, &question, no_cache, vector_only, top_k).await?;
        }
        Commands::Agent {
            question,
            max_iterations,
        } => {
            commands::run_agent(&cfg, &question, max_iterations.map(|n| n as usize)).await?;
        }
        Commands::Tools => {
            commands::run_tools(&cfg).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Cache { action } => match action {
            CacheAction::Stats => commands::run_cache_stats(&cfg).await?,
            CacheAction::Clear => commands::run_cache_clear(&cfg).await?,
            CacheAction::Delete { question, context } => {
                commands::run_cache_delete(&cfg, &question, context).await?
            }
        },
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
