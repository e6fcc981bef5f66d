//! # rankchat CLI
//!
//! The `rankchat` binary ingests CSV files, ranks their rows, and serves
//! the ranking plus a data-chat API backed by a local Ollama instance.
//!
//! ## Usage
//!
//! ```bash
//! rankchat --config ./config/rankchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rankchat init` | Create the SQLite database and run schema migrations |
//! | `rankchat upload <file>` | Ingest a CSV file: parse, score, rank, persist |
//! | `rankchat list` | List uploads with record counts |
//! | `rankchat show <id>` | Print the top-ranked window for an upload |
//! | `rankchat chat <id> <message>` | One chat turn against an upload's data |
//! | `rankchat delete <id> --yes` | Delete an upload and all dependent data |
//! | `rankchat serve` | Start the JSON HTTP server |

mod chat;
mod config;
mod db;
mod ingest;
mod list;
mod migrate;
mod models;
mod relay;
mod scoring;
mod server;
mod show;
mod store;

use anyhow::bail;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// rankchat — rank CSV rows and chat about them with a local LLM.
#[derive(Parser)]
#[command(
    name = "rankchat",
    about = "Rank CSV rows and chat about the data with a local LLM",
    version,
    long_about = "rankchat ingests CSV files, derives a per-row score from the numeric \
    columns, stores the rows as a ranked record set, and relays user questions plus the \
    top-ranked data to a locally running Ollama-compatible model server."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rankchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (uploads, records, chat_sessions, chat_messages). Idempotent.
    Init,

    /// Ingest a CSV file: parse, score, rank, and persist atomically.
    ///
    /// The upload and its ranked records are written in one transaction;
    /// a malformed file leaves nothing behind.
    Upload {
        /// Path to the CSV file.
        file: PathBuf,

        /// Display name for the upload (defaults to the file name).
        #[arg(long)]
        name: Option<String>,
    },

    /// List uploads, newest first.
    List,

    /// Print the top-ranked records for an upload.
    Show {
        /// Upload id.
        id: String,

        /// Override the display window size from config.
        #[arg(long)]
        limit: Option<i64>,
    },

    /// One chat turn: relay a question plus the top-ranked data to the
    /// model server and print the reply.
    Chat {
        /// Upload id.
        id: String,

        /// The question to ask about the data.
        message: String,

        /// Reuse an existing session token (a new one is generated and
        /// printed when omitted).
        #[arg(long)]
        session: Option<String>,
    },

    /// Delete an upload and all of its records, sessions, and messages.
    Delete {
        /// Upload id.
        id: String,

        /// Required confirmation; deletion is refused without it.
        #[arg(long)]
        yes: bool,
    },

    /// Start the JSON HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rankchat=info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Upload { file, name } => {
            ingest::run_upload(&cfg, &file, name).await?;
        }
        Commands::List => {
            list::run_list(&cfg).await?;
        }
        Commands::Show { id, limit } => {
            show::run_show(&cfg, &id, limit).await?;
        }
        Commands::Chat {
            id,
            message,
            session,
        } => {
            chat::run_chat(&cfg, &id, &message, session).await?;
        }
        Commands::Delete { id, yes } => {
            if !yes {
                bail!("deletion is destructive; pass --yes to confirm");
            }
            let pool = db::connect(&cfg).await?;
            if store::delete_upload(&pool, &id).await? {
                println!("Upload {} deleted.", id);
            } else {
                bail!("upload not found: {}", id);
            }
            pool.close().await;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
