//! Loam CLI - mirror your notes locally and keep them in sync
//!
//! Thin consumer of the loam-core sync engine: trigger reconciliation,
//! watch the realtime stream, and run note CRUD against the backend.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::{list, login, notes, sync, watch};
use crate::error::CliError;

#[derive(Parser)]
#[command(name = "loam")]
#[command(about = "Local-first notes mirrored from a PocketBase backend")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Optional path to the local mirror database file
    #[arg(long, value_name = "PATH", global = true)]
    db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify the configured credentials
    Login,
    /// Run one full reconciliation pass
    Sync,
    /// Sync once, then follow the realtime stream until Ctrl-C
    Watch,
    /// List mirrored notes, newest first
    List {
        /// Number of notes to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a note on the backend and mirror it
    Add {
        /// Note title
        title: String,
        /// Note body
        #[arg(long)]
        content: Option<String>,
    },
    /// Edit an existing note
    Edit {
        /// Remote record id
        id: String,
        /// New title
        title: String,
        /// New body
        #[arg(long)]
        content: Option<String>,
    },
    /// Delete an existing note
    Delete {
        /// Remote record id
        id: String,
    },
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let db_path = commands::common::resolve_db_path(cli.db_path)?;

    match cli.command {
        Commands::Login => login::run_login().await,
        Commands::Sync => sync::run_sync(&db_path).await,
        Commands::Watch => watch::run_watch(&db_path).await,
        Commands::List { limit, json } => list::run_list(limit, json, &db_path).await,
        Commands::Add { title, content } => {
            notes::run_add(&title, content.as_deref(), &db_path).await
        }
        Commands::Edit { id, title, content } => {
            notes::run_edit(&id, &title, content.as_deref(), &db_path).await
        }
        Commands::Delete { id } => notes::run_delete(&id, &db_path).await,
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    if let Err(error) = run(cli).await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}
