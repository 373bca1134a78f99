//! Tidemark CLI - sync a local Tidemark replica with the remote store.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use thiserror::Error;
use tidemark_core::blob::{BlobTransferService, R2BlobStore, R2Config};
use tidemark_core::config::EngineConfig;
use tidemark_core::db::{CursorRepository, Database, EventRepository};
use tidemark_core::remote::RemoteApiClient;
use tidemark_core::sync::{SyncEngine, SyncGate, SyncOutcome};
use tidemark_core::OwnerId;

#[derive(Parser)]
#[command(name = "tidemark")]
#[command(about = "Sync reminders, notes, and history with the Tidemark service")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Optional path to local database file
    #[arg(long, value_name = "PATH", global = true)]
    db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full sync pass
    Sync {
        /// Owner account to sync as (defaults to TIDEMARK_OWNER_ID)
        #[arg(long, value_name = "ID")]
        owner: Option<String>,
        /// Also pull history events recorded by other devices
        #[arg(long)]
        replicate_events: bool,
    },
    /// Show sync cursors and pending work
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] tidemark_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("No owner configured. Pass --owner or set TIDEMARK_OWNER_ID.")]
    OwnerNotConfigured,
    #[error(
        "Blob storage is not configured. Set R2_ACCOUNT_ID, R2_BUCKET, \
         R2_ACCESS_KEY_ID and R2_SECRET_ACCESS_KEY to enable `tidemark sync`."
    )]
    BlobStorageNotConfigured,
    #[error("Another sync is already running")]
    SyncBusy,
    #[error("Sync finished with errors:\n{0}")]
    SyncIncomplete(String),
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tidemark=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::Sync {
            owner,
            replicate_events,
        } => run_sync(owner.as_deref(), replicate_events, &db_path).await,
        Commands::Status { json } => run_status(json, &db_path).await,
    }
}

async fn run_sync(
    owner_flag: Option<&str>,
    replicate_events: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let config = EngineConfig::from_env()?;
    let owner = resolve_owner(owner_flag, &config)?;
    tracing::info!("Syncing as {owner} against {}", config.api_base_url);

    let db = open_database(db_path).await?;
    let remote = RemoteApiClient::new(&config.api_base_url, &config.api_token)?;
    let store = R2BlobStore::new(
        R2Config::from_env()?.ok_or(CliError::BlobStorageNotConfigured)?,
    );
    let transfer = BlobTransferService::new(store, &config.cache_dir);
    let engine = SyncEngine::new(&db, &remote, &transfer);

    let gate = SyncGate::new();
    let permit = gate.try_acquire().ok_or(CliError::SyncBusy)?;

    let outcome = engine.sync_all(&owner, &permit).await;
    for line in format_outcome(&outcome) {
        println!("{line}");
    }

    if replicate_events {
        let replicated = engine.replicate_events(&owner).await?;
        println!("events replicated: {replicated}");
    }

    drop(permit);

    if outcome.is_clean() {
        Ok(())
    } else {
        Err(CliError::SyncIncomplete(outcome.errors.join("\n")))
    }
}

async fn run_status(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let cursors = CursorRepository::new(db.connection()).all().await?;
    let pending_events = EventRepository::new(db.connection())
        .pending_count()
        .await?;

    if as_json {
        let payload = serde_json::json!({
            "cursors": cursors
                .iter()
                .map(|(key, value)| (key.clone(), serde_json::Value::from(*value)))
                .collect::<serde_json::Map<String, serde_json::Value>>(),
            "pending_events": pending_events,
        });
        println!("{payload:#}");
    } else {
        if cursors.is_empty() {
            println!("no sync cursors yet");
        }
        for (key, value) in &cursors {
            println!("{key}: {value}");
        }
        println!("pending events: {pending_events}");
    }

    Ok(())
}

fn resolve_owner(owner_flag: Option<&str>, config: &EngineConfig) -> Result<OwnerId, CliError> {
    if let Some(owner) = owner_flag {
        return Ok(OwnerId::new(owner)?);
    }
    config
        .owner_id
        .clone()
        .ok_or(CliError::OwnerNotConfigured)
}

fn format_outcome(outcome: &SyncOutcome) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(stats) = outcome.reminders {
        lines.push(format!(
            "reminders: pushed {}, pulled {}",
            stats.pushed, stats.pulled
        ));
    }
    if let Some(stats) = outcome.notes {
        lines.push(format!(
            "notes: pushed {}, pulled {}",
            stats.pushed, stats.pulled
        ));
    }
    lines.push(format!("events pushed: {}", outcome.events_pushed));
    lines.push(format!(
        "attachments updated: {}",
        outcome.attachments_updated
    ));
    for error in &outcome.errors {
        lines.push(format!("failed - {error}"));
    }

    lines
}

fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("TIDEMARK_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tidemark")
        .join("tidemark.db")
}

async fn open_database(path: &Path) -> Result<Database, CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Database::open(path).await?)
}
