//! Record Keeper — Maintenance Entry Point
//!
//! Opens the JSON-file record store named in config.toml and runs one
//! maintenance command against it.
//!
//! Wiring sequence:
//! 1. Parse command line
//! 2. Load config.toml + validate (defaults when the file is absent)
//! 3. Init tracing (JSON or human-readable, on stderr)
//! 4. Open the JSON file store and wrap it in a RecordStore
//! 5. Run the command; data goes to stdout, logs to stderr

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use recordkeep::adapters::persistence::JsonFileKvStore;
use recordkeep::config::{AppConfig, LoggingConfig, loader};
use recordkeep::domain::snapshot::ImportMode;
use recordkeep::ports::prompt::{ImportPrompt, ImportSummary};
use recordkeep::usecases::import_flow::ImportFlow;
use recordkeep::usecases::record_store::{RecordStore, StoreOptions};

#[derive(Debug, Parser)]
#[command(name = "recordkeep", version, about = "Inspect and maintain a record store")]
struct Cli {
    /// Path to config.toml.
    #[arg(long, short, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write a snapshot of the whole store.
    Export {
        /// Output directory (defaults to `export.dir`).
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Import a snapshot file.
    Import {
        /// Snapshot file to read.
        file: PathBuf,
        /// Skip the prompt: `merge` or `replace`.
        #[arg(long)]
        mode: Option<ImportMode>,
    },
    /// Print one group as JSON.
    Show { key: String },
    /// List groups with their entry counts.
    List,
    /// Delete one group.
    Remove { key: String },
    /// Delete every group.
    Clear,
    /// Rewrite legacy-layout values in the current layout.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── 1. Load configuration ───────────────────────────────
    let config = if cli.config.exists() {
        let path = cli.config.to_string_lossy();
        loader::load_config(&path).context("Failed to load configuration")?
    } else {
        loader::parse_config("").context("Failed to build default configuration")?
    };

    // ── 2. Initialize logging ───────────────────────────────
    init_tracing(&config.logging);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        data_file = %config.store.data_file,
        "Starting record keeper"
    );

    // ── 3. Open the store ───────────────────────────────────
    let kv = JsonFileKvStore::open(&config.store.data_file)
        .await
        .with_context(|| format!("Failed to open store file {}", config.store.data_file))?;
    let store = Arc::new(RecordStore::new(
        Arc::new(kv),
        StoreOptions::from(&config.store),
    ));
    if !store.is_healthy().await {
        warn!("Store file is unreadable; commands that read it will fail");
    }

    // ── 4. Run the command ──────────────────────────────────
    run(cli.command, &config, store).await
}

async fn run(
    command: Command,
    config: &AppConfig,
    store: Arc<RecordStore<JsonFileKvStore>>,
) -> Result<()> {
    match command {
        Command::Export { dir } => {
            let dir = dir.unwrap_or_else(|| PathBuf::from(&config.export.dir));
            let path = ImportFlow::new(store, StdinPrompt::new(None))
                .export_file(&dir, &config.export.subject)
                .await
                .context("Export failed")?;
            println!("{}", path.display());
        }
        Command::Import { file, mode } => {
            let report = ImportFlow::new(store, StdinPrompt::new(mode))
                .import_file(Path::new(&file))
                .await
                .with_context(|| format!("Import of {} failed", file.display()))?;
            match report {
                Some(report) => println!(
                    "{} import: {} groups, {} entries",
                    report.mode, report.groups, report.entries
                ),
                None => println!("Import cancelled"),
            }
        }
        Command::Show { key } => {
            let group = store.get(&key).await?;
            println!("{}", serde_json::to_string_pretty(&group)?);
        }
        Command::List => {
            for (key, group) in store.list().await? {
                let title = group.meta.title.as_deref().unwrap_or("-");
                match group.lowest() {
                    Some(lowest) => println!("{key}\t{}\t{title}\tlowest {lowest}", group.len()),
                    None => println!("{key}\t{}\t{title}", group.len()),
                }
            }
        }
        Command::Remove { key } => store.remove(&key).await?,
        Command::Clear => store.clear().await?,
        Command::Migrate => {
            let migrated = store.migrate_legacy().await?;
            println!("{migrated} groups migrated");
        }
    }
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Asks on the terminal how to apply an import, unless `--mode` was given.
struct StdinPrompt {
    preset: Option<ImportMode>,
}

impl StdinPrompt {
    const fn new(preset: Option<ImportMode>) -> Self {
        Self { preset }
    }
}

#[async_trait]
impl ImportPrompt for StdinPrompt {
    async fn choose_mode(&self, summary: &ImportSummary) -> Option<ImportMode> {
        if self.preset.is_some() {
            return self.preset;
        }

        let question = format!(
            "Snapshot v{} with {} groups / {} entries.\n\
             [m]erge into existing data or [r]eplace it? (anything else cancels) ",
            summary.version, summary.groups, summary.entries
        );
        let mut stdout = tokio::io::stdout();
        if stdout.write_all(question.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
            return None;
        }

        let mut answer = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        match stdin.read_line(&mut answer).await {
            Ok(0) | Err(_) => None,
            Ok(_) => answer.parse().ok(),
        }
    }
}
