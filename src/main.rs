mod config;
mod data;
mod monitoring;
mod pipeline;
mod storage;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use config::{Config, EnvConfig, StorageBackend};
use data::fetcher::TextFetcher;
use monitoring::logger::CsvLogger;
use pipeline::orchestrator::{utc_date, SnapshotOrchestrator};
use storage::memory::MemorySnapshotStore;
use storage::sqlite::SqliteSnapshotStore;
use storage::SnapshotStore;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "willow-forecasts", about = "Daily financial forecast snapshots from Polymarket and Kalshi")]
struct Cli {
    /// Path to the TOML config (defaults apply if it does not exist)
    #[arg(long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the snapshot for a date as JSON, generating it on a miss
    Get {
        /// UTC date, YYYY-MM-DD (defaults to today)
        #[arg(long, value_parser = parse_date)]
        date: Option<String>,

        /// Ignore any stored snapshot and regenerate
        #[arg(long)]
        force: bool,
    },
    /// Regenerate today's snapshot (cron entry point)
    Scheduled,
    /// Delete expired snapshots from the sqlite store
    Prune,
}

/// Commands that go through the snapshot pipeline.
#[derive(Debug, PartialEq, Eq)]
enum Job {
    Get { date: Option<String>, force: bool },
    Scheduled,
}

/// Route a command for the configured backend. `Ok(None)` means prune,
/// which only the sqlite store supports.
fn route(backend: StorageBackend, command: Command) -> Result<Option<Job>> {
    match (backend, command) {
        (StorageBackend::Sqlite, Command::Prune) => Ok(None),
        (StorageBackend::Memory, Command::Prune) => {
            anyhow::bail!("prune needs the sqlite backend (storage.backend = \"sqlite\")")
        }
        (_, Command::Get { date, force }) => Ok(Some(Job::Get { date, force })),
        (_, Command::Scheduled) => Ok(Some(Job::Scheduled)),
    }
}

fn parse_date(s: &str) -> Result<String, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|e| format!("expected YYYY-MM-DD: {}", e))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so `get` output stays clean JSON
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load_or_default(&cli.config)?;
    config.apply_env(&EnvConfig::load());
    config.validate()?;

    let Some(job) = route(config.storage.backend, cli.command)? else {
        let store = open_sqlite(&config)?;
        let removed = store.prune_expired()?;
        println!("removed {} expired snapshots, {} live", removed, store.count_live()?);
        return Ok(());
    };

    match config.storage.backend {
        StorageBackend::Sqlite => run(job, &config, open_sqlite(&config)?).await,
        StorageBackend::Memory => run(job, &config, MemorySnapshotStore::new()).await,
    }
}

fn open_sqlite(config: &Config) -> Result<SqliteSnapshotStore> {
    tracing::info!("Opening snapshot database: {}", config.storage.database_path);
    SqliteSnapshotStore::new(&config.storage.database_path)
        .with_context(|| format!("Failed to open {}", config.storage.database_path))
}

async fn run<S: SnapshotStore>(job: Job, config: &Config, store: S) -> Result<()> {
    let fetcher = TextFetcher::new(&config.sources, config.fetch.clone())
        .context("Failed to build HTTP client")?;

    let mut orchestrator = SnapshotOrchestrator::new(
        fetcher,
        store,
        config.sources.clone(),
        config.snapshot.clone(),
    );
    if config.monitoring.csv_logging {
        orchestrator = orchestrator.with_run_log(CsvLogger::new(config.monitoring.csv_log_path.clone())?);
    }

    match job {
        Job::Get { date, force } => {
            let date = date.unwrap_or_else(utc_date);
            let snapshot = orchestrator.get_snapshot(&date, force).await;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Job::Scheduled => {
            orchestrator.run_scheduled().await;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2024-03-01").unwrap(), "2024-03-01");
        assert!(parse_date("2024-3-1x").is_err());
        assert!(parse_date("2024-02-30").is_err());
    }

    #[test]
    fn test_cli_parses_get() {
        let cli = Cli::try_parse_from(["willow-forecasts", "get", "--date", "2024-03-01", "--force"]).unwrap();
        match cli.command {
            Command::Get { date, force } => {
                assert_eq!(date.as_deref(), Some("2024-03-01"));
                assert!(force);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_rejects_bad_date() {
        assert!(Cli::try_parse_from(["willow-forecasts", "get", "--date", "yesterday"]).is_err());
    }

    #[test]
    fn test_prune_on_memory_backend_is_rejected() {
        let err = route(StorageBackend::Memory, Command::Prune).unwrap_err();
        assert!(err.to_string().contains("sqlite"));
        assert!(route(StorageBackend::Sqlite, Command::Prune).unwrap().is_none());
    }

    #[test]
    fn test_route_keeps_pipeline_commands() {
        assert_eq!(route(StorageBackend::Memory, Command::Scheduled).unwrap(), Some(Job::Scheduled));

        let cli = Cli::try_parse_from(["willow-forecasts", "get", "--date", "2024-03-01"]).unwrap();
        assert_eq!(
            route(StorageBackend::Sqlite, cli.command).unwrap(),
            Some(Job::Get { date: Some("2024-03-01".to_string()), force: false })
        );
    }
}
