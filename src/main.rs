mod cache;
mod config;
mod fingerprint;
mod installments;
mod staleness;
mod state;
mod sync;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;

use crate::cache::HttpStore;
use crate::config::Config;
use crate::fingerprint::Fingerprint;
use crate::installments::{aggregate_metrics, recompute_installments, InstallmentFilter};
use crate::state::StateStore;
use crate::sync::Synchronizer;

#[derive(Parser, Debug)]
#[command(name = "cuotas")]
#[command(about = "Installment cache coordinator for the cuotas dashboard")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/cuotas/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Print the fingerprint of a JSON dataset
  Fingerprint { file: PathBuf },

  /// Compare the dataset against the remote cache and rebuild it if stale
  Sync { file: PathBuf },

  /// Print paid / scheduled / overdue totals for a JSON dataset
  Metrics {
    file: PathBuf,
    /// First due date to include (dd/mm/yyyy)
    #[arg(long, value_parser = parse_date)]
    from: Option<NaiveDate>,
    /// Last due date to include (dd/mm/yyyy)
    #[arg(long, value_parser = parse_date)]
    to: Option<NaiveDate>,
    /// Order identifier
    #[arg(long)]
    order: Option<String>,
    /// Store name
    #[arg(long)]
    store: Option<String>,
  },

  /// Force the remote time-based status recompute
  RefreshStatuses,
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
  NaiveDate::parse_from_str(s, "%d/%m/%Y").map_err(|e| format!("expected dd/mm/yyyy: {}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  match args.command {
    // Offline commands need no configuration
    Command::Fingerprint { file } => {
      let dataset = load_dataset(&file)?;
      println!("{}", Fingerprint::of(&dataset));
    }
    Command::Metrics {
      file,
      from,
      to,
      order,
      store,
    } => {
      let dataset = load_dataset(&file)?;
      let installments = recompute_installments(&dataset);
      let filter = InstallmentFilter {
        from,
        to,
        order,
        store,
      };
      let metrics = aggregate_metrics(filter.apply(&installments));
      println!("{}", serde_json::to_string_pretty(&metrics)?);
    }
    Command::Sync { file } => {
      let config = Config::load(args.config.as_deref())?;
      let _guard = init_tracing(&config)?;

      let dataset = load_dataset(&file)?;
      let synchronizer = synchronizer(&config)?;
      let report = synchronizer.sync(&dataset).await;
      println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Command::RefreshStatuses => {
      let config = Config::load(args.config.as_deref())?;
      let _guard = init_tracing(&config)?;

      let updated = synchronizer(&config)?.refresh_statuses().await;
      println!("{} installments updated", updated);
    }
  }

  Ok(())
}

fn synchronizer(config: &Config) -> Result<Synchronizer<HttpStore>> {
  let store = HttpStore::new(&config.api)?;
  let state = StateStore::open(config.state_path.as_deref())?;
  Ok(Synchronizer::new(store, state))
}

fn load_dataset(path: &Path) -> Result<Value> {
  let contents = std::fs::read_to_string(path)
    .map_err(|e| eyre!("Failed to read dataset {}: {}", path.display(), e))?;

  serde_json::from_str(&contents)
    .map_err(|e| eyre!("Failed to parse dataset {}: {}", path.display(), e))
}

/// Log to a file under the data directory; stdout carries command output.
fn init_tracing(config: &Config) -> Result<WorkerGuard> {
  use tracing_subscriber::{fmt, prelude::*, EnvFilter};

  let log_dir = config::data_dir()?;
  std::fs::create_dir_all(&log_dir)
    .map_err(|e| eyre!("Failed to create log directory: {}", e))?;

  let appender = tracing_appender::rolling::never(&log_dir, "cuotas.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let env_filter = EnvFilter::try_from_default_env()
    .or_else(|_| EnvFilter::try_new(&config.log_level))
    .unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::registry()
    .with(env_filter)
    .with(fmt::layer().with_writer(writer).with_ansi(false))
    .init();

  Ok(guard)
}
