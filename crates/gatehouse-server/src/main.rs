//! gatehouse server binary.
//!
//! Serves the group audit and project access API from a SQLite store.
//! Configuration comes from `config.toml` (override with `--config`) and
//! `GATEHOUSE_*` environment variables.
//!
//! Use `--hash-password` to produce the `password_hash` of a `[[users]]`
//! entry.

use std::{io::BufRead as _, path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use gatehouse_server::{ServerConfig, auth};
use gatehouse_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Gatehouse group audit and access server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Hash one password per stdin line and print the PHC strings.
  #[arg(long)]
  hash_password: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  if cli.hash_password {
    return print_hashes();
  }

  let cfg = ServerConfig::load(&cli.config)
    .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;
  if cfg.users.is_empty() {
    tracing::warn!("no users configured; every request will be rejected");
  }

  let store_path = cfg.resolved_store_path();
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  tracing::info!(path = ?store_path, users = cfg.users.len(), "store ready");

  let address = cfg.address();
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;
  tracing::info!("Listening on http://{address}");

  let app = gatehouse_server::router(Arc::new(store), Arc::new(cfg));
  axum::serve(listener, app).await.context("server error")
}

fn print_hashes() -> anyhow::Result<()> {
  for line in std::io::stdin().lock().lines() {
    let line = line.context("failed to read stdin")?;
    let password = line.trim_end_matches('\r');
    if password.is_empty() {
      continue;
    }
    let hash = auth::hash_password(password)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?;
    println!("{hash}");
  }
  Ok(())
}
