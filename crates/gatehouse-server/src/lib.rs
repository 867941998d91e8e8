//! HTTP server wiring for Gatehouse.
//!
//! Mounts the JSON API from `gatehouse-api` under `/api`, behind Basic auth
//! and request tracing.

pub mod auth;
pub mod error;

pub use error::Error;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use axum::{Router, middleware};
use config::{ConfigBuilder, ConfigError, Environment, File, builder::DefaultState};
use gatehouse_core::store::{AccessStore, AccountStore, GroupStore};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  #[serde(default)]
  pub users:      Vec<UserConfig>,
}

/// A login accepted by the server and the account it acts as.
#[derive(Deserialize, Clone)]
pub struct UserConfig {
  pub username:      String,
  pub account_id:    u32,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

impl ServerConfig {
  /// Read `path` (optional on disk) layered with `GATEHOUSE_*` environment
  /// variables.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    Self::from_builder(
      config::Config::builder().add_source(File::from(path).required(false)),
    )
  }

  fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
    builder
      .add_source(Environment::with_prefix("GATEHOUSE"))
      .build()?
      .try_deserialize()
  }

  /// `store_path` with a leading `~/` expanded to the home directory.
  pub fn resolved_store_path(&self) -> PathBuf {
    let raw = self.store_path.to_string_lossy();
    match (raw.strip_prefix("~/"), std::env::var_os("HOME")) {
      (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
      _ => self.store_path.clone(),
    }
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the server's axum [`Router`].
pub fn router<S>(store: Arc<S>, config: Arc<ServerConfig>) -> Router
where
  S: GroupStore + AccountStore + AccessStore + 'static,
{
  Router::new()
    .nest("/api", gatehouse_api::api_router(store))
    .layer(middleware::from_fn_with_state(config, auth::require_auth))
    .layer(TraceLayer::new_for_http())
}
