//! Handlers for `/projects/:name/access`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/projects/:name/access` | As seen by the caller |
//! | `POST` | `/projects/:name/access` | Body: [`CommitBody`]; returns [`CommitResponse`] |

use std::{collections::BTreeSet, sync::Arc};

use axum::{
  Json,
  extract::{Path, State},
};
use gatehouse_core::{
  Error,
  access::{self, AccessSection, ProjectAccessConfig},
  store::{AccessStore, AccessUpdate},
};
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, user::CurrentUser};

// ─── Read ─────────────────────────────────────────────────────────────────────

/// `GET /projects/:name/access`
pub async fn get_access<S>(
  State(store): State<Arc<S>>,
  CurrentUser(caller): CurrentUser,
  Path(project): Path<String>,
) -> Result<Json<ProjectAccessConfig>, ApiError>
where
  S: AccessStore,
{
  let access = store
    .get_access(&project, caller)
    .await
    .map_err(Error::backend)?
    .ok_or_else(|| ApiError::NotFound(format!("project {project} not found")))?;
  Ok(Json(access))
}

// ─── Commit ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CommitBody {
  /// Revision the edit was based on.
  pub revision: String,
  #[serde(default)]
  pub message:  Option<String>,
  pub sections: Vec<AccessSection>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommitResponse {
  /// What was actually stored.
  pub access:             ProjectAccessConfig,
  /// Requested sections that were not stored as requested. Empty when the
  /// write was applied verbatim.
  pub unapplied_sections: BTreeSet<String>,
}

/// `POST /projects/:name/access`
pub async fn commit<S>(
  State(store): State<Arc<S>>,
  CurrentUser(caller): CurrentUser,
  Path(project): Path<String>,
  Json(body): Json<CommitBody>,
) -> Result<Json<CommitResponse>, ApiError>
where
  S: AccessStore,
{
  let message = body.message.filter(|m| !m.trim().is_empty());
  let requested = body.sections.clone();

  let persisted = store
    .apply_access(
      &project,
      caller,
      AccessUpdate { revision: body.revision, message, sections: body.sections },
    )
    .await
    .map_err(Error::backend)?;

  let unapplied_sections = access::diff_sections(&requested, &persisted.sections);
  if !unapplied_sections.is_empty() {
    tracing::debug!(
      project = %project,
      sections = ?unapplied_sections,
      "access stored with differences"
    );
  }
  Ok(Json(CommitResponse { access: persisted, unapplied_sections }))
}
