//! Handlers for `/groups` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/groups/:uuid/log.audit` | Owner only; newest event first |
//! | `PUT`    | `/groups/:uuid/members/:account` | Owner only; 204 |
//! | `DELETE` | `/groups/:uuid/members/:account` | Owner only; 204 |
//! | `PUT`    | `/groups/:uuid/groups/:include` | Owner only; 204 |
//! | `DELETE` | `/groups/:uuid/groups/:include` | Owner only; 204 |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use gatehouse_core::{
  Error,
  account::AccountId,
  audit::{self, AuditEvent},
  group::GroupUuid,
  store::{AccountStore, GroupStore},
};

use crate::{error::ApiError, user::CurrentUser};

// ─── Audit log ────────────────────────────────────────────────────────────────

/// `GET /groups/:uuid/log.audit`
pub async fn audit_log<S>(
  State(store): State<Arc<S>>,
  CurrentUser(caller): CurrentUser,
  Path(uuid): Path<GroupUuid>,
) -> Result<Json<Vec<AuditEvent>>, ApiError>
where
  S: GroupStore + AccountStore,
{
  let events = audit::aggregate(store.as_ref(), &uuid, caller).await?;
  Ok(Json(events))
}

// ─── Membership ───────────────────────────────────────────────────────────────

/// Fail unless `uuid` is an internal group owned by `caller`.
async fn require_owner<S: GroupStore>(
  store: &S,
  uuid: &GroupUuid,
  caller: AccountId,
) -> Result<(), ApiError> {
  if store.get_internal_group(uuid).await.map_err(Error::backend)?.is_none() {
    let known = store.get_group_description(uuid).await.map_err(Error::backend)?;
    return Err(match known {
      Some(_) => Error::UnsupportedGroup(uuid.clone()),
      None => Error::GroupNotFound(uuid.clone()),
    }
    .into());
  }
  if !store.is_owner(uuid, caller).await.map_err(Error::backend)? {
    return Err(Error::NotOwner.into());
  }
  Ok(())
}

/// `PUT /groups/:uuid/members/:account`
pub async fn add_member<S>(
  State(store): State<Arc<S>>,
  CurrentUser(caller): CurrentUser,
  Path((uuid, member)): Path<(GroupUuid, AccountId)>,
) -> Result<StatusCode, ApiError>
where
  S: GroupStore,
{
  require_owner(store.as_ref(), &uuid, caller).await?;
  store
    .add_member(&uuid, member, caller)
    .await
    .map_err(Error::backend)?;
  Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /groups/:uuid/members/:account`
pub async fn remove_member<S>(
  State(store): State<Arc<S>>,
  CurrentUser(caller): CurrentUser,
  Path((uuid, member)): Path<(GroupUuid, AccountId)>,
) -> Result<StatusCode, ApiError>
where
  S: GroupStore,
{
  require_owner(store.as_ref(), &uuid, caller).await?;
  store
    .remove_member(&uuid, member, caller)
    .await
    .map_err(Error::backend)?;
  Ok(StatusCode::NO_CONTENT)
}

/// `PUT /groups/:uuid/groups/:include`
pub async fn add_subgroup<S>(
  State(store): State<Arc<S>>,
  CurrentUser(caller): CurrentUser,
  Path((uuid, include)): Path<(GroupUuid, GroupUuid)>,
) -> Result<StatusCode, ApiError>
where
  S: GroupStore,
{
  require_owner(store.as_ref(), &uuid, caller).await?;
  store
    .add_subgroup(&uuid, &include, caller)
    .await
    .map_err(Error::backend)?;
  Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /groups/:uuid/groups/:include`
pub async fn remove_subgroup<S>(
  State(store): State<Arc<S>>,
  CurrentUser(caller): CurrentUser,
  Path((uuid, include)): Path<(GroupUuid, GroupUuid)>,
) -> Result<StatusCode, ApiError>
where
  S: GroupStore,
{
  require_owner(store.as_ref(), &uuid, caller).await?;
  store
    .remove_subgroup(&uuid, &include, caller)
    .await
    .map_err(Error::backend)?;
  Ok(StatusCode::NO_CONTENT)
}
