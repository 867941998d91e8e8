//! JSON REST API for Gatehouse.
//!
//! Exposes an axum [`Router`] backed by any store implementing the
//! `gatehouse-core` backend traits. Authentication is the caller's
//! responsibility: an outer layer must insert a [`CurrentUser`] extension
//! into every request.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", gatehouse_api::api_router(store.clone()))
//! ```

pub mod access;
pub mod error;
pub mod groups;
pub mod user;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, put},
};
use gatehouse_core::store::{AccessStore, AccountStore, GroupStore};

pub use error::ApiError;
pub use user::CurrentUser;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: GroupStore + AccountStore + AccessStore + 'static,
{
  Router::new()
    // Groups
    .route("/groups/{uuid}/log.audit", get(groups::audit_log::<S>))
    .route(
      "/groups/{uuid}/members/{account}",
      put(groups::add_member::<S>).delete(groups::remove_member::<S>),
    )
    .route(
      "/groups/{uuid}/groups/{include}",
      put(groups::add_subgroup::<S>).delete(groups::remove_subgroup::<S>),
    )
    // Project access
    .route(
      "/projects/{name}/access",
      get(access::get_access::<S>).post(access::commit::<S>),
    )
    .with_state(store)
}
