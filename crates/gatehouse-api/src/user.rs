//! The acting user of a request.

use axum::{extract::FromRequestParts, http::request::Parts};
use gatehouse_core::account::AccountId;

use crate::error::ApiError;

/// The authenticated account behind a request.
///
/// Installed as a request extension by the server's auth layer; handlers
/// extract it directly. Requests without it are rejected with 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub AccountId);

impl<S> FromRequestParts<S> for CurrentUser
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    parts
      .extensions
      .get::<CurrentUser>()
      .copied()
      .ok_or(ApiError::Unauthorized)
  }
}
