//! Error types for `gatehouse-core`.

use thiserror::Error;

use crate::{account::AccountId, group::GroupUuid};

#[derive(Debug, Error)]
pub enum Error {
  /// The caller does not own the group or project it is acting on.
  #[error("not an owner")]
  NotOwner,

  /// The group exists but its membership is not managed by this system.
  #[error("group {0} is not an internal group")]
  UnsupportedGroup(GroupUuid),

  #[error("group not found: {0}")]
  GroupNotFound(GroupUuid),

  #[error("account not found: {0}")]
  AccountNotFound(AccountId),

  #[error("project not found: {0}")]
  ProjectNotFound(String),

  #[error("{0} is not a member of group {1}")]
  NotMember(String, GroupUuid),

  #[error("invalid access configuration: {0}")]
  Validation(String),

  #[error("revision {actual} does not match current revision {expected}")]
  StaleRevision { expected: String, actual: String },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Convert the error of a [`Backend`](crate::store::Backend).
  pub fn backend<E: Into<Error>>(e: E) -> Self { e.into() }

  /// Wrap a storage error that has no domain meaning.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
