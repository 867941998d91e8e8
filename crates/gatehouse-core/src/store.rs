//! Backend traits and the records they exchange with the core algorithms.
//!
//! The traits are implemented by storage backends (e.g.
//! `gatehouse-store-sqlite`). The aggregator, the API and the server depend on
//! these abstractions, not on any concrete backend.

use std::{
  collections::{BTreeSet, HashMap},
  future::Future,
};

use crate::{
  access::{AccessSection, ProjectAccessConfig},
  account::{AccountId, AccountInfo},
  audit::{MemberAuditRecord, SubgroupAuditRecord},
  group::{GroupDescription, GroupUuid, InternalGroup},
};

// ─── Base ────────────────────────────────────────────────────────────────────

/// Shared error type of every backend trait.
///
/// Backend errors convert into [`crate::Error`] so callers can tell domain
/// failures (not found, stale revision, ...) from storage failures.
pub trait Backend: Send + Sync {
  type Error: std::error::Error + Into<crate::Error> + Send + Sync + 'static;
}

// ─── Groups ──────────────────────────────────────────────────────────────────

/// Group cache, generic group backend, ownership gate and membership audit
/// trail.
pub trait GroupStore: Backend {
  /// Look up an internally-managed group. `None` if the group is unknown or
  /// belongs to another backend.
  fn get_internal_group<'a>(
    &'a self,
    uuid: &'a GroupUuid,
  ) -> impl Future<Output = Result<Option<InternalGroup>, Self::Error>> + Send + 'a;

  /// Look up any group, internal or external, in the generic backend.
  fn get_group_description<'a>(
    &'a self,
    uuid: &'a GroupUuid,
  ) -> impl Future<Output = Result<Option<GroupDescription>, Self::Error>> + Send + 'a;

  /// Whether `account` owns the group `uuid`.
  fn is_owner<'a>(
    &'a self,
    uuid: &'a GroupUuid,
    account: AccountId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// All member audit records of a group, in no particular order.
  fn get_members_audit<'a>(
    &'a self,
    uuid: &'a GroupUuid,
  ) -> impl Future<Output = Result<Vec<MemberAuditRecord>, Self::Error>> + Send + 'a;

  /// All subgroup audit records of a group, in no particular order.
  fn get_subgroups_audit<'a>(
    &'a self,
    uuid: &'a GroupUuid,
  ) -> impl Future<Output = Result<Vec<SubgroupAuditRecord>, Self::Error>> + Send + 'a;

  // ── Membership writes ─────────────────────────────────────────────────

  /// Add `member` to `uuid`, opening an audit record. Adding an existing
  /// member is a no-op.
  fn add_member<'a>(
    &'a self,
    uuid: &'a GroupUuid,
    member: AccountId,
    added_by: AccountId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Remove `member` from `uuid`, closing its open audit record.
  fn remove_member<'a>(
    &'a self,
    uuid: &'a GroupUuid,
    member: AccountId,
    removed_by: AccountId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Include group `include` in `uuid`.
  fn add_subgroup<'a>(
    &'a self,
    uuid: &'a GroupUuid,
    include: &'a GroupUuid,
    added_by: AccountId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn remove_subgroup<'a>(
    &'a self,
    uuid: &'a GroupUuid,
    include: &'a GroupUuid,
    removed_by: AccountId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

// ─── Accounts ────────────────────────────────────────────────────────────────

pub trait AccountStore: Backend {
  /// Resolve many accounts in one round trip. Ids that cannot be resolved
  /// are simply absent from the returned map.
  fn get_accounts<'a>(
    &'a self,
    ids: &'a [AccountId],
  ) -> impl Future<Output = Result<HashMap<AccountId, AccountInfo>, Self::Error>> + Send + 'a;
}

// ─── Project access ──────────────────────────────────────────────────────────

/// Input to [`AccessStore::apply_access`].
#[derive(Debug, Clone)]
pub struct AccessUpdate {
  /// Revision the edit was based on.
  pub revision: String,
  /// Commit message; `None` when the user left it blank.
  pub message:  Option<String>,
  pub sections: Vec<AccessSection>,
}

pub trait AccessStore: Backend {
  /// The access configuration of `project` as seen by `account`, or `None`
  /// if the project does not exist.
  fn get_access<'a>(
    &'a self,
    project: &'a str,
    account: AccountId,
  ) -> impl Future<Output = Result<Option<ProjectAccessConfig>, Self::Error>> + Send + 'a;

  /// Store `update` on behalf of `account` and return what was persisted.
  ///
  /// The persisted sections may differ from the requested ones: sections the
  /// account does not own keep their stored content, and rules naming
  /// unknown groups are dropped.
  fn apply_access<'a>(
    &'a self,
    project: &'a str,
    account: AccountId,
    update: AccessUpdate,
  ) -> impl Future<Output = Result<ProjectAccessConfig, Self::Error>> + Send + 'a;

  /// Names of the sections of `project` that `account` owns.
  fn owned_sections<'a>(
    &'a self,
    project: &'a str,
    account: AccountId,
  ) -> impl Future<Output = Result<BTreeSet<String>, Self::Error>> + Send + 'a;
}
