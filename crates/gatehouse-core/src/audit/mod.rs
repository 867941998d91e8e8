//! Group audit log: raw membership audit records and the aggregation that
//! turns them into one newest-first event list.

mod loader;

pub use loader::{IdentityLoader, Slot};

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  account::{AccountId, AccountInfo},
  group::{GroupInfo, GroupUuid},
  store::{AccountStore, GroupStore},
};

// ─── Raw records ─────────────────────────────────────────────────────────────

/// Who closed an audit record, and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Removal {
  pub removed_by: AccountId,
  pub removed_on: DateTime<Utc>,
}

/// An account's membership in a group, from the day it was added until it
/// was removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberAuditRecord {
  pub group_uuid: GroupUuid,
  pub account_id: AccountId,
  pub added_by:   AccountId,
  pub added_on:   DateTime<Utc>,
  pub removal:    Option<Removal>,
}

impl MemberAuditRecord {
  pub fn is_active(&self) -> bool { self.removal.is_none() }
}

/// Identity of a subgroup audit record. The inclusion time is part of the key
/// since the same group may be included, removed and included again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubgroupAuditKey {
  pub group_uuid:   GroupUuid,
  pub include_uuid: GroupUuid,
  pub added_on:     DateTime<Utc>,
}

/// A group's inclusion in another group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubgroupAuditRecord {
  pub key:      SubgroupAuditKey,
  pub added_by: AccountId,
  pub removal:  Option<Removal>,
}

impl SubgroupAuditRecord {
  pub fn is_active(&self) -> bool { self.removal.is_none() }
}

// ─── Events ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventKind {
  AddUser,
  RemoveUser,
  AddGroup,
  RemoveGroup,
}

/// Whom an event is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuditSubject {
  Account(AccountInfo),
  Group(GroupInfo),
}

/// One entry of a group's audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
  #[serde(rename = "type")]
  pub kind:    AuditEventKind,
  pub actor:   AccountInfo,
  pub subject: AuditSubject,
  pub date:    DateTime<Utc>,
}

/// An event whose accounts have been registered but not yet resolved.
enum PendingSubject {
  Account(Slot),
  Group(GroupInfo),
}

struct PendingEvent {
  kind:    AuditEventKind,
  actor:   Slot,
  subject: PendingSubject,
  date:    DateTime<Utc>,
}

// ─── Aggregation ─────────────────────────────────────────────────────────────

/// Build the audit log of `group` for `caller`, newest event first.
///
/// Fails with [`Error::UnsupportedGroup`] when the group is not internally
/// managed and with [`Error::NotOwner`] when `caller` does not own it. Both
/// checks run before any audit data is read. Accounts are resolved in a
/// single batch; accounts or groups that cannot be resolved appear as stubs.
///
/// Events with equal timestamps keep the order in which they were produced:
/// member events before subgroup events, and within one record the addition
/// before the removal.
pub async fn aggregate<S>(
  store: &S,
  group: &GroupUuid,
  caller: AccountId,
) -> Result<Vec<AuditEvent>>
where
  S: GroupStore + AccountStore,
{
  let Some(internal) = store.get_internal_group(group).await.map_err(Error::backend)? else {
    return match store.get_group_description(group).await.map_err(Error::backend)? {
      Some(_) => Err(Error::UnsupportedGroup(group.clone())),
      None => Err(Error::GroupNotFound(group.clone())),
    };
  };

  if !store.is_owner(&internal.uuid, caller).await.map_err(Error::backend)? {
    return Err(Error::NotOwner);
  }

  let members = store
    .get_members_audit(&internal.uuid)
    .await
    .map_err(Error::backend)?;
  let subgroups = store
    .get_subgroups_audit(&internal.uuid)
    .await
    .map_err(Error::backend)?;

  let mut loader = IdentityLoader::new();
  let mut pending = Vec::with_capacity(2 * (members.len() + subgroups.len()));

  for record in &members {
    let member = loader.register(record.account_id);
    pending.push(PendingEvent {
      kind:    AuditEventKind::AddUser,
      actor:   loader.register(record.added_by),
      subject: PendingSubject::Account(member),
      date:    record.added_on,
    });
    if let Some(removal) = &record.removal {
      pending.push(PendingEvent {
        kind:    AuditEventKind::RemoveUser,
        actor:   loader.register(removal.removed_by),
        subject: PendingSubject::Account(member),
        date:    removal.removed_on,
      });
    }
  }

  let mut groups: HashMap<GroupUuid, GroupInfo> = HashMap::new();
  let mut owner_names: HashMap<GroupUuid, Option<String>> = HashMap::new();
  for record in &subgroups {
    let include = &record.key.include_uuid;
    let member = match groups.get(include) {
      Some(info) => info.clone(),
      None => {
        let info = describe_group(store, include, &mut owner_names).await?;
        groups.insert(include.clone(), info.clone());
        info
      }
    };

    pending.push(PendingEvent {
      kind:    AuditEventKind::AddGroup,
      actor:   loader.register(record.added_by),
      subject: PendingSubject::Group(member.clone()),
      date:    record.key.added_on,
    });
    if let Some(removal) = &record.removal {
      pending.push(PendingEvent {
        kind:    AuditEventKind::RemoveGroup,
        actor:   loader.register(removal.removed_by),
        subject: PendingSubject::Group(member),
        date:    removal.removed_on,
      });
    }
  }

  loader.fill(store).await.map_err(Error::backend)?;

  let mut events: Vec<AuditEvent> = pending
    .into_iter()
    .map(|p| AuditEvent {
      kind:    p.kind,
      actor:   loader.resolve(p.actor),
      subject: match p.subject {
        PendingSubject::Account(slot) => {
          AuditSubject::Account(loader.resolve(slot))
        }
        PendingSubject::Group(info) => AuditSubject::Group(info),
      },
      date:    p.date,
    })
    .collect();

  // Stable: equal timestamps keep their append order.
  events.sort_by(|a, b| b.date.cmp(&a.date));

  tracing::debug!(
    group = %internal.uuid,
    members = members.len(),
    subgroups = subgroups.len(),
    events = events.len(),
    "aggregated audit log"
  );
  Ok(events)
}

/// Display form of an included group: the group cache if it knows the group,
/// else the generic backend reduced to `{id, name}`, else just `{id}`.
///
/// Owner group names are looked up once per call through `owner_names`.
async fn describe_group<S: GroupStore>(
  store: &S,
  uuid: &GroupUuid,
  owner_names: &mut HashMap<GroupUuid, Option<String>>,
) -> Result<GroupInfo> {
  if let Some(internal) = store.get_internal_group(uuid).await.map_err(Error::backend)? {
    let owner = if internal.owner_uuid == internal.uuid {
      Some(internal.name.clone())
    } else if let Some(name) = owner_names.get(&internal.owner_uuid) {
      name.clone()
    } else {
      let name = store
        .get_group_description(&internal.owner_uuid)
        .await
        .map_err(Error::backend)?
        .map(|d| d.name);
      owner_names.insert(internal.owner_uuid.clone(), name.clone());
      name
    };
    return Ok(GroupInfo::internal(&internal, owner));
  }
  match store.get_group_description(uuid).await.map_err(Error::backend)? {
    Some(desc) => Ok(GroupInfo::from(&desc)),
    None => {
      tracing::debug!(group = %uuid, "included group could not be resolved");
      Ok(GroupInfo::stub(uuid, None))
    }
  }
}
