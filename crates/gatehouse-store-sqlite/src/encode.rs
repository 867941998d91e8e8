//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, account ids as integers, and
//! section permissions as compact JSON.

use chrono::{DateTime, Utc};
use gatehouse_core::{
  access::{AccessSection, Permission},
  account::{AccountId, AccountInfo},
  audit::{MemberAuditRecord, Removal, SubgroupAuditKey, SubgroupAuditRecord},
  group::{GroupDescription, GroupUuid, InternalGroup},
};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_removal(by: Option<u32>, on: Option<String>) -> Result<Option<Removal>> {
  match (by, on) {
    (Some(by), Some(on)) => Ok(Some(Removal {
      removed_by: AccountId(by),
      removed_on: decode_dt(&on)?,
    })),
    _ => Ok(None),
  }
}

// ─── Sections ────────────────────────────────────────────────────────────────

pub fn encode_permissions(section: &AccessSection) -> Result<String> {
  Ok(serde_json::to_string(&section.permissions)?)
}

pub fn decode_section(name: String, permissions_json: &str) -> Result<AccessSection> {
  let permissions: Vec<Permission> = serde_json::from_str(permissions_json)?;
  Ok(AccessSection { name, permissions })
}

/// Content hash identifying a stored set of sections.
///
/// Stable for identical content in identical order.
pub fn compute_revision(sections: &[AccessSection]) -> Result<String> {
  let mut hasher = Sha256::new();
  hasher.update(serde_json::to_vec(sections)?);
  Ok(hex::encode(hasher.finalize()))
}

// ─── Raw rows ────────────────────────────────────────────────────────────────

/// Raw column values for an `accounts` row.
pub struct RawAccount {
  pub account_id: u32,
  pub full_name:  Option<String>,
  pub email:      Option<String>,
  pub username:   Option<String>,
}

impl RawAccount {
  pub fn into_info(self) -> AccountInfo {
    AccountInfo {
      account_id: AccountId(self.account_id),
      name:       self.full_name,
      email:      self.email,
      username:   self.username,
    }
  }
}

/// Raw column values for a `groups` row.
pub struct RawGroup {
  pub group_uuid:       String,
  pub group_id:         u32,
  pub name:             String,
  pub description:      Option<String>,
  pub owner_group_uuid: String,
  pub visible_to_all:   bool,
  pub created_on:       String,
}

impl RawGroup {
  pub fn into_group(self) -> Result<InternalGroup> {
    Ok(InternalGroup {
      uuid:           GroupUuid(self.group_uuid),
      id:             self.group_id,
      name:           self.name,
      description:    self.description,
      owner_uuid:     GroupUuid(self.owner_group_uuid),
      visible_to_all: self.visible_to_all,
      created_on:     decode_dt(&self.created_on)?,
    })
  }
}

pub struct RawDescription {
  pub group_uuid: String,
  pub name:       String,
  pub url:        Option<String>,
}

impl RawDescription {
  pub fn into_description(self) -> GroupDescription {
    GroupDescription { uuid: GroupUuid(self.group_uuid), name: self.name, url: self.url }
  }
}

/// Raw column values for a `group_members_audit` row.
pub struct RawMemberAudit {
  pub group_uuid: String,
  pub account_id: u32,
  pub added_by:   u32,
  pub added_on:   String,
  pub removed_by: Option<u32>,
  pub removed_on: Option<String>,
}

impl RawMemberAudit {
  pub fn into_record(self) -> Result<MemberAuditRecord> {
    Ok(MemberAuditRecord {
      group_uuid: GroupUuid(self.group_uuid),
      account_id: AccountId(self.account_id),
      added_by:   AccountId(self.added_by),
      added_on:   decode_dt(&self.added_on)?,
      removal:    decode_removal(self.removed_by, self.removed_on)?,
    })
  }
}

/// Raw column values for a `group_includes_audit` row.
pub struct RawSubgroupAudit {
  pub group_uuid:   String,
  pub include_uuid: String,
  pub added_by:     u32,
  pub added_on:     String,
  pub removed_by:   Option<u32>,
  pub removed_on:   Option<String>,
}

impl RawSubgroupAudit {
  pub fn into_record(self) -> Result<SubgroupAuditRecord> {
    Ok(SubgroupAuditRecord {
      key:      SubgroupAuditKey {
        group_uuid:   GroupUuid(self.group_uuid),
        include_uuid: GroupUuid(self.include_uuid),
        added_on:     decode_dt(&self.added_on)?,
      },
      added_by: AccountId(self.added_by),
      removal:  decode_removal(self.removed_by, self.removed_on)?,
    })
  }
}
