//! The SQLite implementation of the Gatehouse backend traits.

use std::{
  collections::{BTreeSet, HashMap, HashSet},
  path::Path,
};

use chrono::Utc;
use gatehouse_core::{
  access::{self, AccessSection, ProjectAccessConfig},
  account::{AccountId, AccountInfo},
  audit::{MemberAuditRecord, SubgroupAuditRecord},
  group::{GroupDescription, GroupUuid, InternalGroup},
  store::{AccessStore, AccessUpdate, AccountStore, Backend, GroupStore},
};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    RawAccount, RawDescription, RawGroup, RawMemberAudit, RawSubgroupAudit,
    compute_revision, decode_section, encode_dt, encode_permissions,
  },
  schema::SCHEMA,
};

type CoreError = gatehouse_core::Error;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Gatehouse store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// A project row with its sections, before any per-user view is applied.
struct StoredProject {
  parent:   Option<String>,
  revision: String,
  sections: Vec<AccessSection>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Provisioning ──────────────────────────────────────────────────────────

  /// Register a new account and return its display form.
  pub async fn create_account(
    &self,
    full_name: Option<&str>,
    email: Option<&str>,
    username: Option<&str>,
  ) -> Result<AccountInfo> {
    let full_name = full_name.map(str::to_owned);
    let email = email.map(str::to_owned);
    let username = username.map(str::to_owned);
    let now = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO accounts (full_name, email, username, registered_on)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![full_name, email, username, now],
        )?;
        let account_id = u32::try_from(conn.last_insert_rowid())
          .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
        Ok(RawAccount { account_id, full_name, email, username })
      })
      .await?;

    Ok(raw.into_info())
  }

  /// Create an internal group with `creator` as its first member.
  ///
  /// Without an explicit `owner` the group owns itself.
  pub async fn create_group(
    &self,
    name: &str,
    description: Option<&str>,
    owner: Option<&GroupUuid>,
    creator: AccountId,
  ) -> Result<InternalGroup> {
    let uuid = GroupUuid(Uuid::new_v4().simple().to_string());
    let owner_uuid = owner.cloned().unwrap_or_else(|| uuid.clone());
    let created_on = Utc::now();

    let uuid_str = uuid.0.clone();
    let owner_str = owner_uuid.0.clone();
    let name_str = name.to_owned();
    let description_str = description.map(str::to_owned);
    let at_str = encode_dt(created_on);

    let id = self
      .conn
      .call(move |conn| {
        let id: u32 = conn.query_row(
          "SELECT COALESCE(MAX(group_id), 0) + 1 FROM groups",
          [],
          |r| r.get(0),
        )?;
        conn.execute(
          "INSERT INTO groups (
             group_uuid, group_id, name, description, owner_group_uuid,
             visible_to_all, created_on
           ) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
          rusqlite::params![uuid_str, id, name_str, description_str, owner_str, at_str],
        )?;
        Ok(id)
      })
      .await?;

    self.add_member(&uuid, creator, creator).await?;

    tracing::info!(group = %uuid, name, "created group");
    Ok(InternalGroup {
      uuid,
      id,
      name: name.to_owned(),
      description: description.map(str::to_owned),
      owner_uuid,
      visible_to_all: false,
      created_on,
    })
  }

  /// Make a group owned by another backend known to the generic lookup.
  pub async fn register_external_group(
    &self,
    uuid: &GroupUuid,
    name: &str,
    url: Option<&str>,
  ) -> Result<GroupDescription> {
    let description = GroupDescription {
      uuid: uuid.clone(),
      name: name.to_owned(),
      url:  url.map(str::to_owned),
    };

    let uuid_str = uuid.0.clone();
    let name_str = description.name.clone();
    let url_str = description.url.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO external_groups (group_uuid, name, url)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![uuid_str, name_str, url_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(description)
  }

  /// Create a project with an initial set of sections.
  ///
  /// Returns the initial revision.
  pub async fn create_project(
    &self,
    name: &str,
    parent: Option<&str>,
    sections: Vec<AccessSection>,
  ) -> Result<String> {
    access::validate_sections(&sections)?;
    let revision = compute_revision(&sections)?;
    let rows = encode_section_rows(&sections)?;

    let name_str = name.to_owned();
    let parent_str = parent.map(str::to_owned);
    let revision_str = revision.clone();
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO projects (name, parent, revision) VALUES (?1, ?2, ?3)",
          rusqlite::params![name_str, parent_str, revision_str],
        )?;
        insert_sections(&tx, &name_str, &rows)?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(revision)
  }

  /// Let members of `group` change `section` of `project`.
  pub async fn grant_section_owner(
    &self,
    project: &str,
    section: &str,
    group: &GroupUuid,
  ) -> Result<()> {
    let project = project.to_owned();
    let section = section.to_owned();
    let group = group.0.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO section_owners (project, section_name, group_uuid)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![project, section, group],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Lookups ───────────────────────────────────────────────────────────────

  /// Fail unless `uuid` is an internal group.
  async fn require_internal(&self, uuid: &GroupUuid) -> Result<InternalGroup> {
    if let Some(group) = self.get_internal_group(uuid).await? {
      return Ok(group);
    }
    match self.get_group_description(uuid).await? {
      Some(_) => Err(CoreError::UnsupportedGroup(uuid.clone()).into()),
      None => Err(CoreError::GroupNotFound(uuid.clone()).into()),
    }
  }

  async fn account_exists(&self, id: AccountId) -> Result<bool> {
    let exists = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM accounts WHERE account_id = ?1",
              rusqlite::params![id.0],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(exists)
  }

  /// Which of `uuids` name a group known to either backend.
  async fn known_groups(&self, uuids: Vec<String>) -> Result<HashSet<GroupUuid>> {
    let known = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT group_uuid FROM groups WHERE group_uuid = ?1
           UNION
           SELECT group_uuid FROM external_groups WHERE group_uuid = ?1",
        )?;
        let mut known = HashSet::new();
        for uuid in uuids {
          if let Some(found) = stmt
            .query_row(rusqlite::params![uuid], |r| r.get::<_, String>(0))
            .optional()?
          {
            known.insert(GroupUuid(found));
          }
        }
        Ok(known)
      })
      .await?;
    Ok(known)
  }

  async fn load_project(&self, project: &str) -> Result<Option<StoredProject>> {
    let name = project.to_owned();

    let raw = self
      .conn
      .call(move |conn| {
        let head: Option<(Option<String>, String)> = conn
          .query_row(
            "SELECT parent, revision FROM projects WHERE name = ?1",
            rusqlite::params![name],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )
          .optional()?;
        let Some((parent, revision)) = head else {
          return Ok(None);
        };

        let mut stmt = conn.prepare(
          "SELECT name, permissions_json FROM access_sections
           WHERE project = ?1 ORDER BY position",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![name], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some((parent, revision, rows)))
      })
      .await?;

    let Some((parent, revision, rows)) = raw else {
      return Ok(None);
    };
    let sections = rows
      .into_iter()
      .map(|(name, json)| decode_section(name, &json))
      .collect::<Result<Vec<_>>>()?;
    Ok(Some(StoredProject { parent, revision, sections }))
  }
}

// ─── Section helpers ─────────────────────────────────────────────────────────

fn encode_section_rows(sections: &[AccessSection]) -> Result<Vec<(String, String)>> {
  sections
    .iter()
    .map(|s| Ok((s.name.clone(), encode_permissions(s)?)))
    .collect()
}

fn insert_sections(
  conn: &rusqlite::Connection,
  project: &str,
  rows: &[(String, String)],
) -> rusqlite::Result<()> {
  let mut stmt = conn.prepare(
    "INSERT INTO access_sections (project, position, name, permissions_json)
     VALUES (?1, ?2, ?3, ?4)",
  )?;
  for (position, (name, json)) in rows.iter().enumerate() {
    stmt.execute(rusqlite::params![project, position as i64, name, json])?;
  }
  Ok(())
}

/// Combine the stored sections with a request, honouring what the user may
/// change.
///
/// Changeable requested sections are taken with rules naming unknown groups
/// removed. Requested sections the user may not change keep their stored
/// content, or are dropped if they are new. Stored sections missing from the
/// request survive unless the user may change them.
fn merge_sections(
  stored: &[AccessSection],
  requested: Vec<AccessSection>,
  can_change: impl Fn(&str) -> bool,
  known: &HashSet<GroupUuid>,
) -> Vec<AccessSection> {
  let stored_by_name: HashMap<&str, &AccessSection> =
    stored.iter().map(|s| (s.name.as_str(), s)).collect();
  let requested_names: HashSet<String> =
    requested.iter().map(|s| s.name.clone()).collect();

  let mut merged = Vec::with_capacity(requested.len());
  for mut section in requested {
    if can_change(&section.name) {
      section.retain_rules(|r| known.contains(&r.group.uuid));
      merged.push(section);
    } else if let Some(existing) = stored_by_name.get(section.name.as_str()) {
      merged.push((*existing).clone());
    }
  }

  merged.extend(
    stored
      .iter()
      .filter(|s| !requested_names.contains(&s.name) && !can_change(&s.name))
      .cloned(),
  );
  merged
}

// ─── Backend impls ───────────────────────────────────────────────────────────

impl Backend for SqliteStore {
  type Error = Error;
}

impl GroupStore for SqliteStore {
  async fn get_internal_group(&self, uuid: &GroupUuid) -> Result<Option<InternalGroup>> {
    let uuid_str = uuid.0.clone();

    let raw: Option<RawGroup> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT group_uuid, group_id, name, description, owner_group_uuid,
                      visible_to_all, created_on
               FROM groups WHERE group_uuid = ?1",
              rusqlite::params![uuid_str],
              |row| {
                Ok(RawGroup {
                  group_uuid:       row.get(0)?,
                  group_id:         row.get(1)?,
                  name:             row.get(2)?,
                  description:      row.get(3)?,
                  owner_group_uuid: row.get(4)?,
                  visible_to_all:   row.get(5)?,
                  created_on:       row.get(6)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawGroup::into_group).transpose()
  }

  async fn get_group_description(
    &self,
    uuid: &GroupUuid,
  ) -> Result<Option<GroupDescription>> {
    let uuid_str = uuid.0.clone();

    let raw: Option<RawDescription> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT group_uuid, name, NULL FROM groups WHERE group_uuid = ?1
               UNION ALL
               SELECT group_uuid, name, url FROM external_groups WHERE group_uuid = ?1
               LIMIT 1",
              rusqlite::params![uuid_str],
              |row| {
                Ok(RawDescription {
                  group_uuid: row.get(0)?,
                  name:       row.get(1)?,
                  url:        row.get(2)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    Ok(raw.map(RawDescription::into_description))
  }

  async fn is_owner(&self, uuid: &GroupUuid, account: AccountId) -> Result<bool> {
    let uuid_str = uuid.0.clone();

    let owner = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM groups g
               JOIN group_members m ON m.group_uuid = g.owner_group_uuid
               WHERE g.group_uuid = ?1 AND m.account_id = ?2",
              rusqlite::params![uuid_str, account.0],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(owner)
  }

  async fn get_members_audit(&self, uuid: &GroupUuid) -> Result<Vec<MemberAuditRecord>> {
    let uuid_str = uuid.0.clone();

    let raws: Vec<RawMemberAudit> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT group_uuid, account_id, added_by, added_on, removed_by, removed_on
           FROM group_members_audit WHERE group_uuid = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![uuid_str], |row| {
            Ok(RawMemberAudit {
              group_uuid: row.get(0)?,
              account_id: row.get(1)?,
              added_by:   row.get(2)?,
              added_on:   row.get(3)?,
              removed_by: row.get(4)?,
              removed_on: row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMemberAudit::into_record).collect()
  }

  async fn get_subgroups_audit(
    &self,
    uuid: &GroupUuid,
  ) -> Result<Vec<SubgroupAuditRecord>> {
    let uuid_str = uuid.0.clone();

    let raws: Vec<RawSubgroupAudit> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT group_uuid, include_uuid, added_by, added_on, removed_by, removed_on
           FROM group_includes_audit WHERE group_uuid = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![uuid_str], |row| {
            Ok(RawSubgroupAudit {
              group_uuid:   row.get(0)?,
              include_uuid: row.get(1)?,
              added_by:     row.get(2)?,
              added_on:     row.get(3)?,
              removed_by:   row.get(4)?,
              removed_on:   row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubgroupAudit::into_record).collect()
  }

  // ── Membership writes ─────────────────────────────────────────────────────

  async fn add_member(
    &self,
    uuid: &GroupUuid,
    member: AccountId,
    added_by: AccountId,
  ) -> Result<()> {
    self.require_internal(uuid).await?;
    if !self.account_exists(member).await? {
      return Err(CoreError::AccountNotFound(member).into());
    }

    let uuid_str = uuid.0.clone();
    let at_str = encode_dt(Utc::now());
    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let inserted = tx.execute(
          "INSERT OR IGNORE INTO group_members (group_uuid, account_id) VALUES (?1, ?2)",
          rusqlite::params![uuid_str, member.0],
        )?;
        if inserted > 0 {
          tx.execute(
            "INSERT INTO group_members_audit (group_uuid, account_id, added_by, added_on)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![uuid_str, member.0, added_by.0, at_str],
          )?;
        }
        tx.commit()?;
        Ok(inserted > 0)
      })
      .await?;

    if inserted {
      tracing::info!(group = %uuid, %member, by = %added_by, "added member");
    }
    Ok(())
  }

  async fn remove_member(
    &self,
    uuid: &GroupUuid,
    member: AccountId,
    removed_by: AccountId,
  ) -> Result<()> {
    self.require_internal(uuid).await?;

    let uuid_str = uuid.0.clone();
    let at_str = encode_dt(Utc::now());
    let removed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let removed = tx.execute(
          "DELETE FROM group_members WHERE group_uuid = ?1 AND account_id = ?2",
          rusqlite::params![uuid_str, member.0],
        )?;
        if removed > 0 {
          tx.execute(
            "UPDATE group_members_audit SET removed_by = ?3, removed_on = ?4
             WHERE group_uuid = ?1 AND account_id = ?2 AND removed_on IS NULL",
            rusqlite::params![uuid_str, member.0, removed_by.0, at_str],
          )?;
        }
        tx.commit()?;
        Ok(removed > 0)
      })
      .await?;

    if !removed {
      return Err(CoreError::NotMember(member.to_string(), uuid.clone()).into());
    }
    tracing::info!(group = %uuid, %member, by = %removed_by, "removed member");
    Ok(())
  }

  async fn add_subgroup(
    &self,
    uuid: &GroupUuid,
    include: &GroupUuid,
    added_by: AccountId,
  ) -> Result<()> {
    self.require_internal(uuid).await?;
    if self.get_group_description(include).await?.is_none() {
      return Err(CoreError::GroupNotFound(include.clone()).into());
    }

    let uuid_str = uuid.0.clone();
    let include_str = include.0.clone();
    let at_str = encode_dt(Utc::now());
    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let inserted = tx.execute(
          "INSERT OR IGNORE INTO group_includes (group_uuid, include_uuid) VALUES (?1, ?2)",
          rusqlite::params![uuid_str, include_str],
        )?;
        if inserted > 0 {
          tx.execute(
            "INSERT INTO group_includes_audit (group_uuid, include_uuid, added_by, added_on)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![uuid_str, include_str, added_by.0, at_str],
          )?;
        }
        tx.commit()?;
        Ok(inserted > 0)
      })
      .await?;

    if inserted {
      tracing::info!(group = %uuid, %include, by = %added_by, "included group");
    }
    Ok(())
  }

  async fn remove_subgroup(
    &self,
    uuid: &GroupUuid,
    include: &GroupUuid,
    removed_by: AccountId,
  ) -> Result<()> {
    self.require_internal(uuid).await?;

    let uuid_str = uuid.0.clone();
    let include_str = include.0.clone();
    let at_str = encode_dt(Utc::now());
    let removed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let removed = tx.execute(
          "DELETE FROM group_includes WHERE group_uuid = ?1 AND include_uuid = ?2",
          rusqlite::params![uuid_str, include_str],
        )?;
        if removed > 0 {
          tx.execute(
            "UPDATE group_includes_audit SET removed_by = ?3, removed_on = ?4
             WHERE group_uuid = ?1 AND include_uuid = ?2 AND removed_on IS NULL",
            rusqlite::params![uuid_str, include_str, removed_by.0, at_str],
          )?;
        }
        tx.commit()?;
        Ok(removed > 0)
      })
      .await?;

    if !removed {
      return Err(CoreError::NotMember(include.to_string(), uuid.clone()).into());
    }
    tracing::info!(group = %uuid, %include, by = %removed_by, "removed included group");
    Ok(())
  }
}

impl AccountStore for SqliteStore {
  async fn get_accounts(&self, ids: &[AccountId]) -> Result<HashMap<AccountId, AccountInfo>> {
    if ids.is_empty() {
      return Ok(HashMap::new());
    }
    let ids: Vec<u32> = ids.iter().map(|id| id.0).collect();

    let raws: Vec<RawAccount> = self
      .conn
      .call(move |conn| {
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
          "SELECT account_id, full_name, email, username
           FROM accounts WHERE account_id IN ({placeholders})"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(ids.iter()), |row| {
            Ok(RawAccount {
              account_id: row.get(0)?,
              full_name:  row.get(1)?,
              email:      row.get(2)?,
              username:   row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(
      raws
        .into_iter()
        .map(RawAccount::into_info)
        .map(|info| (info.account_id, info))
        .collect(),
    )
  }
}

impl AccessStore for SqliteStore {
  async fn get_access(
    &self,
    project: &str,
    account: AccountId,
  ) -> Result<Option<ProjectAccessConfig>> {
    let Some(stored) = self.load_project(project).await? else {
      return Ok(None);
    };
    let owner_of = self.owned_sections(project, account).await?;

    Ok(Some(ProjectAccessConfig {
      project: project.to_owned(),
      revision: stored.revision,
      inherits_from: stored.parent,
      sections: stored.sections,
      owner_of,
    }))
  }

  async fn apply_access(
    &self,
    project: &str,
    account: AccountId,
    update: AccessUpdate,
  ) -> Result<ProjectAccessConfig> {
    let stored = self
      .load_project(project)
      .await?
      .ok_or_else(|| CoreError::ProjectNotFound(project.to_owned()))?;

    if stored.revision != update.revision {
      return Err(
        CoreError::StaleRevision {
          expected: stored.revision,
          actual:   update.revision,
        }
        .into(),
      );
    }
    access::validate_sections(&update.sections)?;

    let owner_of = self.owned_sections(project, account).await?;
    let view = ProjectAccessConfig {
      project:       project.to_owned(),
      revision:      stored.revision.clone(),
      inherits_from: stored.parent.clone(),
      sections:      Vec::new(),
      owner_of,
    };
    if !view.is_owner_of_any() {
      return Err(CoreError::NotOwner.into());
    }

    let referenced: BTreeSet<String> = update
      .sections
      .iter()
      .flat_map(|s| s.referenced_groups())
      .map(|g| g.0.clone())
      .collect();
    let known = self.known_groups(referenced.into_iter().collect()).await?;

    let merged = merge_sections(
      &stored.sections,
      update.sections,
      |name| view.can_change(name),
      &known,
    );
    let revision = compute_revision(&merged)?;

    if revision != stored.revision {
      let rows = encode_section_rows(&merged)?;
      let name = project.to_owned();
      let old = stored.revision.clone();
      let new = revision.clone();
      let message = update.message.clone();
      let at_str = encode_dt(Utc::now());

      let swapped = self
        .conn
        .call(move |conn| {
          let tx = conn.transaction()?;
          let swapped = tx.execute(
            "UPDATE projects SET revision = ?3 WHERE name = ?1 AND revision = ?2",
            rusqlite::params![name, old, new],
          )?;
          if swapped == 0 {
            return Ok(false);
          }
          tx.execute(
            "DELETE FROM access_sections WHERE project = ?1",
            rusqlite::params![name],
          )?;
          insert_sections(&tx, &name, &rows)?;
          tx.execute(
            "INSERT INTO access_history (project, revision, message, account_id, committed_on)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![name, new, message, account.0, at_str],
          )?;
          tx.commit()?;
          Ok(true)
        })
        .await?;

      if !swapped {
        // Another writer got in between our read and our write.
        let current = self
          .load_project(project)
          .await?
          .map(|p| p.revision)
          .unwrap_or_default();
        return Err(
          CoreError::StaleRevision { expected: current, actual: update.revision }.into(),
        );
      }
      tracing::info!(project, %account, revision = %revision, "stored access configuration");
    }

    Ok(ProjectAccessConfig { revision, sections: merged, ..view })
  }

  async fn owned_sections(
    &self,
    project: &str,
    account: AccountId,
  ) -> Result<BTreeSet<String>> {
    let project = project.to_owned();

    let names = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT DISTINCT o.section_name
           FROM section_owners o
           JOIN group_members m ON m.group_uuid = o.group_uuid
           WHERE o.project = ?1 AND m.account_id = ?2",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![project, account.0], |r| r.get::<_, String>(0))?
          .collect::<rusqlite::Result<BTreeSet<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(names)
  }
}
