//! Integration tests for `SqliteStore` against an in-memory database.

use gatehouse_core::{
  Error as CoreError,
  access::{
    ALL_REFS, AccessSection, GroupReference, Permission, PermissionRule, RuleAction,
  },
  account::AccountId,
  audit::{self, AuditEventKind, AuditSubject},
  group::GroupUuid,
  store::{AccessStore, AccessUpdate, AccountStore, GroupStore},
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn account(s: &SqliteStore, username: &str) -> AccountId {
  s.create_account(Some(username), None, Some(username))
    .await
    .unwrap()
    .account_id
}

fn rule(group: &GroupUuid, name: &str) -> PermissionRule {
  PermissionRule {
    group:  GroupReference { uuid: group.clone(), name: name.into() },
    action: RuleAction::Allow,
    force:  false,
    min:    0,
    max:    0,
  }
}

fn section(name: &str, permission: &str, rules: Vec<PermissionRule>) -> AccessSection {
  AccessSection::new(name).with_permission(Permission {
    name: permission.into(),
    exclusive: false,
    rules,
  })
}

fn core(e: Error) -> CoreError { e.into() }

// ─── Accounts ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn get_accounts_batch_omits_unknown_ids() {
  let s = store().await;
  let a = account(&s, "alice").await;
  let b = account(&s, "bob").await;

  let found = s.get_accounts(&[a, b, AccountId(9999)]).await.unwrap();
  assert_eq!(found.len(), 2);
  assert_eq!(found[&a].username.as_deref(), Some("alice"));
  assert_eq!(found[&b].name.as_deref(), Some("bob"));
}

#[tokio::test]
async fn get_accounts_empty_input() {
  let s = store().await;
  assert!(s.get_accounts(&[]).await.unwrap().is_empty());
}

// ─── Groups ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_group_owns_itself_and_adds_creator() {
  let s = store().await;
  let alice = account(&s, "alice").await;

  let group = s.create_group("admins", Some("Admins"), None, alice).await.unwrap();
  assert_eq!(group.owner_uuid, group.uuid);
  assert_eq!(group.id, 1);

  let fetched = s.get_internal_group(&group.uuid).await.unwrap().unwrap();
  assert_eq!(fetched.name, "admins");
  assert_eq!(fetched.description.as_deref(), Some("Admins"));
  assert!(s.is_owner(&group.uuid, alice).await.unwrap());

  let audit = s.get_members_audit(&group.uuid).await.unwrap();
  assert_eq!(audit.len(), 1);
  assert_eq!(audit[0].account_id, alice);
  assert!(audit[0].is_active());
}

#[tokio::test]
async fn ownership_follows_owner_group_membership() {
  let s = store().await;
  let alice = account(&s, "alice").await;
  let bob = account(&s, "bob").await;

  let admins = s.create_group("admins", None, None, alice).await.unwrap();
  let devs = s.create_group("devs", None, Some(&admins.uuid), bob).await.unwrap();

  assert!(s.is_owner(&devs.uuid, alice).await.unwrap());
  assert!(!s.is_owner(&devs.uuid, bob).await.unwrap());
}

#[tokio::test]
async fn external_group_is_described_but_not_internal() {
  let s = store().await;
  let ext = GroupUuid::new("ldap:cn=ops");
  s.register_external_group(&ext, "ops", Some("ldap://ops")).await.unwrap();

  assert!(s.get_internal_group(&ext).await.unwrap().is_none());
  let described = s.get_group_description(&ext).await.unwrap().unwrap();
  assert_eq!(described.name, "ops");
  assert_eq!(described.url.as_deref(), Some("ldap://ops"));
}

#[tokio::test]
async fn unknown_group_has_no_description() {
  let s = store().await;
  let missing = GroupUuid::new("nope");
  assert!(s.get_group_description(&missing).await.unwrap().is_none());
}

// ─── Membership audit ────────────────────────────────────────────────────────

#[tokio::test]
async fn remove_member_closes_audit_record() {
  let s = store().await;
  let alice = account(&s, "alice").await;
  let bob = account(&s, "bob").await;
  let group = s.create_group("devs", None, None, alice).await.unwrap();

  s.add_member(&group.uuid, bob, alice).await.unwrap();
  s.remove_member(&group.uuid, bob, alice).await.unwrap();

  let audit = s.get_members_audit(&group.uuid).await.unwrap();
  let bob_record = audit.iter().find(|r| r.account_id == bob).unwrap();
  let removal = bob_record.removal.as_ref().unwrap();
  assert_eq!(removal.removed_by, alice);
  assert!(removal.removed_on >= bob_record.added_on);
}

#[tokio::test]
async fn add_member_twice_is_noop() {
  let s = store().await;
  let alice = account(&s, "alice").await;
  let group = s.create_group("devs", None, None, alice).await.unwrap();

  s.add_member(&group.uuid, alice, alice).await.unwrap();
  assert_eq!(s.get_members_audit(&group.uuid).await.unwrap().len(), 1);
}

#[tokio::test]
async fn add_member_rejects_unknown_account() {
  let s = store().await;
  let alice = account(&s, "alice").await;
  let group = s.create_group("devs", None, None, alice).await.unwrap();

  let err = s.add_member(&group.uuid, AccountId(4242), alice).await.unwrap_err();
  assert!(matches!(core(err), CoreError::AccountNotFound(AccountId(4242))));
}

#[tokio::test]
async fn remove_non_member_fails() {
  let s = store().await;
  let alice = account(&s, "alice").await;
  let bob = account(&s, "bob").await;
  let group = s.create_group("devs", None, None, alice).await.unwrap();

  let err = s.remove_member(&group.uuid, bob, alice).await.unwrap_err();
  assert!(matches!(core(err), CoreError::NotMember(..)));
}

#[tokio::test]
async fn membership_writes_on_external_group_are_unsupported() {
  let s = store().await;
  let alice = account(&s, "alice").await;
  let ext = GroupUuid::new("ldap:cn=ops");
  s.register_external_group(&ext, "ops", None).await.unwrap();

  let err = s.add_member(&ext, alice, alice).await.unwrap_err();
  assert!(matches!(core(err), CoreError::UnsupportedGroup(_)));
}

#[tokio::test]
async fn subgroup_audit_tracks_include_and_removal() {
  let s = store().await;
  let alice = account(&s, "alice").await;
  let parent = s.create_group("parent", None, None, alice).await.unwrap();
  let ext = GroupUuid::new("ldap:cn=ops");
  s.register_external_group(&ext, "ops", None).await.unwrap();

  s.add_subgroup(&parent.uuid, &ext, alice).await.unwrap();
  s.remove_subgroup(&parent.uuid, &ext, alice).await.unwrap();

  let audit = s.get_subgroups_audit(&parent.uuid).await.unwrap();
  assert_eq!(audit.len(), 1);
  assert_eq!(audit[0].key.include_uuid, ext);
  assert!(!audit[0].is_active());
}

#[tokio::test]
async fn add_subgroup_rejects_unknown_include() {
  let s = store().await;
  let alice = account(&s, "alice").await;
  let parent = s.create_group("parent", None, None, alice).await.unwrap();

  let err = s
    .add_subgroup(&parent.uuid, &GroupUuid::new("ghost"), alice)
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::GroupNotFound(_)));
}

// ─── Aggregation over SQLite ─────────────────────────────────────────────────

#[tokio::test]
async fn aggregate_reads_sqlite_history_newest_first() {
  let s = store().await;
  let alice = account(&s, "alice").await;
  let bob = account(&s, "bob").await;
  let group = s.create_group("devs", None, None, alice).await.unwrap();
  let ext = GroupUuid::new("ldap:cn=ops");
  s.register_external_group(&ext, "ops", None).await.unwrap();

  s.add_member(&group.uuid, bob, alice).await.unwrap();
  s.remove_member(&group.uuid, bob, alice).await.unwrap();
  s.add_subgroup(&group.uuid, &ext, alice).await.unwrap();

  let events = audit::aggregate(&s, &group.uuid, alice).await.unwrap();
  // alice joined, bob added and removed, ops included.
  assert_eq!(events.len(), 4);
  assert!(events.windows(2).all(|w| w[0].date >= w[1].date));

  let removal = events
    .iter()
    .find(|e| e.kind == AuditEventKind::RemoveUser)
    .unwrap();
  assert_eq!(removal.actor.username.as_deref(), Some("alice"));
  match &removal.subject {
    AuditSubject::Account(info) => assert_eq!(info.account_id, bob),
    other => panic!("unexpected subject: {other:?}"),
  }

  let include = events
    .iter()
    .find(|e| e.kind == AuditEventKind::AddGroup)
    .unwrap();
  match &include.subject {
    AuditSubject::Group(info) => assert_eq!(info.name.as_deref(), Some("ops")),
    other => panic!("unexpected subject: {other:?}"),
  }
}

#[tokio::test]
async fn aggregate_rejects_non_owner() {
  let s = store().await;
  let alice = account(&s, "alice").await;
  let bob = account(&s, "bob").await;
  let group = s.create_group("devs", None, None, alice).await.unwrap();

  let err = audit::aggregate(&s, &group.uuid, bob).await.unwrap_err();
  assert!(matches!(err, CoreError::NotOwner));
}

// ─── Project access ──────────────────────────────────────────────────────────

struct Fixture {
  store:  SqliteStore,
  alice:  AccountId,
  bob:    AccountId,
  admins: GroupUuid,
  devs:   GroupUuid,
}

/// `alice` owns `refs/*`, `bob` owns only `refs/heads/*`.
async fn project_fixture() -> Fixture {
  let store = store().await;
  let alice = account(&store, "alice").await;
  let bob = account(&store, "bob").await;
  let admins = store.create_group("admins", None, None, alice).await.unwrap().uuid;
  let devs = store.create_group("devs", None, None, bob).await.unwrap().uuid;

  store
    .create_project(
      "demo",
      Some("All-Projects"),
      vec![
        section("refs/heads/*", "push", vec![rule(&devs, "devs")]),
        section("refs/tags/*", "create", vec![rule(&admins, "admins")]),
      ],
    )
    .await
    .unwrap();
  store.grant_section_owner("demo", ALL_REFS, &admins).await.unwrap();
  store.grant_section_owner("demo", "refs/heads/*", &devs).await.unwrap();

  Fixture { store, alice, bob, admins, devs }
}

#[tokio::test]
async fn get_access_reports_sections_and_ownership() {
  let f = project_fixture().await;

  let access = f.store.get_access("demo", f.bob).await.unwrap().unwrap();
  assert_eq!(access.inherits_from.as_deref(), Some("All-Projects"));
  assert_eq!(access.sections.len(), 2);
  assert_eq!(access.sections[0].name, "refs/heads/*");
  assert!(access.can_change("refs/heads/*"));
  assert!(!access.can_change("refs/tags/*"));

  let access = f.store.get_access("demo", f.alice).await.unwrap().unwrap();
  assert!(access.can_change("refs/tags/*"));
}

#[tokio::test]
async fn get_access_missing_project() {
  let s = store().await;
  assert!(s.get_access("nope", AccountId(1)).await.unwrap().is_none());
}

#[tokio::test]
async fn apply_access_stores_owner_changes() {
  let f = project_fixture().await;
  let current = f.store.get_access("demo", f.alice).await.unwrap().unwrap();

  let mut sections = current.sections.clone();
  sections.push(section("refs/meta/*", "read", vec![rule(&f.admins, "admins")]));

  let stored = f
    .store
    .apply_access(
      "demo",
      f.alice,
      AccessUpdate {
        revision: current.revision.clone(),
        message: Some("add meta".into()),
        sections: sections.clone(),
      },
    )
    .await
    .unwrap();

  assert_ne!(stored.revision, current.revision);
  assert_eq!(stored.sections, sections);

  let reread = f.store.get_access("demo", f.alice).await.unwrap().unwrap();
  assert_eq!(reread.revision, stored.revision);
  assert_eq!(reread.sections, sections);
}

#[tokio::test]
async fn apply_access_keeps_sections_caller_does_not_own() {
  let f = project_fixture().await;
  let current = f.store.get_access("demo", f.bob).await.unwrap().unwrap();

  // bob rewrites both sections but only owns refs/heads/*.
  let requested = vec![
    section("refs/heads/*", "read", vec![rule(&f.devs, "devs")]),
    section("refs/tags/*", "create", vec![rule(&f.devs, "devs")]),
  ];
  let stored = f
    .store
    .apply_access(
      "demo",
      f.bob,
      AccessUpdate {
        revision: current.revision.clone(),
        message: None,
        sections: requested.clone(),
      },
    )
    .await
    .unwrap();

  assert_eq!(stored.section("refs/heads/*"), Some(&requested[0]));
  assert_eq!(stored.section("refs/tags/*"), current.section("refs/tags/*"));

  let diffs = gatehouse_core::access::diff_sections(&requested, &stored.sections);
  assert_eq!(diffs.into_iter().collect::<Vec<_>>(), vec!["refs/tags/*".to_owned()]);
}

#[tokio::test]
async fn apply_access_merges_omitted_and_unowned_sections() {
  let f = project_fixture().await;
  let current = f.store.get_access("demo", f.bob).await.unwrap().unwrap();

  // bob owns refs/heads/* only: he leaves out both stored sections and asks
  // for a new one he cannot change.
  let requested = vec![section("refs/meta/*", "read", vec![rule(&f.devs, "devs")])];
  let stored = f
    .store
    .apply_access(
      "demo",
      f.bob,
      AccessUpdate {
        revision: current.revision.clone(),
        message:  Some("prune".into()),
        sections: requested.clone(),
      },
    )
    .await
    .unwrap();

  let tags = current.section("refs/tags/*").unwrap().clone();
  assert_eq!(stored.sections, vec![tags.clone()]);
  assert_ne!(stored.revision, current.revision);

  let diffs = gatehouse_core::access::diff_sections(&requested, &stored.sections);
  assert_eq!(
    diffs.into_iter().collect::<Vec<_>>(),
    vec!["refs/meta/*".to_owned(), "refs/tags/*".to_owned()]
  );

  let reread = f.store.get_access("demo", f.alice).await.unwrap().unwrap();
  assert_eq!(reread.sections, vec![tags]);
  assert_eq!(reread.revision, stored.revision);
}

#[tokio::test]
async fn apply_access_drops_rules_for_unknown_groups() {
  let f = project_fixture().await;
  let current = f.store.get_access("demo", f.alice).await.unwrap().unwrap();

  let ghost = GroupUuid::new("ghost");
  let requested = vec![
    section("refs/heads/*", "push", vec![rule(&f.devs, "devs"), rule(&ghost, "ghost")]),
    current.sections[1].clone(),
  ];
  let stored = f
    .store
    .apply_access(
      "demo",
      f.alice,
      AccessUpdate { revision: current.revision, message: None, sections: requested },
    )
    .await
    .unwrap();

  let heads = stored.section("refs/heads/*").unwrap();
  assert_eq!(heads.permissions[0].rules.len(), 1);
  assert_eq!(heads.permissions[0].rules[0].group.uuid, f.devs);
}

#[tokio::test]
async fn apply_access_unchanged_keeps_revision() {
  let f = project_fixture().await;
  let current = f.store.get_access("demo", f.alice).await.unwrap().unwrap();

  let stored = f
    .store
    .apply_access(
      "demo",
      f.alice,
      AccessUpdate {
        revision: current.revision.clone(),
        message: None,
        sections: current.sections.clone(),
      },
    )
    .await
    .unwrap();
  assert_eq!(stored.revision, current.revision);
}

#[tokio::test]
async fn apply_access_rejects_stale_revision() {
  let f = project_fixture().await;
  let current = f.store.get_access("demo", f.alice).await.unwrap().unwrap();

  let err = f
    .store
    .apply_access(
      "demo",
      f.alice,
      AccessUpdate {
        revision: "0000".into(),
        message: None,
        sections: current.sections,
      },
    )
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::StaleRevision { .. }));
}

#[tokio::test]
async fn apply_access_rejects_non_owner() {
  let f = project_fixture().await;
  let carol = account(&f.store, "carol").await;
  let current = f.store.get_access("demo", carol).await.unwrap().unwrap();
  assert!(!current.is_owner_of_any());

  let err = f
    .store
    .apply_access(
      "demo",
      carol,
      AccessUpdate {
        revision: current.revision,
        message: None,
        sections: current.sections,
      },
    )
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::NotOwner));
}

#[tokio::test]
async fn apply_access_rejects_invalid_sections() {
  let f = project_fixture().await;
  let current = f.store.get_access("demo", f.alice).await.unwrap().unwrap();

  let err = f
    .store
    .apply_access(
      "demo",
      f.alice,
      AccessUpdate {
        revision: current.revision,
        message: None,
        sections: vec![AccessSection::new("heads/*")],
      },
    )
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::Validation(_)));
}

#[tokio::test]
async fn apply_access_unknown_project() {
  let s = store().await;
  let err = s
    .apply_access(
      "nope",
      AccountId(1),
      AccessUpdate { revision: String::new(), message: None, sections: vec![] },
    )
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::ProjectNotFound(_)));
}
