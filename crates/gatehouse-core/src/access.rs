//! Project access configuration and the reconciliation between what a client
//! asked to store and what the write path actually stored.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::{Error, Result, group::GroupUuid};

/// Name of the section holding server-wide capabilities rather than ref
/// permissions.
pub const GLOBAL_CAPABILITIES: &str = "GLOBAL_CAPABILITIES";

/// Section whose owners may change every section of the project.
pub const ALL_REFS: &str = "refs/*";

// ─── Rules ───────────────────────────────────────────────────────────────────

/// What a rule does for the members of its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleAction {
  #[default]
  Allow,
  Deny,
  Block,
  Interactive,
  Batch,
}

/// A reference to the group a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupReference {
  pub uuid: GroupUuid,
  pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionRule {
  pub group:  GroupReference,
  #[serde(default)]
  pub action: RuleAction,
  #[serde(default)]
  pub force:  bool,
  /// Lower bound for label permissions; zero otherwise.
  #[serde(default)]
  pub min:    i32,
  #[serde(default)]
  pub max:    i32,
}

/// A named permission (`read`, `push`, `label-Code-Review`, ...) and the
/// ordered rules granting or denying it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
  pub name:      String,
  #[serde(default)]
  pub exclusive: bool,
  #[serde(default)]
  pub rules:     Vec<PermissionRule>,
}

// ─── Sections ────────────────────────────────────────────────────────────────

/// A named block of permissions scoped to a ref pattern.
///
/// Equality covers the name and the full ordered content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessSection {
  pub name:        String,
  #[serde(default)]
  pub permissions: Vec<Permission>,
}

impl AccessSection {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into(), permissions: Vec::new() }
  }

  /// Builder-style helper adding one permission.
  pub fn with_permission(mut self, permission: Permission) -> Self {
    self.permissions.push(permission);
    self
  }

  /// Every group referenced by a rule in this section.
  pub fn referenced_groups(&self) -> impl Iterator<Item = &GroupUuid> {
    self
      .permissions
      .iter()
      .flat_map(|p| p.rules.iter())
      .map(|r| &r.group.uuid)
  }

  /// Drop every rule for which `keep` returns `false`.
  pub fn retain_rules(&mut self, mut keep: impl FnMut(&PermissionRule) -> bool) {
    for permission in &mut self.permissions {
      permission.rules.retain(|r| keep(r));
    }
  }
}

/// The access configuration of one project, as seen by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectAccessConfig {
  pub project:       String,
  /// Identifies the stored configuration; writes must name the revision they
  /// were based on.
  pub revision:      String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub inherits_from: Option<String>,
  pub sections:      Vec<AccessSection>,
  /// Sections the viewing user may change. Read only.
  #[serde(default)]
  pub owner_of:      BTreeSet<String>,
}

impl ProjectAccessConfig {
  pub fn section(&self, name: &str) -> Option<&AccessSection> {
    self.sections.iter().find(|s| s.name == name)
  }

  /// Whether the viewing user may change anything at all.
  pub fn is_owner_of_any(&self) -> bool { !self.owner_of.is_empty() }

  /// Whether the viewing user may change the section called `name`.
  pub fn can_change(&self, name: &str) -> bool {
    self.owner_of.contains(name) || self.owner_of.contains(ALL_REFS)
  }
}

// ─── Diff ────────────────────────────────────────────────────────────────────

/// Names of the sections that differ between `requested` and `persisted`.
///
/// A section counts as different when it appears on one side only or when
/// the same name carries different content. Section order is irrelevant. An
/// empty result means the write was applied exactly as requested.
pub fn diff(
  requested: &ProjectAccessConfig,
  persisted: &ProjectAccessConfig,
) -> BTreeSet<String> {
  diff_sections(&requested.sections, &persisted.sections)
}

/// [`diff`] over bare section lists.
pub fn diff_sections(
  requested: &[AccessSection],
  persisted: &[AccessSection],
) -> BTreeSet<String> {
  let wanted: HashSet<&AccessSection> = requested.iter().collect();
  let stored: HashSet<&AccessSection> = persisted.iter().collect();

  wanted
    .symmetric_difference(&stored)
    .map(|s| s.name.clone())
    .collect()
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Check that section names are present, unique, and name either a ref
/// pattern or the global capabilities block.
pub fn validate_sections(sections: &[AccessSection]) -> Result<()> {
  let mut seen = HashSet::with_capacity(sections.len());
  for section in sections {
    let name = section.name.as_str();
    if name.trim().is_empty() {
      return Err(Error::Validation("section name must not be empty".into()));
    }
    if name != name.trim() {
      return Err(Error::Validation(format!(
        "section {name:?} has surrounding whitespace"
      )));
    }
    if name != GLOBAL_CAPABILITIES && !name.starts_with("refs/") {
      return Err(Error::Validation(format!(
        "section {name:?} must start with \"refs/\""
      )));
    }
    if !seen.insert(name) {
      return Err(Error::Validation(format!("duplicate section {name:?}")));
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn rule(group: &str, action: RuleAction) -> PermissionRule {
    PermissionRule {
      group: GroupReference {
        uuid: GroupUuid::new(group),
        name: group.to_string(),
      },
      action,
      force: false,
      min: 0,
      max: 0,
    }
  }

  fn section(name: &str, rules: Vec<PermissionRule>) -> AccessSection {
    AccessSection::new(name).with_permission(Permission {
      name: "read".into(),
      exclusive: false,
      rules,
    })
  }

  fn config(sections: Vec<AccessSection>) -> ProjectAccessConfig {
    ProjectAccessConfig {
      project: "platform/build".into(),
      revision: "abc".into(),
      inherits_from: None,
      sections,
      owner_of: BTreeSet::new(),
    }
  }

  fn names(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn identical_configs_have_no_diff() {
    let a = config(vec![
      section("refs/heads/*", vec![rule("devs", RuleAction::Allow)]),
      section("refs/tags/*", vec![rule("release", RuleAction::Allow)]),
    ]);
    assert!(diff(&a, &a).is_empty());
  }

  #[test]
  fn reordering_sections_is_not_a_diff() {
    let a = section("refs/heads/*", vec![rule("devs", RuleAction::Allow)]);
    let b = section("refs/tags/*", vec![rule("release", RuleAction::Allow)]);
    let requested = config(vec![a.clone(), b.clone()]);
    let persisted = config(vec![b, a]);
    assert!(diff(&requested, &persisted).is_empty());
  }

  #[test]
  fn changed_rule_reports_its_section() {
    let requested = config(vec![
      section("refs/heads/*", vec![rule("devs", RuleAction::Allow)]),
      section("refs/tags/*", vec![rule("release", RuleAction::Allow)]),
    ]);
    let persisted = config(vec![
      section("refs/heads/*", vec![rule("devs", RuleAction::Deny)]),
      section("refs/tags/*", vec![rule("release", RuleAction::Allow)]),
    ]);
    assert_eq!(diff(&requested, &persisted), names(&["refs/heads/*"]));
  }

  #[test]
  fn changed_second_section_only() {
    let requested = config(vec![
      section("SectionA", vec![rule("r1", RuleAction::Allow)]),
      section("SectionB", vec![rule("r2", RuleAction::Allow)]),
    ]);
    let persisted = config(vec![
      section("SectionA", vec![rule("r1", RuleAction::Allow)]),
      section("SectionB", vec![rule("r3", RuleAction::Allow)]),
    ]);
    assert_eq!(diff(&requested, &persisted), names(&["SectionB"]));
  }

  #[test]
  fn one_sided_sections_are_reported() {
    let requested = config(vec![
      section("refs/heads/*", vec![]),
      section("refs/meta/config", vec![rule("owners", RuleAction::Allow)]),
    ]);
    let persisted = config(vec![
      section("refs/heads/*", vec![]),
      section("refs/for/*", vec![]),
    ]);
    assert_eq!(
      diff(&requested, &persisted),
      names(&["refs/for/*", "refs/meta/config"])
    );
  }

  #[test]
  fn diff_is_symmetric() {
    let a = config(vec![
      section("refs/heads/*", vec![rule("devs", RuleAction::Allow)]),
      section("refs/tags/*", vec![]),
    ]);
    let b = config(vec![
      section("refs/heads/*", vec![rule("devs", RuleAction::Block)]),
      section("refs/for/*", vec![]),
    ]);
    assert_eq!(diff(&a, &b), diff(&b, &a));
  }

  #[test]
  fn rule_order_is_content() {
    let requested = config(vec![section(
      "refs/heads/*",
      vec![rule("a", RuleAction::Allow), rule("b", RuleAction::Allow)],
    )]);
    let persisted = config(vec![section(
      "refs/heads/*",
      vec![rule("b", RuleAction::Allow), rule("a", RuleAction::Allow)],
    )]);
    assert_eq!(diff(&requested, &persisted), names(&["refs/heads/*"]));
  }

  #[test]
  fn validation_rejects_bad_names() {
    assert!(validate_sections(&[AccessSection::new("refs/heads/*")]).is_ok());
    assert!(validate_sections(&[AccessSection::new(GLOBAL_CAPABILITIES)]).is_ok());
    assert!(matches!(
      validate_sections(&[AccessSection::new("  ")]),
      Err(Error::Validation(_))
    ));
    assert!(matches!(
      validate_sections(&[AccessSection::new("heads/*")]),
      Err(Error::Validation(_))
    ));
    assert!(matches!(
      validate_sections(&[
        AccessSection::new("refs/heads/*"),
        AccessSection::new("refs/heads/*"),
      ]),
      Err(Error::Validation(_))
    ));
  }

  #[test]
  fn validation_rejects_padded_names() {
    for name in ["refs/heads/* ", " refs/heads/*", "GLOBAL_CAPABILITIES\t"] {
      assert!(
        matches!(
          validate_sections(&[AccessSection::new(name)]),
          Err(Error::Validation(_))
        ),
        "{name:?} should be rejected"
      );
    }
  }

  #[test]
  fn owner_of_all_refs_can_change_anything() {
    let mut c = config(vec![]);
    assert!(!c.is_owner_of_any());
    c.owner_of.insert(ALL_REFS.into());
    assert!(c.can_change("refs/heads/main"));
    assert!(c.is_owner_of_any());
  }
}
