//! Groups as seen by the group cache and by the generic group backend, and
//! the [`GroupInfo`] display form built from either.

use std::fmt;

use chrono::{DateTime, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};

/// Characters left unescaped when a group UUID is used as a display id.
const GROUP_ID: &AsciiSet = &NON_ALPHANUMERIC
  .remove(b'-')
  .remove(b'.')
  .remove(b'_')
  .remove(b'*');

// ─── Identifier ──────────────────────────────────────────────────────────────

/// Opaque group identifier.
///
/// Internal groups carry a generated hex string; groups owned by other
/// backends carry a prefixed name such as `ldap:cn=devs,ou=groups`.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GroupUuid(pub String);

impl GroupUuid {
  pub fn new(uuid: impl Into<String>) -> Self { Self(uuid.into()) }

  pub fn as_str(&self) -> &str { &self.0 }

  /// The URL-safe form used as [`GroupInfo::id`].
  pub fn url_encoded(&self) -> String {
    utf8_percent_encode(&self.0, GROUP_ID).to_string()
  }
}

impl fmt::Display for GroupUuid {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

// ─── Sources ─────────────────────────────────────────────────────────────────

/// A group whose membership is fully managed by this system, as held by the
/// group cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalGroup {
  pub uuid:           GroupUuid,
  /// Numeric id, stable for the lifetime of the group.
  pub id:             u32,
  pub name:           String,
  pub description:    Option<String>,
  /// Members of this group own `uuid`.
  pub owner_uuid:     GroupUuid,
  pub visible_to_all: bool,
  pub created_on:     DateTime<Utc>,
}

/// What the generic group backend knows about any group, internal or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDescription {
  pub uuid: GroupUuid,
  pub name: String,
  pub url:  Option<String>,
}

// ─── Display form ────────────────────────────────────────────────────────────

/// A group as rendered in API responses.
///
/// Internal groups are formatted in full. Groups that only the generic
/// backend knows about are reduced to `id` and `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
  pub id:             String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name:           Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub group_id:       Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description:    Option<String>,
  /// Name of the owner group.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub owner:          Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub owner_id:       Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub visible_to_all: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_on:     Option<DateTime<Utc>>,
}

impl GroupInfo {
  /// A minimal `{id, name}` identity.
  pub fn stub(uuid: &GroupUuid, name: Option<String>) -> Self {
    Self {
      id: uuid.url_encoded(),
      name,
      group_id: None,
      description: None,
      owner: None,
      owner_id: None,
      visible_to_all: None,
      created_on: None,
    }
  }

  /// The full form of an internal group. `owner` is the owner group's name,
  /// when known.
  pub fn internal(g: &InternalGroup, owner: Option<String>) -> Self {
    Self { owner, ..Self::from(g) }
  }
}

impl From<&InternalGroup> for GroupInfo {
  fn from(g: &InternalGroup) -> Self {
    Self {
      id:             g.uuid.url_encoded(),
      name:           Some(g.name.clone()),
      group_id:       Some(g.id),
      description:    g.description.clone(),
      owner:          None,
      owner_id:       Some(g.owner_uuid.url_encoded()),
      visible_to_all: Some(g.visible_to_all),
      created_on:     Some(g.created_on),
    }
  }
}

impl From<&GroupDescription> for GroupInfo {
  fn from(d: &GroupDescription) -> Self {
    Self::stub(&d.uuid, Some(d.name.clone()))
  }
}
