//! Account identities.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric account identifier.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AccountId(pub u32);

impl fmt::Display for AccountId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

/// The display form of an account.
///
/// Everything but `_account_id` is optional: an account that could not be
/// resolved is rendered as a stub carrying only its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
  #[serde(rename = "_account_id")]
  pub account_id: AccountId,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name:       Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email:      Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub username:   Option<String>,
}

impl AccountInfo {
  /// An account known only by its id.
  pub fn stub(account_id: AccountId) -> Self {
    Self { account_id, name: None, email: None, username: None }
  }
}
