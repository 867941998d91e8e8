//! Two-phase account resolution.
//!
//! Callers [`register`](IdentityLoader::register) every account id they will
//! need and keep the returned [`Slot`]. A single [`fill`](IdentityLoader::fill)
//! then resolves all registered ids in one backend round trip, after which
//! each slot can be turned into its [`AccountInfo`].

use std::collections::HashMap;

use crate::{
  account::{AccountId, AccountInfo},
  store::AccountStore,
};

/// Placeholder for an account that will be resolved by
/// [`IdentityLoader::fill`]: an index into the loader's resolution table,
/// plus the id it was registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
  index: usize,
  id:    AccountId,
}

impl Slot {
  pub fn account_id(&self) -> AccountId { self.id }
}

/// Batches account lookups.
#[derive(Debug, Default)]
pub struct IdentityLoader {
  ids:      Vec<AccountId>,
  index:    HashMap<AccountId, Slot>,
  resolved: Vec<AccountInfo>,
  filled:   bool,
}

impl IdentityLoader {
  pub fn new() -> Self { Self::default() }

  /// Register `id` for resolution. Registering the same id twice returns the
  /// same slot.
  pub fn register(&mut self, id: AccountId) -> Slot {
    debug_assert!(!self.filled, "register after fill");
    *self.index.entry(id).or_insert_with(|| {
      self.ids.push(id);
      Slot { index: self.ids.len() - 1, id }
    })
  }

  /// Number of distinct ids registered so far.
  pub fn len(&self) -> usize { self.ids.len() }

  pub fn is_empty(&self) -> bool { self.ids.is_empty() }

  /// Resolve every registered id in one call to `store`.
  ///
  /// Ids the store does not return are replaced by stubs carrying only the
  /// id. No call is made when nothing was registered.
  pub async fn fill<S: AccountStore>(&mut self, store: &S) -> Result<(), S::Error> {
    let mut found = if self.ids.is_empty() {
      HashMap::new()
    } else {
      store.get_accounts(&self.ids).await?
    };

    let mut gaps = 0usize;
    self.resolved = self
      .ids
      .iter()
      .map(|id| {
        found.remove(id).unwrap_or_else(|| {
          gaps += 1;
          AccountInfo::stub(*id)
        })
      })
      .collect();
    self.filled = true;

    tracing::debug!(
      requested = self.ids.len(),
      unresolved = gaps,
      "filled account identities"
    );
    Ok(())
  }

  /// The account behind `slot`.
  ///
  /// Before [`fill`](Self::fill) has run, or for a slot issued by another
  /// loader, this yields `None`.
  pub fn get(&self, slot: Slot) -> Option<&AccountInfo> {
    self.resolved.get(slot.index).filter(|info| info.account_id == slot.id)
  }

  /// The account behind `slot`, or a stub if it has not been resolved.
  pub fn resolve(&self, slot: Slot) -> AccountInfo {
    self
      .get(slot)
      .cloned()
      .unwrap_or_else(|| AccountInfo::stub(slot.id))
  }
}
