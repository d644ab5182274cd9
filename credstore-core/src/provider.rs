//! The credential store contract.
//!
//! [`CredentialStore`] exposes the five store operations twice:
//! - `try_*` methods return a classified [`StoreError`], so callers and tests
//!   can tell an invalid item, a missing entry and a backend failure apart
//! - the plain methods collapse that result to `bool` / `Option`, which is
//!   all most callers need
//!
//! Each operation is a single request against the backend. There is no
//! retry, no cancellation and no state retained between calls.

use crate::attributes::{ItemClass, Scope};
use crate::backend::BackendError;
use crate::error::StoreError;
use crate::item::{CredentialItem, Payload};

/// Result of one class-wide delete issued by a full wipe.
#[derive(Debug)]
pub struct DeleteOutcome {
    pub class: ItemClass,
    pub scope: Scope,
    pub result: Result<(), BackendError>,
}

/// Every delete issued by [`CredentialStore::try_delete_all_items`], in order.
#[derive(Debug, Default)]
pub struct DeleteAllReport {
    pub outcomes: Vec<DeleteOutcome>,
}

impl DeleteAllReport {
    /// Whether every delete succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// Whether the last delete issued succeeded.
    ///
    /// Earlier stores reported only this; it hides failures of every delete
    /// but the last.
    pub fn last_succeeded(&self) -> bool {
        self.outcomes.last().is_none_or(|o| o.result.is_ok())
    }

    /// Deletes that failed.
    pub fn failures(&self) -> impl Iterator<Item = &DeleteOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }
}

/// Add, retrieve, update and remove secrets in a protected store.
///
/// Implementations must be safe to share across threads. Concurrent calls
/// for the same item race at the backend; see
/// [`try_add_item`](Self::try_add_item).
pub trait CredentialStore: Send + Sync {
    /// The access group shared items are stored under, if configured.
    fn shared_access_group(&self) -> Option<&str>;

    /// Add `item`, overwriting any existing entry at the same address.
    ///
    /// The overwrite is a delete followed by a store, and the pair is not
    /// atomic: a concurrent add for the same address may land between the
    /// two and either overwrite or be overwritten by this one.
    fn try_add_item(&self, item: &CredentialItem) -> Result<(), StoreError>;

    /// Remove the entry addressed by `item`.
    fn try_remove_item(&self, item: &CredentialItem) -> Result<(), StoreError>;

    /// Replace the payload of the entry addressed by `old` with `new`'s payload.
    fn try_update_item(&self, old: &CredentialItem, new: &CredentialItem) -> Result<(), StoreError>;

    /// Fetch the payload of the entry addressed by `item`.
    fn try_get_item(&self, item: &CredentialItem) -> Result<Payload, StoreError>;

    /// Delete every entry of every class, in the private scope and in the
    /// shared scope if one is configured.
    fn try_delete_all_items(&self) -> DeleteAllReport;

    /// Add `item`. Returns `true` iff the store succeeded.
    fn add_item(&self, item: &CredentialItem) -> bool {
        self.try_add_item(item).is_ok()
    }

    /// Remove `item`. Returns `true` iff the backend reported success.
    fn remove_item(&self, item: &CredentialItem) -> bool {
        self.try_remove_item(item).is_ok()
    }

    /// Update `old` with the payload of `new`.
    ///
    /// Returns `false` when nothing matched `old`, as for any other failure.
    fn update_existing_item_with_new_item(&self, old: &CredentialItem, new: &CredentialItem) -> bool {
        self.try_update_item(old, new).is_ok()
    }

    /// Fetch the payload of `item`, or `None` if absent or on failure.
    fn get_item(&self, item: &CredentialItem) -> Option<Payload> {
        self.try_get_item(item).ok()
    }

    /// Wipe the store. Returns `true` iff every delete succeeded.
    fn delete_all_items(&self) -> bool {
        self.try_delete_all_items().all_succeeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(class: ItemClass, scope: Scope, ok: bool) -> DeleteOutcome {
        DeleteOutcome {
            class,
            scope,
            result: if ok {
                Ok(())
            } else {
                Err(BackendError::platform("denied"))
            },
        }
    }

    #[test]
    fn test_report_aggregation() {
        let report = DeleteAllReport {
            outcomes: vec![
                outcome(ItemClass::Key, Scope::Private, false),
                outcome(ItemClass::Key, Scope::Shared, true),
            ],
        };

        assert!(!report.all_succeeded());
        assert!(report.last_succeeded());
        assert_eq!(report.failures().count(), 1);
    }

    #[test]
    fn test_empty_report_succeeds() {
        let report = DeleteAllReport::default();
        assert!(report.all_succeeded());
        assert!(report.last_succeeded());
    }
}
