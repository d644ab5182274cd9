//! Backend-backed implementation of [`CredentialStore`].

use tracing::{debug, info, warn};

use crate::attributes::{AttributeQueryBuilder, AttributeSet, ItemClass, Scope};
use crate::backend::{create_backend, Backend};
use crate::config::{load_config, StoreConfig};
use crate::error::{CredstoreError, InvalidItem, StoreError};
use crate::item::{CredentialItem, Payload};
use crate::provider::{CredentialStore, DeleteAllReport, DeleteOutcome};

/// Credential store over an injected [`Backend`].
///
/// Holds only immutable configuration, so a single manager can be shared
/// across threads behind an `Arc`.
///
/// # Example
///
/// ```
/// use credstore_core::{CredentialItem, CredentialManager, CredentialStore, MemoryBackend};
///
/// let store = CredentialManager::new(MemoryBackend::new(), None);
/// assert!(store.add_item(&CredentialItem::password("login", "s3cr3t")));
///
/// let payload = store.get_item(&CredentialItem::password("login", "")).unwrap();
/// assert_eq!(payload.expose(), b"s3cr3t");
/// ```
pub struct CredentialManager<B = Box<dyn Backend>> {
    backend: B,
    builder: AttributeQueryBuilder,
}

impl<B: Backend> CredentialManager<B> {
    /// Create a manager with default addressing and the given shared access group.
    pub fn new(backend: B, shared_access_group: Option<String>) -> Self {
        Self::with_builder(backend, AttributeQueryBuilder::new(shared_access_group))
    }

    pub fn with_builder(backend: B, builder: AttributeQueryBuilder) -> Self {
        Self { backend, builder }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn builder(&self) -> &AttributeQueryBuilder {
        &self.builder
    }

    fn scope_of(attributes: &AttributeSet) -> Scope {
        if attributes.access_group().is_some() {
            Scope::Shared
        } else {
            Scope::Private
        }
    }
}

impl CredentialManager {
    /// Build a manager over the backend named in `config`.
    ///
    /// Falls back to an in-memory backend if the keyring is unavailable.
    pub fn from_config(config: &StoreConfig) -> Self {
        let backend = create_backend(config.backend, &config.keyring_service);
        Self::with_builder(backend, AttributeQueryBuilder::from_config(config))
    }

    /// Build a manager from the default configuration file.
    pub fn load() -> Result<Self, CredstoreError> {
        let config = load_config()?;
        info!(path = ?config.config_path, backend = ?config.backend, "Loaded store configuration");
        Ok(Self::from_config(&config))
    }
}

impl<B> std::fmt::Debug for CredentialManager<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("shared_access_group", &self.builder.shared_access_group())
            .finish()
    }
}

impl<B: Backend> CredentialStore for CredentialManager<B> {
    fn shared_access_group(&self) -> Option<&str> {
        self.builder.shared_access_group()
    }

    fn try_add_item(&self, item: &CredentialItem) -> Result<(), StoreError> {
        item.validate(true)?;
        let Some(payload) = item.payload.as_ref() else {
            return Err(InvalidItem::MissingPayload.into());
        };
        let attributes = self.builder.build(item)?;
        let scope = Self::scope_of(&attributes);

        // Absence of a prior entry is the common case.
        if let Err(e) = self.backend.delete(&attributes) {
            debug!(tag = %item.tag, kind = %item.kind, %scope, status = e.code(), "Pre-add delete did not succeed");
        }

        match self.backend.store(&attributes, payload) {
            Ok(()) => {
                debug!(tag = %item.tag, kind = %item.kind, %scope, "Added item");
                Ok(())
            }
            Err(e) => {
                warn!(tag = %item.tag, kind = %item.kind, %scope, status = e.code(), "Couldn't add item: {}", e);
                Err(StoreError::from_backend(&item.tag, e))
            }
        }
    }

    fn try_remove_item(&self, item: &CredentialItem) -> Result<(), StoreError> {
        item.validate(false)?;
        let attributes = self.builder.build(item)?;
        let scope = Self::scope_of(&attributes);

        match self.backend.delete(&attributes) {
            Ok(()) => {
                debug!(tag = %item.tag, kind = %item.kind, %scope, "Removed item");
                Ok(())
            }
            Err(e) => {
                warn!(tag = %item.tag, kind = %item.kind, %scope, status = e.code(), "Couldn't remove item: {}", e);
                Err(StoreError::from_backend(&item.tag, e))
            }
        }
    }

    fn try_update_item(&self, old: &CredentialItem, new: &CredentialItem) -> Result<(), StoreError> {
        old.validate(false)?;
        new.validate(true)?;
        let Some(payload) = new.payload.as_ref() else {
            return Err(InvalidItem::MissingPayload.into());
        };
        let attributes = self.builder.build(old)?;
        let scope = Self::scope_of(&attributes);

        match self.backend.update_payload(&attributes, payload) {
            Ok(()) => {
                debug!(tag = %old.tag, kind = %old.kind, %scope, "Updated item");
                Ok(())
            }
            Err(e) => {
                let err = StoreError::from_backend(&old.tag, e);
                if err.is_not_found() {
                    info!(tag = %old.tag, kind = %old.kind, %scope, "Couldn't update item: not found");
                } else {
                    warn!(tag = %old.tag, kind = %old.kind, %scope, status = ?err.status_code(), "Couldn't update item: {}", err);
                }
                Err(err)
            }
        }
    }

    fn try_get_item(&self, item: &CredentialItem) -> Result<Payload, StoreError> {
        item.validate(false)?;
        let attributes = self.builder.build(item)?;
        let scope = Self::scope_of(&attributes);

        match self.backend.query(&attributes) {
            Ok(payload) => {
                debug!(tag = %item.tag, kind = %item.kind, %scope, "Fetched item");
                Ok(payload)
            }
            Err(e) => {
                let err = StoreError::from_backend(&item.tag, e);
                if err.is_not_found() {
                    debug!(tag = %item.tag, kind = %item.kind, %scope, "Item not found");
                } else {
                    warn!(tag = %item.tag, kind = %item.kind, %scope, status = ?err.status_code(), "Couldn't fetch item: {}", err);
                }
                Err(err)
            }
        }
    }

    fn try_delete_all_items(&self) -> DeleteAllReport {
        let mut report = DeleteAllReport::default();

        for class in ItemClass::ALL {
            for scope in [Scope::Private, Scope::Shared] {
                let Some(query) = self.builder.class_query(class, scope) else {
                    continue;
                };

                let result = self.backend.delete(&query);
                match &result {
                    Ok(()) => debug!(%class, %scope, "Deleted all items of class"),
                    Err(e) => warn!(%class, %scope, status = e.code(), "Couldn't delete items of class: {}", e),
                }
                report.outcomes.push(DeleteOutcome { class, scope, result });
            }
        }

        info!(
            deletes = report.outcomes.len(),
            failures = report.failures().count(),
            "Deleted all items"
        );
        report
    }
}
