//! OS keyring-backed storage implementation.

use keyring::Entry;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Backend, BackendError, STATUS_NO_ACCESS};
use crate::attributes::{Attribute, AttributeSet, ItemClass};
use crate::item::Payload;

/// Status code for attribute values the keyring cannot represent.
const STATUS_INVALID_PARAMETER: i32 = -50;

/// User name of the per-partition index entry.
const INDEX_USER: &str = "credstore-index";

/// OS keyring-backed backend.
///
/// This backend uses the platform's native keyring service:
/// - macOS: Keychain
/// - Linux: Secret Service API (via libsecret)
/// - Windows: Credential Manager
///
/// # Entry Mapping
///
/// The keyring addresses entries by (service, user). Attribute sets are
/// mapped as follows, where `partition` is `private` for the private scope
/// and `group:{name}` for a shared access group (with `%` and `/` in the
/// name percent-encoded):
/// - Passwords: service `{namespace}/{partition}/password/{service attribute}`,
///   user `{account attribute}`
/// - Keys: service `{namespace}/{partition}/key`, user `{application tag}`
///
/// # Index
///
/// The keyring cannot enumerate entries, so every entry written through this
/// backend is also recorded in a per-partition index entry at service
/// `{namespace}/{partition}#index`. Class-only queries walk that index.
/// Classes this backend never writes hold no entries here: deleting them
/// succeeds vacuously and querying them reports not found.
///
/// Index updates are serialized within a process only. Entries written by
/// another process between our read and write of the index can drop out of
/// it, and a class-wide delete then leaves them behind.
pub struct KeyringBackend {
    namespace: String,
    index_lock: Mutex<()>,
}

/// One keyring entry as recorded in a partition index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct IndexedEntry {
    class: String,
    service: String,
    user: String,
}

impl IndexedEntry {
    fn open(&self) -> Result<Entry, BackendError> {
        Entry::new(&self.service, &self.user).map_err(map_keyring_error)
    }

    fn is_class(&self, class: ItemClass) -> bool {
        self.class == class.as_str()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PartitionIndex {
    #[serde(default)]
    entries: Vec<IndexedEntry>,
}

/// What an attribute set resolves to in the keyring.
#[derive(Debug, PartialEq, Eq)]
enum Target {
    /// A single addressable entry.
    Entry(IndexedEntry),

    /// Every indexed entry of a class.
    Class(ItemClass),

    /// A class this backend never writes.
    Foreign(ItemClass),
}

impl KeyringBackend {
    /// Try to create a new keyring backend.
    ///
    /// Returns an error if the keyring backend is not available on this platform.
    pub fn try_new(namespace: &str) -> Result<Self, BackendError> {
        let check = format!("{}/__availability__", namespace);
        match Entry::new(&check, "availability_check") {
            Ok(_) => Ok(Self::with_namespace(namespace)),
            Err(e) => Err(BackendError::Platform {
                code: STATUS_NO_ACCESS,
                message: format!("keyring backend not available: {}", e),
            }),
        }
    }

    fn with_namespace(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            index_lock: Mutex::new(()),
        }
    }

    /// Resolve the partition and target an attribute set addresses.
    ///
    /// Pure: no keyring calls are made.
    fn locate(
        &self,
        attributes: &AttributeSet,
        operation: &str,
    ) -> Result<(String, Target), BackendError> {
        let partition = partition_for(attributes);
        let class = attributes.class().ok_or_else(|| BackendError::Unsupported {
            operation: format!("{} without class", operation),
        })?;

        if !matches!(class, ItemClass::GenericPassword | ItemClass::Key) {
            return Ok((partition, Target::Foreign(class)));
        }

        let class_only = attributes
            .iter()
            .all(|(attribute, _)| matches!(attribute, Attribute::Class | Attribute::AccessGroup));
        if class_only {
            return Ok((partition, Target::Class(class)));
        }

        let (service, user) = match class {
            ItemClass::GenericPassword => (
                format!(
                    "{}/{}/password/{}",
                    self.namespace,
                    partition,
                    utf8_attribute(attributes, Attribute::Service, operation)?
                ),
                utf8_attribute(attributes, Attribute::Account, operation)?,
            ),
            _ => (
                format!("{}/{}/key", self.namespace, partition),
                utf8_attribute(attributes, Attribute::ApplicationTag, operation)?,
            ),
        };

        let entry = IndexedEntry {
            class: class.as_str().to_string(),
            service,
            user,
        };
        Ok((partition, Target::Entry(entry)))
    }

    fn index_entry(&self, partition: &str) -> Result<Entry, BackendError> {
        Entry::new(&format!("{}/{}#index", self.namespace, partition), INDEX_USER)
            .map_err(map_keyring_error)
    }

    fn load_index(&self, partition: &str) -> Result<PartitionIndex, BackendError> {
        match self.index_entry(partition)?.get_password() {
            Ok(text) => toml::from_str(&text)
                .map_err(|e| BackendError::platform(format!("corrupt keyring index: {}", e))),
            Err(keyring::Error::NoEntry) => Ok(PartitionIndex::default()),
            Err(e) => Err(map_keyring_error(e)),
        }
    }

    fn save_index(&self, partition: &str, index: &PartitionIndex) -> Result<(), BackendError> {
        let entry = self.index_entry(partition)?;
        if index.entries.is_empty() {
            return match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(e) => Err(map_keyring_error(e)),
            };
        }

        let text = toml::to_string(index)
            .map_err(|e| BackendError::platform(format!("failed to encode keyring index: {}", e)))?;
        entry.set_password(&text).map_err(map_keyring_error)
    }

    fn record(&self, partition: &str, entry: &IndexedEntry) -> Result<(), BackendError> {
        let _guard = self.index_lock.lock();
        let mut index = self.load_index(partition)?;
        if index.entries.contains(entry) {
            return Ok(());
        }
        index.entries.push(entry.clone());
        self.save_index(partition, &index)
    }

    fn forget(&self, partition: &str, entry: &IndexedEntry) -> Result<(), BackendError> {
        let _guard = self.index_lock.lock();
        let mut index = self.load_index(partition)?;
        let before = index.entries.len();
        index.entries.retain(|e| e != entry);
        if index.entries.len() == before {
            return Ok(());
        }
        self.save_index(partition, &index)
    }

    fn delete_class(&self, partition: &str, class: ItemClass) -> Result<(), BackendError> {
        let _guard = self.index_lock.lock();
        let mut index = self.load_index(partition)?;
        let mut first_error = None;

        index.entries.retain(|entry| {
            if !entry.is_class(class) {
                return true;
            }
            match entry.open().and_then(|e| delete_entry(&e)) {
                Ok(()) => false,
                Err(e) => {
                    warn!(service = %entry.service, error = %e, "Failed to delete indexed entry");
                    first_error.get_or_insert(e);
                    true
                }
            }
        });

        self.save_index(partition, &index)?;
        debug!(partition, class = %class, "Deleted indexed keyring entries");
        first_error.map_or(Ok(()), Err)
    }
}

/// Partition segment for an attribute set.
///
/// Group names are percent-encoded so they cannot contain the path separator
/// and no group can produce the private segment.
fn partition_for(attributes: &AttributeSet) -> String {
    match attributes.access_group() {
        None => "private".to_string(),
        Some(group) => format!("group:{}", group.replace('%', "%25").replace('/', "%2F")),
    }
}

fn delete_entry(entry: &Entry) -> Result<(), BackendError> {
    match entry.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(map_keyring_error(e)),
    }
}

/// Extract a data attribute as UTF-8, as the keyring only accepts strings.
fn utf8_attribute(
    attributes: &AttributeSet,
    attribute: Attribute,
    operation: &str,
) -> Result<String, BackendError> {
    let bytes = attributes
        .get(attribute)
        .and_then(|v| v.as_data())
        .ok_or_else(|| BackendError::Unsupported {
            operation: format!("{} without {:?} attribute", operation, attribute),
        })?;

    String::from_utf8(bytes.to_vec()).map_err(|_| BackendError::Platform {
        code: STATUS_INVALID_PARAMETER,
        message: format!("{:?} attribute is not valid UTF-8", attribute),
    })
}

fn map_keyring_error(error: keyring::Error) -> BackendError {
    match error {
        keyring::Error::NoEntry => BackendError::NotFound,
        keyring::Error::NoStorageAccess(e) => BackendError::Platform {
            code: STATUS_NO_ACCESS,
            message: format!("keyring storage not accessible: {}", e),
        },
        keyring::Error::Ambiguous(_) => BackendError::platform("ambiguous keyring entry"),
        keyring::Error::PlatformFailure(e) => {
            BackendError::platform(format!("platform keyring failure: {}", e))
        }
        e => BackendError::platform(format!("keyring error: {}", e)),
    }
}

impl std::fmt::Debug for KeyringBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyringBackend")
            .field("namespace", &self.namespace)
            .finish()
    }
}

impl Backend for KeyringBackend {
    fn store(&self, attributes: &AttributeSet, payload: &Payload) -> Result<(), BackendError> {
        let (partition, Target::Entry(indexed)) = self.locate(attributes, "store")? else {
            return Err(BackendError::Unsupported {
                operation: "store without a complete address".to_string(),
            });
        };
        let entry = indexed.open()?;

        match entry.get_secret() {
            Ok(_) => return Err(BackendError::Duplicate),
            Err(keyring::Error::NoEntry) => {
                entry.set_secret(payload.expose()).map_err(map_keyring_error)?
            }
            Err(e) => return Err(map_keyring_error(e)),
        }

        self.record(&partition, &indexed)
    }

    fn query(&self, query: &AttributeSet) -> Result<Payload, BackendError> {
        match self.locate(query, "query")? {
            (_, Target::Entry(indexed)) => indexed
                .open()?
                .get_secret()
                .map(Payload::new)
                .map_err(map_keyring_error),
            (partition, Target::Class(class)) => {
                let index = self.load_index(&partition)?;
                for indexed in index.entries.iter().filter(|e| e.is_class(class)) {
                    match indexed.open()?.get_secret() {
                        Ok(secret) => return Ok(Payload::new(secret)),
                        Err(keyring::Error::NoEntry) => continue,
                        Err(e) => return Err(map_keyring_error(e)),
                    }
                }
                Err(BackendError::NotFound)
            }
            (_, Target::Foreign(_)) => Err(BackendError::NotFound),
        }
    }

    fn delete(&self, query: &AttributeSet) -> Result<(), BackendError> {
        match self.locate(query, "delete")? {
            (partition, Target::Entry(indexed)) => {
                delete_entry(&indexed.open()?)?;
                self.forget(&partition, &indexed)
            }
            (partition, Target::Class(class)) => self.delete_class(&partition, class),
            (_, Target::Foreign(_)) => Ok(()),
        }
    }

    fn update_payload(&self, query: &AttributeSet, payload: &Payload) -> Result<(), BackendError> {
        match self.locate(query, "update")? {
            (_, Target::Entry(indexed)) => {
                let entry = indexed.open()?;
                entry.get_secret().map_err(map_keyring_error)?;
                entry.set_secret(payload.expose()).map_err(map_keyring_error)
            }
            (partition, Target::Class(class)) => {
                let index = self.load_index(&partition)?;
                let mut updated = false;
                for indexed in index.entries.iter().filter(|e| e.is_class(class)) {
                    let entry = indexed.open()?;
                    match entry.get_secret() {
                        Ok(_) => {
                            entry.set_secret(payload.expose()).map_err(map_keyring_error)?;
                            updated = true;
                        }
                        Err(keyring::Error::NoEntry) => continue,
                        Err(e) => return Err(map_keyring_error(e)),
                    }
                }
                if updated { Ok(()) } else { Err(BackendError::NotFound) }
            }
            (_, Target::Foreign(_)) => Err(BackendError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeValue;
    use crate::{CredentialItem, CredentialManager, CredentialStore, ItemKind};

    // These tests tolerate headless systems where the keyring accepts writes
    // but does not persist them.

    fn unique_tag() -> String {
        format!(
            "test-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        )
    }

    fn password_attrs(tag: &str) -> AttributeSet {
        AttributeSet::for_class(ItemClass::GenericPassword)
            .with(Attribute::Generic, AttributeValue::utf8(tag))
            .with(Attribute::Service, AttributeValue::utf8(&format!("{}PasswordService", tag)))
            .with(Attribute::Account, AttributeValue::utf8(&format!("{}PasswordAccount", tag)))
    }

    fn located_entry(backend: &KeyringBackend, attrs: &AttributeSet) -> IndexedEntry {
        match backend.locate(attrs, "test").unwrap() {
            (_, Target::Entry(entry)) => entry,
            (_, other) => panic!("expected a single entry, got {:?}", other),
        }
    }

    #[test]
    fn test_keyring_backend_creation() {
        match KeyringBackend::try_new("credstore-test") {
            Ok(backend) => assert_eq!(backend.namespace, "credstore-test"),
            Err(BackendError::Platform { code, .. }) => assert_eq!(code, STATUS_NO_ACCESS),
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    #[test]
    fn test_entry_mapping() {
        let backend = KeyringBackend::with_namespace("ns");

        let password = located_entry(&backend, &password_attrs("login"));
        assert_eq!(password.service, "ns/private/password/loginPasswordService");
        assert_eq!(password.user, "loginPasswordAccount");

        let key_attrs = AttributeSet::for_class(ItemClass::Key)
            .with(Attribute::ApplicationTag, AttributeValue::utf8("master"))
            .with_access_group("G");
        let key = located_entry(&backend, &key_attrs);
        assert_eq!(key.service, "ns/group:G/key");
        assert_eq!(key.user, "master");
    }

    #[test]
    fn test_group_named_private_does_not_collide() {
        let backend = KeyringBackend::with_namespace("ns");
        let attrs = password_attrs("login");

        let private = located_entry(&backend, &attrs);
        let shared = located_entry(&backend, &attrs.clone().with_access_group("private"));
        assert_ne!(private.service, shared.service);
        assert_eq!(shared.service, "ns/group:private/password/loginPasswordService");

        // A separator in a group name cannot reach into another partition.
        let slashed = located_entry(&backend, &attrs.clone().with_access_group("a/password"));
        assert_eq!(slashed.service, "ns/group:a%2Fpassword/password/loginPasswordService");
    }

    #[test]
    fn test_class_only_queries_target_the_index() {
        let backend = KeyringBackend::with_namespace("ns");

        let (partition, target) = backend
            .locate(&AttributeSet::for_class(ItemClass::Key), "delete")
            .unwrap();
        assert_eq!(partition, "private");
        assert_eq!(target, Target::Class(ItemClass::Key));

        let shared = AttributeSet::for_class(ItemClass::GenericPassword).with_access_group("G");
        let (partition, target) = backend.locate(&shared, "delete").unwrap();
        assert_eq!(partition, "group:G");
        assert_eq!(target, Target::Class(ItemClass::GenericPassword));

        assert!(matches!(
            backend.locate(&AttributeSet::new(), "delete"),
            Err(BackendError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_unwritten_classes_delete_vacuously() {
        let backend = KeyringBackend::with_namespace("credstore-test-foreign");

        for class in [
            ItemClass::InternetPassword,
            ItemClass::Certificate,
            ItemClass::Identity,
        ] {
            assert!(backend.delete(&AttributeSet::for_class(class)).is_ok());
            assert!(matches!(
                backend.query(&AttributeSet::for_class(class)),
                Err(BackendError::NotFound)
            ));
        }
    }

    #[test]
    fn test_keyring_backend_operations() {
        let Ok(backend) = KeyringBackend::try_new("credstore-test-ops") else {
            eprintln!("Skipping test_keyring_backend_operations: keyring unavailable");
            return;
        };
        let attrs = password_attrs(&unique_tag());

        if let Err(e) = backend.store(&attrs, &Payload::from("test-value")) {
            eprintln!("Keyring store failed ({}), skipping test", e);
            return;
        }

        match backend.query(&attrs) {
            Ok(payload) => {
                assert_eq!(payload.expose(), b"test-value");
                assert!(matches!(
                    backend.store(&attrs, &Payload::from("again")),
                    Err(BackendError::Duplicate)
                ));

                backend.update_payload(&attrs, &Payload::from("updated")).unwrap();
                assert_eq!(backend.query(&attrs).unwrap().expose(), b"updated");

                backend.delete(&attrs).unwrap();
                assert!(matches!(backend.query(&attrs), Err(BackendError::NotFound)));
            }
            Err(e) => {
                eprintln!("Keyring query failed ({}); keyring daemon may not be running", e);
                let _ = backend.delete(&attrs);
            }
        }

        // Idempotent delete
        assert!(backend.delete(&attrs).is_ok());
    }

    #[test]
    fn test_keyring_delete_all_clears_both_scopes() {
        let Ok(backend) = KeyringBackend::try_new("credstore-test-wipe") else {
            eprintln!("Skipping test_keyring_delete_all_clears_both_scopes: keyring unavailable");
            return;
        };
        let store = CredentialManager::new(backend, Some("G".to_string()));
        let tag = unique_tag();

        let private = CredentialItem::password(tag.as_str(), "private");
        let shared = CredentialItem::password(tag.as_str(), "shared").shared();
        if store.try_add_item(&private).is_err() || store.try_add_item(&shared).is_err() {
            eprintln!("Keyring store failed, skipping test");
            return;
        }

        let report = store.try_delete_all_items();
        assert!(report.all_succeeded(), "failures: {:?}", report.failures().collect::<Vec<_>>());

        for shared in [false, true] {
            let query = CredentialItem::lookup(ItemKind::Password, tag.as_str(), shared);
            assert!(store.get_item(&query).is_none());
        }
    }
}
