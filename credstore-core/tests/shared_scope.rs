//! Integration tests for access-group scoping.
//!
//! Several managers share one backend here, standing in for cooperating
//! applications that see the same platform store.

use std::sync::Arc;
use std::thread;

use credstore_core::{
    AttributeQueryBuilder, CredentialItem, CredentialManager, CredentialStore, ItemKind,
    MemoryBackend, SharingPolicy, StoreError,
};

fn manager(
    backend: &Arc<MemoryBackend>,
    group: Option<&str>,
) -> CredentialManager<Arc<MemoryBackend>> {
    CredentialManager::new(Arc::clone(backend), group.map(String::from))
}

#[test]
fn test_shared_item_visible_to_same_group() {
    let backend = Arc::new(MemoryBackend::new());
    let writer = manager(&backend, Some("G"));
    let reader = manager(&backend, Some("G"));

    assert!(writer.add_item(&CredentialItem::password("token", "abc").shared()));
    assert_eq!(
        reader
            .get_item(&CredentialItem::lookup(ItemKind::Password, "token", true))
            .unwrap()
            .expose(),
        b"abc"
    );
}

#[test]
fn test_shared_item_hidden_from_other_groups() {
    let backend = Arc::new(MemoryBackend::new());
    let writer = manager(&backend, Some("G"));
    writer.add_item(&CredentialItem::key("k", "v").shared());

    let other_group = manager(&backend, Some("H"));
    let no_group = manager(&backend, None);
    let query = CredentialItem::lookup(ItemKind::Key, "k", true);

    assert!(other_group.get_item(&query).is_none());
    assert!(no_group.get_item(&query).is_none());
}

#[test]
fn test_shared_and_private_items_are_distinct() {
    let backend = Arc::new(MemoryBackend::new());
    let store = manager(&backend, Some("G"));

    store.add_item(&CredentialItem::password("login", "private"));
    store.add_item(&CredentialItem::password("login", "shared").shared());

    assert_eq!(backend.len(), 2);
    assert_eq!(
        store
            .get_item(&CredentialItem::lookup(ItemKind::Password, "login", false))
            .unwrap()
            .expose(),
        b"private"
    );
    assert_eq!(
        store
            .get_item(&CredentialItem::lookup(ItemKind::Password, "login", true))
            .unwrap()
            .expose(),
        b"shared"
    );
}

#[test]
fn test_shared_without_group_falls_back_to_private() {
    let backend = Arc::new(MemoryBackend::new());
    let store = manager(&backend, None);

    assert!(store.add_item(&CredentialItem::password("login", "pw").shared()));
    assert_eq!(
        store
            .get_item(&CredentialItem::lookup(ItemKind::Password, "login", false))
            .unwrap()
            .expose(),
        b"pw"
    );
}

#[test]
fn test_shared_without_group_rejected_under_strict_policy() {
    let backend = Arc::new(MemoryBackend::new());
    let builder = AttributeQueryBuilder::new(None).with_sharing_policy(SharingPolicy::Reject);
    let store = CredentialManager::with_builder(Arc::clone(&backend), builder);

    let result = store.try_add_item(&CredentialItem::password("login", "pw").shared());
    assert!(matches!(result, Err(StoreError::SharingUnavailable { .. })));
    assert!(backend.is_empty());
}

#[test]
fn test_delete_all_wipes_both_scopes() {
    let backend = Arc::new(MemoryBackend::new());
    let store = manager(&backend, Some("G"));

    store.add_item(&CredentialItem::key("k", "private"));
    store.add_item(&CredentialItem::key("k", "shared").shared());
    store.add_item(&CredentialItem::password("p", "private"));
    store.add_item(&CredentialItem::password("p", "shared").shared());
    assert_eq!(backend.len(), 4);

    assert!(store.delete_all_items());

    for kind in [ItemKind::Key, ItemKind::Password] {
        for shared in [false, true] {
            let tag = if kind == ItemKind::Key { "k" } else { "p" };
            assert!(store.get_item(&CredentialItem::lookup(kind, tag, shared)).is_none());
        }
    }
    assert!(backend.is_empty());
}

#[test]
fn test_delete_all_leaves_other_groups() {
    let backend = Arc::new(MemoryBackend::new());
    manager(&backend, Some("H")).add_item(&CredentialItem::key("k", "v").shared());

    let store = manager(&backend, Some("G"));
    assert!(store.delete_all_items());
    assert_eq!(backend.len(), 1);
}

#[test]
fn test_concurrent_adds_leave_one_winner() {
    let backend = Arc::new(MemoryBackend::new());
    let store = Arc::new(manager(&backend, Some("G")));

    let handles: Vec<_> = (0..8u8)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..50 {
                    store.add_item(&CredentialItem::key("race", vec![i; 4]).shared());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // Last write wins in an undefined order, but the address holds exactly
    // one well-formed payload.
    let query = CredentialItem::lookup(ItemKind::Key, "race", true);
    let payload = store.get_item(&query).unwrap();
    let first = payload.expose()[0];
    assert!(first < 8);
    assert_eq!(payload.expose(), &[first; 4][..]);
    assert_eq!(backend.len(), 1);
}
