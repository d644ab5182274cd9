//! # credstore core
//!
//! A uniform API for adding, retrieving, updating and removing secrets (keys
//! and passwords) in a protected, persistent store, optionally shared with
//! cooperating applications through a named access group.
//!
//! This crate provides:
//! - The typed item model ([`CredentialItem`], [`ItemKind`], [`Payload`])
//! - Deterministic derivation of backend attribute sets per item kind
//! - The [`CredentialStore`] contract and its [`CredentialManager`] implementation
//! - In-memory and (optionally) keyring-based backends
//!
//! Encryption at rest and access control belong to the backend; this crate
//! is responsible for addressing and lifecycle semantics.
//!
//! ## Quick Start
//!
//! ```
//! use credstore_core::{CredentialItem, CredentialManager, CredentialStore, ItemKind, MemoryBackend};
//!
//! let store = CredentialManager::new(MemoryBackend::new(), Some("com.example.shared".into()));
//!
//! store.add_item(&CredentialItem::key("session-key", vec![7u8; 32]).shared());
//!
//! let lookup = CredentialItem::lookup(ItemKind::Key, "session-key", true);
//! assert_eq!(store.get_item(&lookup).map(|p| p.len()), Some(32));
//! ```

pub mod attributes;
pub mod backend;
pub mod config;
pub mod error;
pub mod item;
pub mod manager;
pub mod provider;

// Re-export commonly used types at crate root
pub use item::{
    CredentialItem,
    ItemKind,
    Payload,
};

pub use attributes::{
    Attribute,
    AttributeQueryBuilder,
    AttributeSet,
    AttributeValue,
    ItemClass,
    KeyType,
    Scope,
};

pub use backend::{
    Backend,
    BackendError,
    MemoryBackend,
    create_backend,
};

#[cfg(feature = "keyring-store")]
pub use backend::KeyringBackend;

pub use config::{
    BackendKind,
    SharingPolicy,
    StoreConfig,
    load_config,
    load_config_from_path,
};

pub use error::{
    CredstoreError,
    InvalidItem,
    StoreError,
};

pub use manager::CredentialManager;

pub use provider::{
    CredentialStore,
    DeleteAllReport,
    DeleteOutcome,
};
