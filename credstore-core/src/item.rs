//! Item model for the credential store.
//!
//! This module defines the value types a caller hands to a
//! [`CredentialStore`](crate::CredentialStore):
//! - [`ItemKind`] - Classification of a secret (key or password)
//! - [`Payload`] - The secret bytes, redacted in diagnostics and zeroed on drop
//! - [`CredentialItem`] - Kind, tag, optional payload and sharing flag
//!
//! Items own no resources and are never persisted directly. The backend owns
//! persisted state, keyed by the attribute set derived from the item.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::InvalidItem;

/// Classification of a stored secret.
///
/// `None` marks an unclassified item and is rejected before any backend call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Unclassified item. Never persisted.
    #[default]
    None,

    /// Symmetric key used for encrypt/decrypt.
    Key,

    /// Generic password.
    Password,
}

impl ItemKind {
    /// Get the kind as a string for diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Key => "key",
            Self::Password => "password",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The secret value of an item.
///
/// The inner bytes are only accessible via [`expose()`](Payload::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value,
/// and the buffer is zeroed when the payload is dropped.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Payload(Vec<u8>);

impl Payload {
    /// Create a new payload from raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Expose the secret bytes.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &[u8] {
        &self.0
    }

    /// Consume the payload and return the inner bytes.
    pub fn into_inner(mut self) -> Vec<u8> {
        std::mem::take(&mut self.0)
    }

    /// Number of bytes in the payload.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the payload holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload([REDACTED])")
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes())
    }
}

/// A single secret as seen by the caller.
///
/// Fields are public and not invariant-enforcing; the store validates items
/// at its boundary.
///
/// # Examples
///
/// ```
/// use credstore_core::{CredentialItem, ItemKind};
///
/// let login = CredentialItem::new(ItemKind::Password, "login", Some("s3cr3t".into()), false);
/// let lookup = CredentialItem::lookup(ItemKind::Password, "login", false);
/// assert!(login.is_address_equivalent(&lookup));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialItem {
    /// Classification of the item.
    pub kind: ItemKind,

    /// Identifier, unique within a (kind, scope) pair.
    pub tag: String,

    /// The secret value. Absent for items used purely as lookup keys.
    pub payload: Option<Payload>,

    /// Whether the item lives in the shared access group.
    pub is_shared: bool,
}

impl CredentialItem {
    /// Create a new item.
    pub fn new(
        kind: ItemKind,
        tag: impl Into<String>,
        payload: Option<Payload>,
        is_shared: bool,
    ) -> Self {
        Self {
            kind,
            tag: tag.into(),
            payload,
            is_shared,
        }
    }

    /// Create a private key item carrying `payload`.
    pub fn key(tag: impl Into<String>, payload: impl Into<Payload>) -> Self {
        Self::new(ItemKind::Key, tag, Some(payload.into()), false)
    }

    /// Create a private password item carrying `payload`.
    pub fn password(tag: impl Into<String>, payload: impl Into<Payload>) -> Self {
        Self::new(ItemKind::Password, tag, Some(payload.into()), false)
    }

    /// Create a payload-less item used to address an existing entry.
    pub fn lookup(kind: ItemKind, tag: impl Into<String>, is_shared: bool) -> Self {
        Self::new(kind, tag, None, is_shared)
    }

    /// Mark the item as belonging to the shared access group.
    pub fn shared(mut self) -> Self {
        self.is_shared = true;
        self
    }

    /// Check that the item can be used to address a backend entry.
    ///
    /// `require_payload` is set for operations that write a value.
    pub fn validate(&self, require_payload: bool) -> Result<(), InvalidItem> {
        if self.kind == ItemKind::None {
            return Err(InvalidItem::UnclassifiedKind);
        }
        if self.tag.is_empty() {
            return Err(InvalidItem::EmptyTag);
        }
        if require_payload && self.payload.is_none() {
            return Err(InvalidItem::MissingPayload);
        }
        Ok(())
    }

    /// Whether two items address the same backend entry.
    ///
    /// The resolved access-group name is a property of the store, so two
    /// shared items are only equivalent when looked up through stores
    /// configured with the same group.
    pub fn is_address_equivalent(&self, other: &Self) -> bool {
        self.kind == other.kind && self.tag == other.tag && self.is_shared == other.is_shared
    }
}
