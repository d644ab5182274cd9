//! Backend protocol for secure storage engines.
//!
//! This module provides:
//! - [`Backend`] - The four primitives the store is built on
//! - [`BackendError`] - Classification of non-success statuses
//! - [`MemoryBackend`] - In-memory implementation for testing
//! - [`KeyringBackend`] - OS keyring implementation (with `keyring-store` feature)
//! - [`create_backend`] - Helper to select a backend based on availability
//!
//! # Addressing
//!
//! Entries are keyed by an [`AttributeSet`]. Backends partition entries by
//! access group and match every other attribute by subset; see
//! [`AttributeSet::matches`].

use thiserror::Error;

use crate::attributes::AttributeSet;
use crate::config::BackendKind;
use crate::item::Payload;

mod memory;
#[cfg(feature = "keyring-store")]
mod keyring;

pub use self::memory::MemoryBackend;
#[cfg(feature = "keyring-store")]
pub use self::keyring::KeyringBackend;

/// Status code for a query that matched nothing.
pub const STATUS_NOT_FOUND: i32 = -25300;

/// Status code for a store that collided with an existing entry.
pub const STATUS_DUPLICATE: i32 = -25299;

/// Status code for an operation the backend cannot perform.
pub const STATUS_UNSUPPORTED: i32 = -4;

/// Status code for a backend that refused access to its storage.
pub const STATUS_NO_ACCESS: i32 = -25308;

/// Status code for an unclassified platform failure.
pub const STATUS_PLATFORM_FAILURE: i32 = -1;

/// Non-success outcome of a backend primitive.
///
/// Together with `Ok` this forms the tri-state status the store classifies:
/// success, not-found, or any other failure with a numeric code.
#[derive(Debug, Error)]
pub enum BackendError {
    /// No entry matches the query.
    #[error("no matching entry")]
    NotFound,

    /// An entry with the same attributes already exists.
    #[error("duplicate entry")]
    Duplicate,

    /// The backend cannot perform the requested operation.
    #[error("operation not supported: {operation}")]
    Unsupported { operation: String },

    /// Any other platform failure.
    #[error("platform failure (status {code}): {message}")]
    Platform { code: i32, message: String },
}

impl BackendError {
    /// Numeric status for diagnostics.
    pub fn code(&self) -> i32 {
        match self {
            Self::NotFound => STATUS_NOT_FOUND,
            Self::Duplicate => STATUS_DUPLICATE,
            Self::Unsupported { .. } => STATUS_UNSUPPORTED,
            Self::Platform { code, .. } => *code,
        }
    }

    /// Unclassified platform failure.
    pub fn platform(message: impl Into<String>) -> Self {
        Self::Platform {
            code: STATUS_PLATFORM_FAILURE,
            message: message.into(),
        }
    }
}

/// Primitive operations of a secure storage engine.
///
/// Calls are synchronous and may block on I/O. Implementations must be safe
/// to share across threads and serialize conflicting operations on the same
/// entry.
pub trait Backend: Send + Sync {
    /// Store `payload` under `attributes`.
    ///
    /// Fails with [`BackendError::Duplicate`] if an entry with the same
    /// attributes already exists.
    fn store(&self, attributes: &AttributeSet, payload: &Payload) -> Result<(), BackendError>;

    /// Fetch the payload of the first entry matching `query`.
    fn query(&self, query: &AttributeSet) -> Result<Payload, BackendError>;

    /// Delete every entry matching `query`.
    ///
    /// Succeeds even if nothing matched.
    fn delete(&self, query: &AttributeSet) -> Result<(), BackendError>;

    /// Replace the payload of every entry matching `query`.
    fn update_payload(&self, query: &AttributeSet, payload: &Payload) -> Result<(), BackendError>;
}

impl<B: Backend + ?Sized> Backend for std::sync::Arc<B> {
    fn store(&self, attributes: &AttributeSet, payload: &Payload) -> Result<(), BackendError> {
        (**self).store(attributes, payload)
    }

    fn query(&self, query: &AttributeSet) -> Result<Payload, BackendError> {
        (**self).query(query)
    }

    fn delete(&self, query: &AttributeSet) -> Result<(), BackendError> {
        (**self).delete(query)
    }

    fn update_payload(&self, query: &AttributeSet, payload: &Payload) -> Result<(), BackendError> {
        (**self).update_payload(query, payload)
    }
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn store(&self, attributes: &AttributeSet, payload: &Payload) -> Result<(), BackendError> {
        (**self).store(attributes, payload)
    }

    fn query(&self, query: &AttributeSet) -> Result<Payload, BackendError> {
        (**self).query(query)
    }

    fn delete(&self, query: &AttributeSet) -> Result<(), BackendError> {
        (**self).delete(query)
    }

    fn update_payload(&self, query: &AttributeSet, payload: &Payload) -> Result<(), BackendError> {
        (**self).update_payload(query, payload)
    }
}

/// Create a backend with automatic fallback.
///
/// - [`BackendKind::Keyring`] with the `keyring-store` feature enabled:
///   attempts a [`KeyringBackend`] under `keyring_service`, falling back to
///   [`MemoryBackend`] with a warning if the keyring is unavailable
/// - Otherwise: returns [`MemoryBackend`]
pub fn create_backend(kind: BackendKind, keyring_service: &str) -> Box<dyn Backend> {
    #[cfg(feature = "keyring-store")]
    if kind == BackendKind::Keyring {
        match KeyringBackend::try_new(keyring_service) {
            Ok(backend) => {
                tracing::info!("Using OS keyring for credential storage");
                return Box::new(backend);
            }
            Err(e) => {
                tracing::warn!(
                    "Keyring unavailable ({}), falling back to memory backend. \
                     Credentials will not persist across restarts.",
                    e
                );
            }
        }
    }

    #[cfg(not(feature = "keyring-store"))]
    if kind == BackendKind::Keyring {
        tracing::warn!(
            service = keyring_service,
            "Keyring backend requested but keyring-store feature not enabled. \
             Using memory backend. Credentials will not persist across restarts."
        );
    }

    tracing::debug!("Using in-memory credential storage");
    Box::new(MemoryBackend::new())
}
