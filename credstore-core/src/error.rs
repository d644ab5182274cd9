//! Error types for credstore.

use thiserror::Error;

use crate::backend::BackendError;

/// Reasons an item cannot be used to address a backend entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidItem {
    /// The item kind is `None`.
    #[error("item kind is unclassified")]
    UnclassifiedKind,

    /// The tag is empty.
    #[error("item tag is empty")]
    EmptyTag,

    /// A write operation was given an item without a payload.
    #[error("item carries no payload")]
    MissingPayload,
}

/// Error type for credential store operations.
///
/// Never carries payload bytes.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The item was rejected before reaching the backend.
    #[error("invalid item: {0}")]
    InvalidItem(#[from] InvalidItem),

    /// No backend entry matches the item.
    #[error("item not found: {tag}")]
    NotFound { tag: String },

    /// A shared item was addressed but no access group is configured.
    #[error("no shared access group configured for item: {tag}")]
    SharingUnavailable { tag: String },

    /// The backend reported any other status.
    #[error("backend error for item {tag} (status {code}): {source}")]
    Backend {
        tag: String,
        code: i32,
        #[source]
        source: BackendError,
    },
}

impl StoreError {
    /// Classify a backend error raised while operating on `tag`.
    pub(crate) fn from_backend(tag: &str, error: BackendError) -> Self {
        match error {
            BackendError::NotFound => Self::NotFound {
                tag: tag.to_string(),
            },
            other => Self::Backend {
                tag: tag.to_string(),
                code: other.code(),
                source: other,
            },
        }
    }

    /// Whether this is the expected not-found outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Numeric status for diagnostics, if the error came from the backend.
    pub fn status_code(&self) -> Option<i32> {
        match self {
            Self::NotFound { .. } => Some(BackendError::NotFound.code()),
            Self::Backend { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Top-level error type encompassing all credstore errors.
#[derive(Debug, Error)]
pub enum CredstoreError {
    /// Error from a store operation.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Error from a backend primitive.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Configuration error.
    #[error("configuration error: {0:#}")]
    Config(#[from] anyhow::Error),
}
