//! In-memory backend implementation.

use parking_lot::RwLock;

use super::{Backend, BackendError};
use crate::attributes::AttributeSet;
use crate::item::Payload;

/// In-memory backend for testing and development.
///
/// This backend is not persistent; data is lost when the process exits.
/// It follows the same primitive contract as a platform store: duplicate
/// detection on store, vacuous delete, distinguished not-found.
///
/// # Thread Safety
///
/// Entries are guarded by a `RwLock`, so each primitive is atomic with
/// respect to the others.
pub struct MemoryBackend {
    entries: RwLock<Vec<(AttributeSet, Payload)>>,
}

impl MemoryBackend {
    /// Create a new empty memory backend.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Number of stored entries across all classes and partitions.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Number of entries `query` addresses.
    pub fn count_matching(&self, query: &AttributeSet) -> usize {
        self.entries
            .read()
            .iter()
            .filter(|(attributes, _)| query.matches(attributes))
            .count()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("entries_count", &self.len())
            .finish()
    }
}

impl Backend for MemoryBackend {
    fn store(&self, attributes: &AttributeSet, payload: &Payload) -> Result<(), BackendError> {
        let mut entries = self.entries.write();
        if entries.iter().any(|(existing, _)| existing == attributes) {
            return Err(BackendError::Duplicate);
        }
        entries.push((attributes.clone(), payload.clone()));
        Ok(())
    }

    fn query(&self, query: &AttributeSet) -> Result<Payload, BackendError> {
        self.entries
            .read()
            .iter()
            .find(|(attributes, _)| query.matches(attributes))
            .map(|(_, payload)| payload.clone())
            .ok_or(BackendError::NotFound)
    }

    fn delete(&self, query: &AttributeSet) -> Result<(), BackendError> {
        self.entries
            .write()
            .retain(|(attributes, _)| !query.matches(attributes));
        Ok(())
    }

    fn update_payload(&self, query: &AttributeSet, payload: &Payload) -> Result<(), BackendError> {
        let mut entries = self.entries.write();
        let mut updated = false;
        for (attributes, existing) in entries.iter_mut() {
            if query.matches(attributes) {
                *existing = payload.clone();
                updated = true;
            }
        }
        if updated {
            Ok(())
        } else {
            Err(BackendError::NotFound)
        }
    }
}
