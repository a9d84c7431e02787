//! In-memory marker backend and store.
//!
//! [`InMemoryBackend`] is a thread-safe [`MarkerBackend`] over
//! `DashMap<String, Vec<u8>>`. Uniqueness uses the map's entry API, which
//! holds the shard lock across the check and the insert.
//!
//! [`InMemoryDedupStore`] is the
//! [`GenericDedupStore<InMemoryBackend>`](crate::store::generic::GenericDedupStore)
//! alias used by tests and single-process deployments.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::store::backend::{created_time_ms, MarkerBackend, StorageError};
use crate::store::generic::GenericDedupStore;

/// Thread-safe in-memory backend.
///
/// # Examples
///
/// ```
/// use survey_intake_dedup::store::memory::InMemoryBackend;
///
/// let backend = InMemoryBackend::new();
/// assert!(backend.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: DashMap<String, Vec<u8>>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// Returns the number of stored markers.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[async_trait]
impl MarkerBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.data.get(key).map(|entry| entry.value().clone()))
    }

    async fn insert_if_absent(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        match self.data.entry(key.to_string()) {
            Entry::Occupied(_) => Err(StorageError::AlreadyExists {
                key: key.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(data.to_vec());
                Ok(())
            },
        }
    }

    async fn list_recent(
        &self,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
        let mut entries: Vec<(Option<i64>, String, Vec<u8>)> = self
            .data
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| {
                (
                    created_time_ms(entry.value()),
                    entry.key().clone(),
                    entry.value().clone(),
                )
            })
            .collect();
        // `None` < `Some`, so unreadable records land at the tail.
        entries.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
        entries.truncate(limit);
        Ok(entries.into_iter().map(|(_, key, data)| (key, data)).collect())
    }
}

/// Marker store kept entirely in process memory.
pub type InMemoryDedupStore = GenericDedupStore<InMemoryBackend>;

impl InMemoryDedupStore {
    /// Creates an empty in-memory store.
    pub fn in_memory() -> Self {
        GenericDedupStore::new(InMemoryBackend::new())
    }
}

impl Default for InMemoryDedupStore {
    fn default() -> Self {
        Self::in_memory()
    }
}
