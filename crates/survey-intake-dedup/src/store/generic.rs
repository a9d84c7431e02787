//! Generic marker store delegating persistence to a [`MarkerBackend`].
//!
//! [`GenericDedupStore`] owns everything that is not raw storage: key
//! construction, canonical JSON encoding, mapping backend errors onto
//! [`DedupError`]. For [`list_recent`](DedupStore::list_recent) the backend
//! applies ordering and limit; this layer decodes and drops unreadable
//! records.

use async_trait::async_trait;

use crate::error::DedupError;
use crate::marker::ProcessedSubmissionMarker;
use crate::store::backend::{make_key, make_prefix, MarkerBackend, StorageError};
use crate::store::DedupStore;

/// Marker store over any [`MarkerBackend`].
///
/// # Examples
///
/// ```
/// use survey_intake_dedup::store::memory::InMemoryBackend;
/// use survey_intake_dedup::{DedupStore, GenericDedupStore, ProcessedSubmissionMarker};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let store = GenericDedupStore::new(InMemoryBackend::new());
/// store.save(&ProcessedSubmissionMarker::new("f", "s")).await.unwrap();
/// assert!(store.get("f", "s").await.unwrap().is_some());
/// # });
/// ```
#[derive(Debug)]
pub struct GenericDedupStore<B: MarkerBackend> {
    backend: B,
}

impl<B: MarkerBackend> GenericDedupStore<B> {
    /// Creates a store backed by `backend`.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn serialize_marker(marker: &ProcessedSubmissionMarker) -> Result<Vec<u8>, DedupError> {
        serde_json::to_vec(marker)
            .map_err(|e| DedupError::Serialization(format!("failed to serialize marker: {e}")))
    }

    fn deserialize_marker(data: &[u8]) -> Result<ProcessedSubmissionMarker, DedupError> {
        serde_json::from_slice(data)
            .map_err(|e| DedupError::Serialization(format!("failed to deserialize marker: {e}")))
    }

    fn map_storage_error(err: StorageError, form_id: &str, submission_id: &str) -> DedupError {
        match err {
            StorageError::AlreadyExists { .. } => DedupError::AlreadyExists {
                form_id: form_id.to_string(),
                submission_id: submission_id.to_string(),
            },
            other => DedupError::Storage(other),
        }
    }
}

#[async_trait]
impl<B: MarkerBackend + 'static> DedupStore for GenericDedupStore<B> {
    async fn get(
        &self,
        form_id: &str,
        submission_id: &str,
    ) -> Result<Option<ProcessedSubmissionMarker>, DedupError> {
        let key = make_key(form_id, submission_id);
        let stored = self
            .backend
            .get(&key)
            .await
            .map_err(|e| Self::map_storage_error(e, form_id, submission_id))?;

        stored.as_deref().map(Self::deserialize_marker).transpose()
    }

    async fn save(&self, marker: &ProcessedSubmissionMarker) -> Result<(), DedupError> {
        let key = make_key(&marker.form_id, &marker.submission_id);
        let bytes = Self::serialize_marker(marker)?;
        self.backend
            .insert_if_absent(&key, &bytes)
            .await
            .map_err(|e| Self::map_storage_error(e, &marker.form_id, &marker.submission_id))?;

        tracing::debug!(
            form_id = %marker.form_id,
            submission_id = %marker.submission_id,
            "processed-submission marker written"
        );
        Ok(())
    }

    async fn list_recent(
        &self,
        form_id: &str,
        limit: usize,
    ) -> Result<Vec<ProcessedSubmissionMarker>, DedupError> {
        let entries = self
            .backend
            .list_recent(&make_prefix(form_id), limit)
            .await
            .map_err(|e| Self::map_storage_error(e, form_id, ""))?;

        let mut markers = Vec::with_capacity(entries.len());
        for (key, data) in entries {
            match Self::deserialize_marker(&data) {
                Ok(marker) => markers.push(marker),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "skipping unreadable marker");
                },
            }
        }
        Ok(markers)
    }
}
