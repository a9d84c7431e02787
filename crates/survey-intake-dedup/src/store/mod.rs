//! Marker store trait, generic implementation, and backends.
//!
//! # Architecture
//!
//! 1. **[`DedupStore`]** -- object-safe interface used as
//!    `Arc<dyn DedupStore>` by the submission processor.
//! 2. **[`GenericDedupStore<B>`](generic::GenericDedupStore)** -- key
//!    construction, canonical JSON serialization and error mapping. Has a
//!    blanket `DedupStore` impl.
//! 3. **[`MarkerBackend`]** -- dumb KV trait the backends implement.
//!
//! # Backends
//!
//! - [`InMemoryBackend`](memory::InMemoryBackend) -- `DashMap`-based, always
//!   available.
//! - `RedisBackend` -- behind the `redis` feature.
//! - `DynamoDbBackend` -- behind the `dynamodb` feature.

pub mod backend;
#[cfg(feature = "dynamodb")]
pub mod dynamodb;
pub mod generic;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

use async_trait::async_trait;

pub use backend::{MarkerBackend, StorageError};

use crate::error::DedupError;
use crate::marker::ProcessedSubmissionMarker;

/// Persistence for processed-submission markers.
///
/// # Atomicity
///
/// [`save`](DedupStore::save) must be an insert-if-absent: across any
/// number of concurrent callers, at most one save per `(form_id,
/// submission_id)` succeeds.
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Looks up the marker for a submission. Absence is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// - [`DedupError::Storage`] on backend failures.
    /// - [`DedupError::Serialization`] if the stored marker is corrupt.
    async fn get(
        &self,
        form_id: &str,
        submission_id: &str,
    ) -> Result<Option<ProcessedSubmissionMarker>, DedupError>;

    /// Writes a marker.
    ///
    /// # Errors
    ///
    /// - [`DedupError::AlreadyExists`] if a marker for the pair exists.
    /// - [`DedupError::Storage`] on other backend failures.
    async fn save(&self, marker: &ProcessedSubmissionMarker) -> Result<(), DedupError>;

    /// Returns up to `limit` markers for a form, newest first.
    ///
    /// # Errors
    ///
    /// - [`DedupError::Storage`] on backend failures.
    async fn list_recent(
        &self,
        form_id: &str,
        limit: usize,
    ) -> Result<Vec<ProcessedSubmissionMarker>, DedupError>;
}
