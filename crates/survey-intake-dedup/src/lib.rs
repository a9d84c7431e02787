//! Processed-submission marker store for survey intake.
//!
//! A marker records that the side effects for one form submission have run
//! to completion. The store enforces uniqueness on `(form_id,
//! submission_id)`, and that uniqueness is the only coordination between
//! the webhook path and the scheduled reconciliation path: whichever writes
//! first wins, the other observes [`DedupError::AlreadyExists`].
//!
//! # Module Organization
//!
//! - [`marker`] - The [`ProcessedSubmissionMarker`] record
//! - [`error`] - [`DedupError`] surfaced to callers
//! - [`store`] - [`DedupStore`] trait, generic store, and backends

pub mod error;
pub mod marker;
pub mod store;

pub use error::DedupError;
pub use marker::ProcessedSubmissionMarker;
pub use store::generic::GenericDedupStore;
pub use store::memory::InMemoryDedupStore;
pub use store::{DedupStore, MarkerBackend, StorageError};
#[cfg(feature = "dynamodb")]
pub use store::dynamodb::DynamoDbBackend;
pub use store::memory::InMemoryBackend;
#[cfg(feature = "redis")]
pub use store::redis::RedisBackend;
