//! Low-level key-value backend trait for marker persistence.
//!
//! The [`MarkerBackend`] trait exposes three operations:
//! [`get`](MarkerBackend::get), [`insert_if_absent`](MarkerBackend::insert_if_absent)
//! and [`list_recent`](MarkerBackend::list_recent).
//!
//! Backends are dumb KV stores. Serialization, key construction and error
//! mapping live in [`GenericDedupStore`](crate::store::generic::GenericDedupStore).
//!
//! # Key Structure
//!
//! Keys are composite strings in the format `{form_id}:{submission_id}`.
//! Form identifiers issued by the form service are numeric, so the first
//! colon is always the separator. Prefix queries use `{form_id}:` to scope
//! listings to one form.
//!
//! # Uniqueness
//!
//! [`insert_if_absent`](MarkerBackend::insert_if_absent) is the only write.
//! It must be atomic: of any number of concurrent inserts for the same key,
//! exactly one succeeds and the rest fail with
//! [`StorageError::AlreadyExists`].

use std::fmt;

use async_trait::async_trait;

/// Errors that can occur during raw storage operations.
///
/// # Examples
///
/// ```
/// use survey_intake_dedup::StorageError;
///
/// let err = StorageError::AlreadyExists { key: "form:sub".to_string() };
/// assert!(err.to_string().contains("form:sub"));
/// ```
#[derive(Debug)]
pub enum StorageError {
    /// An insert targeted a key that is already present.
    AlreadyExists {
        /// The duplicate key.
        key: String,
    },

    /// An I/O or backend-specific error occurred (network failure,
    /// database timeout, malformed stored item).
    Backend {
        /// Human-readable description of the error.
        message: String,
        /// The underlying error, if available.
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyExists { key } => write!(f, "key already exists: {key}"),
            Self::Backend { message, .. } => write!(f, "backend error: {message}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Backend {
                source: Some(src), ..
            } => Some(src.as_ref()),
            _ => None,
        }
    }
}

/// Key-value backend for processed-submission markers.
///
/// Implementations must be `Send + Sync`; the webhook handler and the
/// reconciliation job share one store.
#[async_trait]
pub trait MarkerBackend: Send + Sync {
    /// Retrieves the serialized marker stored under `key`.
    ///
    /// Returns `Ok(None)` when no marker exists.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Backend`] on I/O or backend-specific failures.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Stores `data` under `key` only if the key is not present.
    ///
    /// # Errors
    ///
    /// - [`StorageError::AlreadyExists`] if a record is already stored.
    /// - [`StorageError::Backend`] on I/O or backend-specific failures.
    async fn insert_if_absent(&self, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Returns at most `limit` records whose key starts with `prefix`,
    /// newest `createdTime` first.
    ///
    /// Records without a readable `createdTime` sort after all others.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Backend`] on I/O or backend-specific failures.
    async fn list_recent(
        &self,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<(String, Vec<u8>)>, StorageError>;
}

/// Constructs a storage key from form and submission identifiers.
///
/// # Examples
///
/// ```
/// use survey_intake_dedup::store::backend::make_key;
///
/// assert_eq!(make_key("230001", "5830000000001"), "230001:5830000000001");
/// ```
pub fn make_key(form_id: &str, submission_id: &str) -> String {
    format!("{form_id}:{submission_id}")
}

/// Parses a storage key into `(form_id, submission_id)`.
///
/// Splits on the first colon. Returns `None` if the key has no colon.
///
/// # Examples
///
/// ```
/// use survey_intake_dedup::store::backend::parse_key;
///
/// assert_eq!(parse_key("230001:58300"), Some(("230001", "58300")));
/// assert_eq!(parse_key("no-colon"), None);
/// ```
pub fn parse_key(key: &str) -> Option<(&str, &str)> {
    key.split_once(':')
}

/// Constructs the listing prefix for one form: `{form_id}:`.
pub fn make_prefix(form_id: &str) -> String {
    format!("{form_id}:")
}

/// Reads `createdTime` (RFC 3339) from serialized marker JSON as epoch
/// milliseconds. Backends use it as the recency score.
///
/// # Examples
///
/// ```
/// use survey_intake_dedup::store::backend::created_time_ms;
///
/// let data = br#"{"createdTime":"1970-01-01T00:00:01Z"}"#;
/// assert_eq!(created_time_ms(data), Some(1000));
/// assert_eq!(created_time_ms(b"{}"), None);
/// ```
pub fn created_time_ms(data: &[u8]) -> Option<i64> {
    let value: serde_json::Value = serde_json::from_slice(data).ok()?;
    let created = value.get("createdTime")?.as_str()?;
    let dt = chrono::DateTime::parse_from_rfc3339(created).ok()?;
    Some(dt.timestamp_millis())
}
