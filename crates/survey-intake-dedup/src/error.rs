//! Errors surfaced by [`DedupStore`](crate::store::DedupStore) operations.

use crate::store::StorageError;

/// Errors returned by the marker store.
///
/// [`AlreadyExists`](DedupError::AlreadyExists) is an expected outcome when
/// two processing paths race on the same submission; callers should treat
/// it as "already handled" rather than as a failure.
///
/// # Examples
///
/// ```
/// use survey_intake_dedup::DedupError;
///
/// let err = DedupError::AlreadyExists {
///     form_id: "f1".to_string(),
///     submission_id: "s1".to_string(),
/// };
/// assert!(err.is_already_exists());
/// assert!(err.to_string().contains("s1"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum DedupError {
    /// A marker for this `(form_id, submission_id)` pair was already written.
    #[error("marker already exists for submission {submission_id} of form {form_id}")]
    AlreadyExists {
        /// Form identifier.
        form_id: String,
        /// Submission identifier.
        submission_id: String,
    },

    /// The marker could not be encoded or a stored marker could not be decoded.
    #[error("marker serialization failed: {0}")]
    Serialization(String),

    /// The backend failed for a reason other than a duplicate key.
    #[error("marker storage failed: {0}")]
    Storage(#[source] StorageError),
}

impl DedupError {
    /// Returns `true` for the duplicate-write outcome.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}
