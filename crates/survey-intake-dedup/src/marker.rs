//! The append-only record written once a submission has been handled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable proof that a submission's side effects completed.
///
/// Markers are never updated or deleted. Their existence is the sole
/// idempotency signal consulted by the submission processor.
///
/// # Examples
///
/// ```
/// use survey_intake_dedup::ProcessedSubmissionMarker;
///
/// let marker = ProcessedSubmissionMarker::new("form-1", "5830000000001");
/// assert_eq!(marker.form_id, "form-1");
/// assert_eq!(marker.submission_id, "5830000000001");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedSubmissionMarker {
    /// Submission identifier assigned by the form service.
    pub submission_id: String,

    /// Form the submission belongs to.
    pub form_id: String,

    /// When the marker was written.
    pub created_time: DateTime<Utc>,
}

impl ProcessedSubmissionMarker {
    /// Creates a marker stamped with the current UTC time.
    pub fn new(form_id: impl Into<String>, submission_id: impl Into<String>) -> Self {
        Self {
            submission_id: submission_id.into(),
            form_id: form_id.into(),
            created_time: Utc::now(),
        }
    }

    /// Overrides the creation time.
    pub fn with_created_time(mut self, created_time: DateTime<Utc>) -> Self {
        self.created_time = created_time;
        self
    }
}
