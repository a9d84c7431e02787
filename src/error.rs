//! Error types for submission intake.
//!
//! Soft business rejections (incomplete submission, identity mismatch,
//! failed survey validation) are deliberately *not* errors; they are
//! reported through [`SkipReason`](crate::processor::SkipReason). Everything
//! in [`IntakeError`] aborts processing of the current submission.

use survey_intake_dedup::DedupError;
use thiserror::Error;

/// Errors that abort processing of a submission or a reconciliation run.
///
/// Use [`is_retryable`](IntakeError::is_retryable) to decide between a
/// retryable (`Failing`) and a terminal (`Failed`) job outcome.
#[derive(Debug, Error)]
pub enum IntakeError {
    /// Required configuration or job metadata is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The request never produced a response (connect, TLS, timeout).
    #[error("{service} request failed: {message}")]
    Upstream {
        /// Service that was being called.
        service: &'static str,
        /// Transport error description.
        message: String,
    },

    /// The service answered with an unexpected HTTP status.
    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        /// Service that was being called.
        service: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The service answered HTTP 200 but reported failure in its envelope.
    #[error("{service} reported application error {code}: {message}")]
    Application {
        /// Service that was being called.
        service: &'static str,
        /// Application-level status code from the response body.
        code: i64,
        /// Message from the response body.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("failed to decode {service} response: {message}")]
    Decode {
        /// Service that was being called.
        service: &'static str,
        /// Decoder error description.
        message: String,
    },

    /// The marker store failed for a reason other than a duplicate key.
    #[error(transparent)]
    Store(#[from] DedupError),

    /// The call context was cancelled before or during a remote call.
    #[error("operation cancelled")]
    Cancelled,
}

impl IntakeError {
    /// Returns `false` only for errors that retrying cannot fix.
    ///
    /// # Examples
    ///
    /// ```
    /// use survey_intake::IntakeError;
    ///
    /// assert!(!IntakeError::Config("FormID missing".into()).is_retryable());
    /// assert!(IntakeError::Cancelled.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Config(_))
    }

    pub(crate) fn upstream(service: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Upstream {
            service,
            message: err.to_string(),
        }
    }

    pub(crate) fn decode(service: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            service,
            message: err.to_string(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, IntakeError>;
