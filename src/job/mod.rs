//! Recurring-job contract.
//!
//! A host scheduler owns the job records: it persists each job's metadata,
//! calls [`RecurringJobProcessor::process`] once per tick and stores the
//! metadata carried by the returned [`JobOutcome`] for the next tick.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

mod reconcile;

pub use reconcile::{ReconcileJob, FORM_ID_KEY, LAST_PROCESSED_SUBMISSION_ID_KEY};

/// String-keyed metadata persisted between job runs.
pub type JobMetadata = Map<String, Value>;

/// One scheduled job instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// Processor type that handles this job.
    pub job_type: String,
    /// Scheduler-level key preventing two jobs with the same identity.
    pub deduplication_id: String,
    /// Upper bound on a single run.
    pub processing_timeout: Duration,
    /// Earliest time the job may run.
    pub processing_available_time: DateTime<Utc>,
    /// Persisted metadata, including the checkpoint.
    pub metadata: JobMetadata,
}

impl Job {
    /// Reads a metadata entry as a string; numbers are rendered as decimal.
    pub fn metadata_str(&self, key: &str) -> Option<String> {
        match self.metadata.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Result of one job run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    /// The run finished; persist `metadata`.
    Success {
        /// Metadata for the next run.
        metadata: JobMetadata,
    },
    /// The run failed but can be retried; persist `metadata` first.
    Failing {
        /// Failure description.
        error: String,
        /// Metadata carrying the progress made before the failure.
        metadata: JobMetadata,
    },
    /// The job cannot succeed without operator action.
    Failed {
        /// Failure description.
        error: String,
    },
}

impl JobOutcome {
    /// Metadata to persist, if any.
    pub fn metadata(&self) -> Option<&JobMetadata> {
        match self {
            Self::Success { metadata } | Self::Failing { metadata, .. } => Some(metadata),
            Self::Failed { .. } => None,
        }
    }

    /// True for [`JobOutcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// A processor the host scheduler invokes on a fixed cadence.
#[async_trait]
pub trait RecurringJobProcessor: Send + Sync {
    /// Job type this processor handles.
    fn job_type(&self) -> &'static str;

    /// Maximum concurrent runs per job.
    fn quantity(&self) -> usize {
        1
    }

    /// Interval between runs.
    fn frequency(&self) -> Duration;

    /// Default upper bound on a single run.
    fn processing_timeout(&self) -> Duration;

    /// Runs the job once.
    async fn process(&self, ctx: &CancellationToken, job: &Job) -> JobOutcome;
}
