//! Recurring job that reconciles one form's submissions.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{Job, JobMetadata, JobOutcome, RecurringJobProcessor};
use crate::config::JobSettings;
use crate::reconcile::Reconciler;

/// Metadata key holding the form id.
pub const FORM_ID_KEY: &str = "FormID";

/// Metadata key holding the checkpoint cursor.
pub const LAST_PROCESSED_SUBMISSION_ID_KEY: &str = "LastProcessedSubmissionID";

/// Adapts a [`Reconciler`] to [`RecurringJobProcessor`].
///
/// Missing `FormID` metadata fails the job permanently. Any reconciliation
/// failure, including the run exceeding its timeout, is reported as
/// [`JobOutcome::Failing`] with the cursor advanced to the last submission
/// that was handled.
#[derive(Clone)]
pub struct ReconcileJob {
    reconciler: Arc<Reconciler>,
    settings: JobSettings,
}

impl ReconcileJob {
    /// Job type name.
    pub const JOB_TYPE: &'static str = "survey_intake_reconcile";

    /// Creates the adapter.
    pub fn new(reconciler: Arc<Reconciler>, settings: JobSettings) -> Self {
        Self {
            reconciler,
            settings,
        }
    }

    /// Builds a fresh job record for `form_id`, starting from the beginning.
    pub fn new_job(&self, form_id: &str) -> Job {
        let mut metadata = JobMetadata::new();
        metadata.insert(FORM_ID_KEY.to_string(), Value::String(form_id.to_string()));
        metadata.insert(
            LAST_PROCESSED_SUBMISSION_ID_KEY.to_string(),
            Value::String(String::new()),
        );
        Job {
            job_type: Self::JOB_TYPE.to_string(),
            deduplication_id: format!("{}:{form_id}", Self::JOB_TYPE),
            processing_timeout: self.settings.processing_timeout(),
            processing_available_time: Utc::now(),
            metadata,
        }
    }

    fn with_cursor(metadata: &JobMetadata, cursor: String) -> JobMetadata {
        let mut metadata = metadata.clone();
        metadata.insert(
            LAST_PROCESSED_SUBMISSION_ID_KEY.to_string(),
            Value::String(cursor),
        );
        metadata
    }
}

#[async_trait]
impl RecurringJobProcessor for ReconcileJob {
    fn job_type(&self) -> &'static str {
        Self::JOB_TYPE
    }

    fn frequency(&self) -> Duration {
        self.settings.frequency()
    }

    fn processing_timeout(&self) -> Duration {
        self.settings.processing_timeout()
    }

    async fn process(&self, ctx: &CancellationToken, job: &Job) -> JobOutcome {
        let Some(form_id) = job
            .metadata_str(FORM_ID_KEY)
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
        else {
            tracing::error!(job = %job.deduplication_id, "job metadata has no {FORM_ID_KEY}");
            return JobOutcome::Failed {
                error: format!("missing {FORM_ID_KEY} in job metadata"),
            };
        };
        let cursor = job
            .metadata_str(LAST_PROCESSED_SUBMISSION_ID_KEY)
            .unwrap_or_default();

        let timeout = if job.processing_timeout.is_zero() {
            self.processing_timeout()
        } else {
            job.processing_timeout
        };
        let run_ctx = ctx.child_token();
        let deadline = tokio::spawn({
            let run_ctx = run_ctx.clone();
            async move {
                tokio::time::sleep(timeout).await;
                run_ctx.cancel();
            }
        });

        let result = self.reconciler.reconcile(&run_ctx, &form_id, &cursor).await;
        deadline.abort();

        match result {
            Ok(progress) => {
                tracing::info!(
                    form_id = %form_id,
                    total_processed = progress.total_processed,
                    "reconcile job succeeded"
                );
                JobOutcome::Success {
                    metadata: Self::with_cursor(&job.metadata, progress.last_processed_id),
                }
            },
            Err(failure) => {
                let error = if run_ctx.is_cancelled() && !ctx.is_cancelled() {
                    format!("timed out after {timeout:?}: {failure}")
                } else {
                    failure.to_string()
                };
                tracing::warn!(form_id = %form_id, %error, "reconcile job failing");
                JobOutcome::Failing {
                    error,
                    metadata: Self::with_cursor(&job.metadata, failure.progress.last_processed_id),
                }
            },
        }
    }
}
