//! Resumable, bounded walk over a form's submissions.
//!
//! A run starts after the caller's checkpoint cursor, pages through
//! submissions in ascending id order and hands each one to a
//! [`SubmissionHandler`]. The cursor only moves past a submission once the
//! handler returned for it, so a failed run can resume from the returned
//! progress without skipping anything.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::clients::{SubmissionQuery, SubmissionSource};
use crate::config::ReconcileSettings;
use crate::error::IntakeError;
use crate::processor::SubmissionHandler;

/// Counters and checkpoint of a reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResult {
    /// Submissions the handler returned successfully for, skips included.
    pub total_processed: usize,
    /// Failures encountered; a run stops at its first failure.
    pub total_errors: usize,
    /// Id of the last handled submission; the resume cursor.
    pub last_processed_id: String,
}

/// A run that stopped early, with the progress made before it stopped.
#[derive(Debug, Error)]
#[error(
    "reconciliation stopped after {} submission(s) at cursor {:?}: {source}",
    .progress.total_processed,
    .progress.last_processed_id
)]
pub struct ReconcileFailure {
    /// Progress up to the failure; `last_processed_id` is safe to resume from.
    pub progress: ReconcileResult,
    /// What stopped the run.
    #[source]
    pub source: IntakeError,
}

/// Orders submission ids: all-digit ids numerically, anything else lexically.
fn compare_ids(a: &str, b: &str) -> Ordering {
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|c| c.is_ascii_digit());
    if numeric(a) && numeric(b) {
        let a = a.trim_start_matches('0');
        let b = b.trim_start_matches('0');
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    } else {
        a.cmp(b)
    }
}

/// Drives a [`SubmissionHandler`] over a form's submissions.
#[derive(Clone)]
pub struct Reconciler {
    source: Arc<dyn SubmissionSource>,
    handler: Arc<dyn SubmissionHandler>,
    settings: ReconcileSettings,
}

impl Reconciler {
    /// Creates a reconciler.
    pub fn new(
        source: Arc<dyn SubmissionSource>,
        handler: Arc<dyn SubmissionHandler>,
        settings: ReconcileSettings,
    ) -> Self {
        Self {
            source,
            handler,
            settings,
        }
    }

    /// Processes submissions of `form_id` after `cursor`.
    ///
    /// Stops at the first failure, when a short or empty page shows the
    /// backlog is drained, or once `max_items_per_run` submissions have been
    /// handled. An empty cursor starts from the beginning.
    pub async fn reconcile(
        &self,
        ctx: &CancellationToken,
        form_id: &str,
        cursor: &str,
    ) -> Result<ReconcileResult, ReconcileFailure> {
        let page_size = self.settings.page_size.max(1);
        let max_items = self.settings.max_items_per_run;
        let mut progress = ReconcileResult {
            last_processed_id: cursor.to_string(),
            ..ReconcileResult::default()
        };
        let fail = |mut progress: ReconcileResult, source: IntakeError| {
            progress.total_errors += 1;
            tracing::warn!(
                form_id,
                cursor = %progress.last_processed_id,
                error = %source,
                "reconciliation stopped"
            );
            ReconcileFailure { progress, source }
        };

        tracing::info!(form_id, cursor, page_size, max_items, "reconciliation started");
        'pages: loop {
            if progress.total_processed >= max_items {
                tracing::info!(form_id, max_items, "per-run cap reached");
                break;
            }
            if ctx.is_cancelled() {
                return Err(fail(progress, IntakeError::Cancelled));
            }

            let query = SubmissionQuery::after(&progress.last_processed_id, page_size);
            let page = match self.source.list_submissions(ctx, form_id, &query).await {
                Ok(page) => page,
                Err(e) => return Err(fail(progress, e)),
            };
            let page_len = page.len();
            tracing::debug!(form_id, page_len, "fetched submission page");
            let mut advanced = false;

            for submission in page {
                if progress.total_processed >= max_items {
                    tracing::info!(form_id, max_items, "per-run cap reached");
                    break 'pages;
                }
                if ctx.is_cancelled() {
                    return Err(fail(progress, IntakeError::Cancelled));
                }
                if !progress.last_processed_id.is_empty()
                    && compare_ids(&submission.id, &progress.last_processed_id) != Ordering::Greater
                {
                    tracing::warn!(
                        submission_id = %submission.id,
                        cursor = %progress.last_processed_id,
                        "ignoring submission at or before cursor"
                    );
                    continue;
                }

                if let Err(e) = self.handler.handle(ctx, &submission).await {
                    return Err(fail(progress, e));
                }
                progress.total_processed += 1;
                progress.last_processed_id = submission.id;
                advanced = true;
            }

            if page_len < page_size || !advanced {
                break;
            }
        }

        tracing::info!(
            form_id,
            total_processed = progress.total_processed,
            cursor = %progress.last_processed_id,
            "reconciliation finished"
        );
        Ok(progress)
    }
}
