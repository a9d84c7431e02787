//! Per-submission pipeline.
//!
//! For one submission the processor:
//!
//! 1. skips it if a processed marker already exists;
//! 2. skips it if it has no answers;
//! 3. validates the respondent's identity across the profile and user
//!    services;
//! 4. for eligible respondents, validates the survey, ensures a consent
//!    record exists and issues a deterministic discount code;
//! 5. sends one survey-completed event to the profile service;
//! 6. records the processed marker.
//!
//! Soft rejections in steps 1 to 4 end with [`ProcessOutcome::Skipped`]. Any
//! remote failure is returned as an error and leaves no marker, so the
//! submission is picked up again by the next run. Every remote side effect
//! is idempotent under replay: consent is checked before it is created, the
//! discount code is derived from the submission id, and the event id is the
//! submission id.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use survey_intake_dedup::{DedupStore, ProcessedSubmissionMarker};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::clients::{
    until_cancelled, CommerceService, ConsentService, ProfileService, Services, SubmissionSource,
};
use crate::config::SurveySettings;
use crate::error::{IntakeError, Result};
use crate::identity::{IdentityCheck, IdentityValidator};
use crate::survey::{
    derive_discount_code, parse_eligibility, validate_survey, SurveyRejection, ValidatedSurvey,
};
use crate::types::{
    AgeGroup, ConsentFilter, DiscountCodeRequest, GrantorType, Identifiers, NewConsentRecord,
    Pagination, ProfileEvent, Submission, SurveyCompletedData,
};

/// Why a submission was skipped without side effects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "skip", rename_all = "snake_case")]
pub enum SkipReason {
    /// A processed marker already exists.
    AlreadyProcessed,
    /// The submission carries no decodable answers.
    NoAnswers,
    /// User id or participant id is blank.
    MissingIdentity,
    /// No profile exists for the user id.
    ProfileNotFound,
    /// The profile's participant id differs from the submitted one.
    ParticipantMismatch,
    /// The user service does not know the user id.
    UserNotFound,
    /// An eligible respondent's answers failed validation.
    InvalidSurvey(SurveyRejection),
}

/// Result of processing one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProcessOutcome {
    /// The event was sent and the marker recorded.
    Processed {
        /// Whether the respondent was eligible.
        eligible: bool,
        /// The issued discount code, for eligible respondents.
        #[serde(skip_serializing_if = "Option::is_none")]
        discount_code: Option<String>,
    },
    /// The submission was left untouched.
    Skipped(SkipReason),
}

impl ProcessOutcome {
    /// True for [`ProcessOutcome::Processed`].
    pub fn is_processed(&self) -> bool {
        matches!(self, Self::Processed { .. })
    }
}

/// Something that can take a submission through the pipeline.
///
/// [`Reconciler`](crate::reconcile::Reconciler) drives this seam, so tests
/// can substitute scripted handlers.
#[async_trait]
pub trait SubmissionHandler: Send + Sync {
    /// Processes one submission.
    async fn handle(&self, ctx: &CancellationToken, submission: &Submission)
        -> Result<ProcessOutcome>;
}

/// The per-submission pipeline.
#[derive(Clone)]
pub struct SubmissionProcessor {
    markers: Arc<dyn DedupStore>,
    submissions: Arc<dyn SubmissionSource>,
    profiles: Arc<dyn ProfileService>,
    consent: Arc<dyn ConsentService>,
    commerce: Arc<dyn CommerceService>,
    identity: IdentityValidator,
    settings: SurveySettings,
    today: fn() -> NaiveDate,
}

fn utc_today() -> NaiveDate {
    Utc::now().date_naive()
}

impl SubmissionProcessor {
    /// Creates a processor over `services`.
    pub fn new(services: Services, settings: SurveySettings) -> Self {
        Self {
            identity: IdentityValidator::new(services.profiles.clone(), services.users),
            markers: services.markers,
            submissions: services.submissions,
            profiles: services.profiles,
            consent: services.consent,
            commerce: services.commerce,
            settings,
            today: utc_today,
        }
    }

    /// Replaces the clock used for age checks.
    pub fn with_today(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Fetches a submission by id and processes it.
    pub async fn process_by_id(
        &self,
        ctx: &CancellationToken,
        submission_id: &str,
    ) -> Result<ProcessOutcome> {
        let submission = self.submissions.get_submission(ctx, submission_id).await?;
        self.process(ctx, &submission).await
    }

    /// Processes one submission.
    pub async fn process(
        &self,
        ctx: &CancellationToken,
        submission: &Submission,
    ) -> Result<ProcessOutcome> {
        let span = tracing::info_span!(
            "process_submission",
            submission_id = %submission.id,
            form_id = %submission.form_id,
        );
        async move {
            let outcome = self.run(ctx, submission).await?;
            match &outcome {
                ProcessOutcome::Processed { eligible, .. } => {
                    tracing::info!(eligible, "submission processed");
                },
                ProcessOutcome::Skipped(reason) => {
                    tracing::info!(?reason, "submission skipped");
                },
            }
            Ok(outcome)
        }
        .instrument(span)
        .await
    }

    async fn run(&self, ctx: &CancellationToken, submission: &Submission) -> Result<ProcessOutcome> {
        let existing = until_cancelled(ctx, async {
            self.markers
                .get(&submission.form_id, &submission.id)
                .await
                .map_err(IntakeError::from)
        })
        .await?;
        if existing.is_some() {
            return Ok(ProcessOutcome::Skipped(SkipReason::AlreadyProcessed));
        }

        if submission.answers.is_empty() {
            return Ok(ProcessOutcome::Skipped(SkipReason::NoAnswers));
        }

        let user_id = submission.text(&self.settings.user_id_field);
        let participant_id = submission.text(&self.settings.participant_id_field);
        let identifiers = match self.identity.validate(ctx, &user_id, &participant_id).await? {
            IdentityCheck::Verified(ids) => ids,
            IdentityCheck::Rejected(reason) => return Ok(ProcessOutcome::Skipped(reason)),
        };

        let eligible = parse_eligibility(&submission.text(&self.settings.eligibility_field));
        let discount_code = if eligible {
            let survey = match validate_survey(submission, &self.settings, (self.today)()) {
                Ok(survey) => survey,
                Err(rejection) => {
                    return Ok(ProcessOutcome::Skipped(SkipReason::InvalidSurvey(rejection)));
                },
            };
            self.ensure_consent(ctx, &identifiers, &survey).await?;
            Some(self.issue_discount_code(ctx, submission).await?)
        } else {
            None
        };

        let data = SurveyCompletedData {
            eligible,
            discount_code: discount_code.clone(),
        };
        let event = ProfileEvent {
            name: self.settings.event_name.clone(),
            id: submission.id.clone(),
            data: serde_json::to_value(&data)
                .map_err(|e| IntakeError::decode("profiles", e))?,
        };
        self.profiles
            .send_event(ctx, &identifiers.internal_user_id, &event)
            .await?;

        self.record_marker(ctx, submission).await;

        Ok(ProcessOutcome::Processed {
            eligible,
            discount_code,
        })
    }

    /// Creates the consent record unless a matching active one exists.
    async fn ensure_consent(
        &self,
        ctx: &CancellationToken,
        identifiers: &Identifiers,
        survey: &ValidatedSurvey,
    ) -> Result<()> {
        let user_id = &identifiers.internal_user_id;
        let filter =
            ConsentFilter::latest_active(&self.settings.consent_type, self.settings.consent_version);
        let existing = self
            .consent
            .list_records(ctx, user_id, &filter, &Pagination::default())
            .await?;
        if !existing.is_empty() {
            tracing::debug!(user_id, "consent record already present");
            return Ok(());
        }

        let record = NewConsentRecord {
            age_group: AgeGroup::Adult,
            grantor_type: GrantorType::Owner,
            owner_name: survey.full_name.clone(),
            record_type: self.settings.consent_type.clone(),
            version: self.settings.consent_version,
        };
        self.consent.create_record(ctx, user_id, &record).await?;
        tracing::info!(user_id, "consent record created");
        Ok(())
    }

    async fn issue_discount_code(
        &self,
        ctx: &CancellationToken,
        submission: &Submission,
    ) -> Result<String> {
        let code = derive_discount_code(&submission.id);
        let request = DiscountCodeRequest {
            title: format!("{} {}", self.settings.reward_title_prefix, submission.id),
            code: code.clone(),
            product_id: self.settings.reward_product_id.clone(),
        };
        self.commerce.create_discount_code(ctx, &request).await?;
        Ok(code)
    }

    /// Marker write failures, cancellation included, are logged and
    /// swallowed; the event is already sent.
    async fn record_marker(&self, ctx: &CancellationToken, submission: &Submission) {
        let marker = ProcessedSubmissionMarker::new(&submission.form_id, &submission.id);
        let saved = until_cancelled(ctx, async {
            self.markers.save(&marker).await.map_err(IntakeError::from)
        })
        .await;
        match saved {
            Ok(()) => {},
            Err(IntakeError::Store(e)) if e.is_already_exists() => {
                tracing::info!("marker already recorded by a concurrent run");
            },
            Err(e) => {
                tracing::error!(error = %e, "failed to record processed marker");
            },
        }
    }
}

#[async_trait]
impl SubmissionHandler for SubmissionProcessor {
    async fn handle(
        &self,
        ctx: &CancellationToken,
        submission: &Submission,
    ) -> Result<ProcessOutcome> {
        self.process(ctx, submission).await
    }
}
