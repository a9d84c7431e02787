//! Submission processor behavior against recording fakes.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{survey_submission, FakeConsent, FakeProfiles, FakeSubmissions, FakeUsers, Harness};
use pretty_assertions::assert_eq;
use survey_intake::config::SurveySettings;
use survey_intake::dedup::{DedupStore, ProcessedSubmissionMarker};
use survey_intake::survey::{derive_discount_code, SurveyRejection};
use survey_intake::types::{AgeGroup, Answer, GrantorType, Identifiers, Profile, Submission};
use survey_intake::{IntakeError, ProcessOutcome, SkipReason, SubmissionProcessor};
use tokio_util::sync::CancellationToken;

// ─── Eligibility Branching ──────────────────────────────────────────────────

mod eligibility_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_eligible_creates_consent_code_and_event() {
        let h = Harness::new();
        let ctx = CancellationToken::new();
        let submission = survey_submission("S1", "U1", "P1", true);

        let outcome = h.processor().process(&ctx, &submission).await.unwrap();

        let code = derive_discount_code("S1");
        assert_eq!(
            outcome,
            ProcessOutcome::Processed {
                eligible: true,
                discount_code: Some(code.clone()),
            }
        );

        let created = h.consent.created();
        assert_eq!(created.len(), 1);
        let (user_id, record) = &created[0];
        assert_eq!(user_id, "U1");
        assert_eq!(record.age_group, AgeGroup::Adult);
        assert_eq!(record.grantor_type, GrantorType::Owner);
        assert_eq!(record.record_type, "big_data_donation_project");
        assert_eq!(record.version, 1);
        assert_eq!(record.owner_name, "Ada Lovelace");

        let codes = h.commerce.requests();
        assert_eq!(codes.len(), 1);
        assert_eq!(codes[0].code.len(), 12);
        assert_eq!(codes[0].code, code);

        let events = h.profiles.events();
        assert_eq!(events.len(), 1);
        let (profile_id, event) = &events[0];
        assert_eq!(profile_id, "U1");
        assert_eq!(event.id, "S1");
        assert_eq!(event.name, "Eligibility Survey Completed");
        assert_eq!(
            event.data,
            serde_json::json!({"eligible": true, "discountCode": code})
        );

        assert!(h.markers.get("230001", "S1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_existing_consent_is_not_recreated() {
        let h = Harness::with(
            FakeSubmissions::default(),
            FakeProfiles::default().with_profile("U1", "P1"),
            FakeConsent::default().with_existing("U1"),
            FakeUsers::default().with_user("U1"),
        );
        let ctx = CancellationToken::new();

        let outcome = h
            .processor()
            .process(&ctx, &survey_submission("S1", "U1", "P1", true))
            .await
            .unwrap();

        assert!(outcome.is_processed());
        assert!(h.consent.created().is_empty());
        assert_eq!(h.consent.filters.lock().len(), 1);
        assert_eq!(h.commerce.requests().len(), 1);
        assert_eq!(h.profiles.events().len(), 1);
    }

    #[tokio::test]
    async fn test_ineligible_sends_only_event() {
        let h = Harness::new();
        let ctx = CancellationToken::new();

        let outcome = h
            .processor()
            .process(&ctx, &survey_submission("S2", "U1", "P1", false))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ProcessOutcome::Processed {
                eligible: false,
                discount_code: None,
            }
        );
        assert!(h.consent.filters.lock().is_empty());
        assert!(h.consent.created().is_empty());
        assert!(h.commerce.requests().is_empty());

        let events = h.profiles.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].1.data, serde_json::json!({"eligible": false}));
        assert!(h.markers.get("230001", "S2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_invalid_survey_is_skipped_without_side_effects() {
        let h = Harness::new();
        let ctx = CancellationToken::new();
        let submission = Submission::new("S3", "230001")
            .with_answer(Answer::textbox("userId", "U1"))
            .with_answer(Answer::textbox("participantId", "P1"))
            .with_answer(Answer::textbox("eligible", "yes"))
            .with_answer(Answer::full_name("name", "Young", "Person"))
            .with_answer(Answer::date_time("dateOfBirth", "2012-01-01"));

        let outcome = h.processor().process(&ctx, &submission).await.unwrap();

        assert_eq!(
            outcome,
            ProcessOutcome::Skipped(SkipReason::InvalidSurvey(SurveyRejection::Underage {
                age: 13,
                minimum: 18,
            }))
        );
        assert_eq!(h.side_effects(), 0);
        assert!(h.markers.get("230001", "S3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lowered_minimum_age_never_yields_minor_consent() {
        let h = Harness::new();
        let settings = SurveySettings {
            minimum_age: 16,
            ..SurveySettings::default()
        };
        let processor = SubmissionProcessor::new(h.services(), settings)
            .with_today(common::fixed_today);
        let ctx = CancellationToken::new();
        let teen = Submission::new("S4", "230001")
            .with_answer(Answer::textbox("userId", "U1"))
            .with_answer(Answer::textbox("participantId", "P1"))
            .with_answer(Answer::textbox("eligible", "yes"))
            .with_answer(Answer::full_name("name", "Teen", "Ager"))
            .with_answer(Answer::date_time("dateOfBirth", "2008-01-01"));

        let outcome = processor.process(&ctx, &teen).await.unwrap();
        assert_eq!(
            outcome,
            ProcessOutcome::Skipped(SkipReason::InvalidSurvey(SurveyRejection::Underage {
                age: 17,
                minimum: 18,
            }))
        );
        assert_eq!(h.side_effects(), 0);

        processor
            .process(&ctx, &survey_submission("S5", "U1", "P1", true))
            .await
            .unwrap();
        let created = h.consent.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].1.age_group, AgeGroup::Adult);
        assert_eq!(created[0].1.grantor_type, GrantorType::Owner);
    }
}

// ─── Identity ───────────────────────────────────────────────────────────────

mod identity_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_participant_mismatch_has_no_side_effects() {
        let h = Harness::new();
        let ctx = CancellationToken::new();

        let outcome = h
            .processor()
            .process(&ctx, &survey_submission("S1", "U1", "P-spoofed", true))
            .await
            .unwrap();

        assert_eq!(outcome, ProcessOutcome::Skipped(SkipReason::ParticipantMismatch));
        assert_eq!(h.side_effects(), 0);
        assert!(h.consent.filters.lock().is_empty());
        assert!(h.markers.get("230001", "S1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_profile_not_found_is_skip() {
        let h = Harness::new();
        let ctx = CancellationToken::new();

        let outcome = h
            .processor()
            .process(&ctx, &survey_submission("S1", "U-unknown", "P1", true))
            .await
            .unwrap();

        assert_eq!(outcome, ProcessOutcome::Skipped(SkipReason::ProfileNotFound));
        assert_eq!(h.side_effects(), 0);
    }

    #[tokio::test]
    async fn test_unknown_user_is_skip() {
        let h = Harness::with(
            FakeSubmissions::default(),
            FakeProfiles::default().with_profile("U1", "P1"),
            FakeConsent::default(),
            FakeUsers::default(),
        );
        let ctx = CancellationToken::new();

        let outcome = h
            .processor()
            .process(&ctx, &survey_submission("S1", "U1", "P1", false))
            .await
            .unwrap();

        assert_eq!(outcome, ProcessOutcome::Skipped(SkipReason::UserNotFound));
        assert_eq!(h.side_effects(), 0);
    }

    #[tokio::test]
    async fn test_blank_identity_skips_before_lookup() {
        let h = Harness::new();
        let ctx = CancellationToken::new();

        let outcome = h
            .processor()
            .process(&ctx, &survey_submission("S1", "  ", "P1", true))
            .await
            .unwrap();

        assert_eq!(outcome, ProcessOutcome::Skipped(SkipReason::MissingIdentity));
        assert_eq!(h.profiles.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_identifiers_are_trimmed() {
        let h = Harness::new();
        let ctx = CancellationToken::new();

        let outcome = h
            .processor()
            .process(&ctx, &survey_submission("S1", " U1 ", "P1\t", false))
            .await
            .unwrap();

        assert!(outcome.is_processed());
        assert_eq!(h.profiles.events()[0].0, "U1");
    }

    #[tokio::test]
    async fn test_side_effects_target_profile_identifiers() {
        let h = Harness::new();
        h.profiles.profiles.lock().insert(
            "U1".to_string(),
            Profile {
                id: "prof-1".into(),
                identifiers: Identifiers {
                    internal_user_id: "usr_001".into(),
                    external_participant_id: "P1".into(),
                    external_customer_id: None,
                },
                attributes: Default::default(),
            },
        );
        let ctx = CancellationToken::new();

        let outcome = h
            .processor()
            .process(&ctx, &survey_submission("S1", "U1", "P1", true))
            .await
            .unwrap();

        assert!(outcome.is_processed());
        assert_eq!(h.consent.created()[0].0, "usr_001");
        assert_eq!(h.profiles.events()[0].0, "usr_001");
    }

    #[tokio::test]
    async fn test_profile_lookup_failure_propagates() {
        let h = Harness::new();
        h.profiles.fail_lookups.store(true, Ordering::SeqCst);
        let ctx = CancellationToken::new();

        let err = h
            .processor()
            .process(&ctx, &survey_submission("S1", "U1", "P1", true))
            .await
            .unwrap_err();

        assert!(matches!(err, IntakeError::Status { status: 503, .. }));
        assert!(err.is_retryable());
    }
}

// ─── Idempotence ────────────────────────────────────────────────────────────

mod idempotence_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_second_process_is_noop() {
        let h = Harness::new();
        let ctx = CancellationToken::new();
        let submission = survey_submission("S1", "U1", "P1", true);
        let processor = h.processor();

        processor.process(&ctx, &submission).await.unwrap();
        let lookups_after_first = h.profiles.lookups.load(Ordering::SeqCst);
        let second = processor.process(&ctx, &submission).await.unwrap();

        assert_eq!(second, ProcessOutcome::Skipped(SkipReason::AlreadyProcessed));
        assert_eq!(h.consent.created().len(), 1);
        assert_eq!(h.commerce.requests().len(), 1);
        assert_eq!(h.profiles.events().len(), 1);
        assert_eq!(h.profiles.lookups.load(Ordering::SeqCst), lookups_after_first);
    }

    #[tokio::test]
    async fn test_existing_marker_short_circuits() {
        let h = Harness::new();
        h.markers
            .save(&ProcessedSubmissionMarker::new("230001", "S1"))
            .await
            .unwrap();
        let ctx = CancellationToken::new();

        let outcome = h
            .processor()
            .process(&ctx, &survey_submission("S1", "U1", "P1", true))
            .await
            .unwrap();

        assert_eq!(outcome, ProcessOutcome::Skipped(SkipReason::AlreadyProcessed));
        assert_eq!(h.profiles.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_answers_is_skipped() {
        let h = Harness::new();
        let ctx = CancellationToken::new();

        let outcome = h
            .processor()
            .process(&ctx, &Submission::new("S9", "230001"))
            .await
            .unwrap();

        assert_eq!(outcome, ProcessOutcome::Skipped(SkipReason::NoAnswers));
        assert_eq!(h.profiles.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_event_leaves_no_marker_and_retry_reuses_code() {
        let h = Harness::new();
        h.profiles.fail_events.store(true, Ordering::SeqCst);
        let ctx = CancellationToken::new();
        let submission = survey_submission("S1", "U1", "P1", true);
        let processor = h.processor();

        let err = processor.process(&ctx, &submission).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(h.markers.get("230001", "S1").await.unwrap().is_none());

        h.profiles.fail_events.store(false, Ordering::SeqCst);
        let outcome = processor.process(&ctx, &submission).await.unwrap();
        assert!(outcome.is_processed());

        let codes = h.commerce.requests();
        assert_eq!(codes.len(), 2);
        assert_eq!(codes[0].code, codes[1].code);
        assert_eq!(h.profiles.events().len(), 1);
        assert!(h.markers.get("230001", "S1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_consent_failure_stops_before_commerce() {
        let h = Harness::new();
        h.consent.fail_create.store(true, Ordering::SeqCst);
        let ctx = CancellationToken::new();

        let result = h
            .processor()
            .process(&ctx, &survey_submission("S1", "U1", "P1", true))
            .await;

        assert!(result.is_err());
        assert!(h.commerce.requests().is_empty());
        assert!(h.profiles.events().is_empty());
    }

    #[tokio::test]
    async fn test_commerce_failure_stops_before_event() {
        let h = Harness::new();
        h.commerce.fail.store(true, Ordering::SeqCst);
        let ctx = CancellationToken::new();

        let result = h
            .processor()
            .process(&ctx, &survey_submission("S1", "U1", "P1", true))
            .await;

        assert!(result.is_err());
        assert_eq!(h.consent.created().len(), 1);
        assert!(h.profiles.events().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_paths_write_one_marker() {
        let h = Harness::new();
        let processor = Arc::new(h.processor());
        let submission = survey_submission("S1", "U1", "P1", false);

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let processor = processor.clone();
                let submission = submission.clone();
                tokio::spawn(async move {
                    processor
                        .process(&CancellationToken::new(), &submission)
                        .await
                })
            })
            .collect();
        for result in futures::future::join_all(handles).await {
            result.unwrap().unwrap();
        }

        let markers = h.markers.list_recent("230001", 10).await.unwrap();
        assert_eq!(markers.len(), 1);
        assert!((1..=2).contains(&h.profiles.events().len()));
        assert!(h.profiles.events().iter().all(|(_, e)| e.id == "S1"));
    }
}

// ─── Entry Points ───────────────────────────────────────────────────────────

mod entry_point_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_process_by_id_fetches_then_processes() {
        let h = Harness::with(
            FakeSubmissions::with(vec![survey_submission("S7", "U1", "P1", false)]),
            FakeProfiles::default().with_profile("U1", "P1"),
            FakeConsent::default(),
            FakeUsers::default().with_user("U1"),
        );
        let ctx = CancellationToken::new();

        let outcome = h.processor().process_by_id(&ctx, "S7").await.unwrap();

        assert!(outcome.is_processed());
        assert_eq!(h.profiles.events()[0].1.id, "S7");
    }

    #[tokio::test]
    async fn test_process_by_id_fetch_failure_propagates() {
        let h = Harness::new();
        let ctx = CancellationToken::new();

        let err = h.processor().process_by_id(&ctx, "missing").await.unwrap_err();

        assert!(matches!(err, IntakeError::Status { status: 404, .. }));
        assert_eq!(h.side_effects(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_context_does_nothing() {
        let h = Harness::new();
        let ctx = CancellationToken::new();
        ctx.cancel();

        let err = h
            .processor()
            .process(&ctx, &survey_submission("S1", "U1", "P1", true))
            .await
            .unwrap_err();

        assert!(matches!(err, IntakeError::Cancelled));
        assert_eq!(h.profiles.lookups.load(Ordering::SeqCst), 0);
    }
}

// ─── Cancellation ───────────────────────────────────────────────────────────

mod cancellation_tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    use async_trait::async_trait;
    use survey_intake::dedup::DedupError;
    use survey_intake::Services;

    /// Marker store that never answers writes, and never answers reads when
    /// `stall_reads` is set.
    struct StalledStore {
        stall_reads: bool,
    }

    #[async_trait]
    impl DedupStore for StalledStore {
        async fn get(
            &self,
            _form_id: &str,
            _submission_id: &str,
        ) -> Result<Option<ProcessedSubmissionMarker>, DedupError> {
            if self.stall_reads {
                std::future::pending().await
            } else {
                Ok(None)
            }
        }

        async fn save(&self, _marker: &ProcessedSubmissionMarker) -> Result<(), DedupError> {
            std::future::pending().await
        }

        async fn list_recent(
            &self,
            _form_id: &str,
            _limit: usize,
        ) -> Result<Vec<ProcessedSubmissionMarker>, DedupError> {
            std::future::pending().await
        }
    }

    fn processor_with_store(h: &Harness, store: StalledStore) -> SubmissionProcessor {
        let services = Services {
            markers: Arc::new(store),
            ..h.services()
        };
        SubmissionProcessor::new(services, SurveySettings::default())
            .with_today(common::fixed_today)
    }

    fn cancel_after(ctx: &CancellationToken, delay: Duration) {
        let trigger = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            trigger.cancel();
        });
    }

    #[tokio::test]
    async fn test_stalled_marker_lookup_yields_to_cancellation() {
        let h = Harness::new();
        let processor = processor_with_store(&h, StalledStore { stall_reads: true });
        let ctx = CancellationToken::new();
        cancel_after(&ctx, Duration::from_millis(50));

        let submission = survey_submission("S1", "U1", "P1", true);
        let result = tokio::time::timeout(
            Duration::from_secs(2),
            processor.process(&ctx, &submission),
        )
        .await
        .expect("process must return once the context is cancelled");

        assert!(matches!(result, Err(IntakeError::Cancelled)));
        assert_eq!(h.profiles.lookups.load(Ordering::SeqCst), 0);
        assert_eq!(h.side_effects(), 0);
    }

    #[tokio::test]
    async fn test_stalled_marker_write_is_abandoned_on_cancellation() {
        let h = Harness::new();
        let processor = processor_with_store(&h, StalledStore { stall_reads: false });
        let ctx = CancellationToken::new();
        cancel_after(&ctx, Duration::from_millis(50));

        let submission = survey_submission("S1", "U1", "P1", false);
        let outcome = tokio::time::timeout(
            Duration::from_secs(2),
            processor.process(&ctx, &submission),
        )
        .await
        .expect("process must return once the context is cancelled")
        .unwrap();

        assert!(outcome.is_processed());
        assert_eq!(h.profiles.events().len(), 1);
    }
}
