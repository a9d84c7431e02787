//! Recording fakes for the service traits.
//!
//! Each fake records the calls it receives and can be told to fail, so the
//! tests can assert on exactly which side effects happened.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use survey_intake::clients::{
    CommerceService, ConsentService, ProfileService, SubmissionQuery, SubmissionSource,
    UserDirectory,
};
use survey_intake::config::SurveySettings;
use survey_intake::dedup::{DedupStore, InMemoryDedupStore};
use survey_intake::types::{
    Answer, ConsentFilter, ConsentRecord, ConsentRecordList, ConsentStatus, DiscountCodeRequest,
    Identifiers, NewConsentRecord, Pagination, Profile, ProfileEvent, ProfileIdType, Submission,
    User,
};
use survey_intake::{IntakeError, Result, Services, SubmissionProcessor};
use tokio_util::sync::CancellationToken;

pub fn unavailable(service: &'static str) -> IntakeError {
    IntakeError::Status {
        service,
        status: 503,
        body: "unavailable".to_string(),
    }
}

pub fn fixed_today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
}

/// Submission with the standard survey fields filled in.
pub fn survey_submission(id: &str, user_id: &str, participant_id: &str, eligible: bool) -> Submission {
    Submission::new(id, "230001")
        .with_answer(Answer::textbox("userId", user_id))
        .with_answer(Answer::textbox("participantId", participant_id))
        .with_answer(Answer::textbox("eligible", if eligible { "Yes" } else { "No" }))
        .with_answer(Answer::full_name("name", "Ada", "Lovelace"))
        .with_answer(Answer::date_time("dateOfBirth", "1980-05-07"))
}

// ─── Submission source ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeSubmissions {
    pub submissions: Mutex<Vec<Submission>>,
    pub queries: Mutex<Vec<SubmissionQuery>>,
    pub fail_list_call: Mutex<Option<usize>>,
}

impl FakeSubmissions {
    pub fn with(submissions: Vec<Submission>) -> Self {
        let fake = Self::default();
        *fake.submissions.lock() = submissions;
        fake
    }

    /// Fails the `n`th (zero-based) list call.
    pub fn fail_list_call(&self, n: usize) {
        *self.fail_list_call.lock() = Some(n);
    }
}

#[async_trait]
impl SubmissionSource for FakeSubmissions {
    async fn list_submissions(
        &self,
        ctx: &CancellationToken,
        _form_id: &str,
        query: &SubmissionQuery,
    ) -> Result<Vec<Submission>> {
        if ctx.is_cancelled() {
            return Err(IntakeError::Cancelled);
        }
        let call = {
            let mut queries = self.queries.lock();
            queries.push(query.clone());
            queries.len() - 1
        };
        if *self.fail_list_call.lock() == Some(call) {
            return Err(unavailable("forms"));
        }

        let mut items: Vec<Submission> = self
            .submissions
            .lock()
            .iter()
            .filter(|s| match &query.after_id {
                Some(after) => s.id.as_str() > after.as_str(),
                None => true,
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        items.truncate(query.limit);
        Ok(items)
    }

    async fn get_submission(
        &self,
        _ctx: &CancellationToken,
        submission_id: &str,
    ) -> Result<Submission> {
        self.submissions
            .lock()
            .iter()
            .find(|s| s.id == submission_id)
            .cloned()
            .ok_or_else(|| IntakeError::Status {
                service: "forms",
                status: 404,
                body: "not found".into(),
            })
    }
}

// ─── Profiles ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeProfiles {
    pub profiles: Mutex<HashMap<String, Profile>>,
    pub lookups: AtomicUsize,
    pub events: Mutex<Vec<(String, ProfileEvent)>>,
    pub fail_lookups: AtomicBool,
    pub fail_events: AtomicBool,
}

impl FakeProfiles {
    pub fn with_profile(self, user_id: &str, participant_id: &str) -> Self {
        self.profiles.lock().insert(
            user_id.to_string(),
            Profile {
                id: user_id.to_string(),
                identifiers: Identifiers {
                    internal_user_id: user_id.to_string(),
                    external_participant_id: participant_id.to_string(),
                    external_customer_id: None,
                },
                attributes: Default::default(),
            },
        );
        self
    }

    pub fn events(&self) -> Vec<(String, ProfileEvent)> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl ProfileService for FakeProfiles {
    async fn get_profile(
        &self,
        _ctx: &CancellationToken,
        id: &str,
        id_type: ProfileIdType,
    ) -> Result<Option<Profile>> {
        assert_eq!(id_type, ProfileIdType::UserId);
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(unavailable("profiles"));
        }
        Ok(self.profiles.lock().get(id).cloned())
    }

    async fn send_event(
        &self,
        _ctx: &CancellationToken,
        profile_id: &str,
        event: &ProfileEvent,
    ) -> Result<()> {
        if self.fail_events.load(Ordering::SeqCst) {
            return Err(unavailable("profiles"));
        }
        self.events
            .lock()
            .push((profile_id.to_string(), event.clone()));
        Ok(())
    }
}

// ─── Consent ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeConsent {
    pub existing: Mutex<HashMap<String, Vec<ConsentRecord>>>,
    pub filters: Mutex<Vec<ConsentFilter>>,
    pub created: Mutex<Vec<(String, NewConsentRecord)>>,
    pub fail_create: AtomicBool,
}

impl FakeConsent {
    pub fn with_existing(self, user_id: &str) -> Self {
        self.existing.lock().insert(
            user_id.to_string(),
            vec![ConsentRecord {
                id: "c-1".into(),
                record_type: "big_data_donation_project".into(),
                version: 1,
                status: ConsentStatus::Active,
                age_group: None,
                grantor_type: None,
                owner_name: None,
            }],
        );
        self
    }

    pub fn created(&self) -> Vec<(String, NewConsentRecord)> {
        self.created.lock().clone()
    }
}

#[async_trait]
impl ConsentService for FakeConsent {
    async fn list_records(
        &self,
        _ctx: &CancellationToken,
        user_id: &str,
        filter: &ConsentFilter,
        _page: &Pagination,
    ) -> Result<ConsentRecordList> {
        self.filters.lock().push(filter.clone());
        let items = self.existing.lock().get(user_id).cloned().unwrap_or_default();
        Ok(ConsentRecordList {
            count: items.len() as u64,
            items,
        })
    }

    async fn create_record(
        &self,
        _ctx: &CancellationToken,
        user_id: &str,
        record: &NewConsentRecord,
    ) -> Result<ConsentRecord> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(unavailable("consent"));
        }
        self.created
            .lock()
            .push((user_id.to_string(), record.clone()));
        let stored = ConsentRecord {
            id: format!("c-{user_id}"),
            record_type: record.record_type.clone(),
            version: record.version,
            status: ConsentStatus::Active,
            age_group: Some(record.age_group),
            grantor_type: Some(record.grantor_type),
            owner_name: Some(record.owner_name.clone()),
        };
        self.existing
            .lock()
            .entry(user_id.to_string())
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }
}

// ─── Commerce ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeCommerce {
    pub requests: Mutex<Vec<DiscountCodeRequest>>,
    pub fail: AtomicBool,
}

impl FakeCommerce {
    pub fn requests(&self) -> Vec<DiscountCodeRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl CommerceService for FakeCommerce {
    async fn create_discount_code(
        &self,
        _ctx: &CancellationToken,
        request: &DiscountCodeRequest,
    ) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(unavailable("commerce"));
        }
        self.requests.lock().push(request.clone());
        Ok(())
    }
}

// ─── Users ──────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeUsers {
    pub known: Mutex<HashSet<String>>,
}

impl FakeUsers {
    pub fn with_user(self, user_id: &str) -> Self {
        self.known.lock().insert(user_id.to_string());
        self
    }
}

#[async_trait]
impl UserDirectory for FakeUsers {
    async fn get_user(&self, _ctx: &CancellationToken, user_id: &str) -> Result<Option<User>> {
        Ok(self.known.lock().get(user_id).map(|id| User {
            id: id.clone(),
            email: None,
        }))
    }
}

// ─── Harness ────────────────────────────────────────────────────────────────

/// All fakes wired into a processor.
pub struct Harness {
    pub submissions: Arc<FakeSubmissions>,
    pub profiles: Arc<FakeProfiles>,
    pub consent: Arc<FakeConsent>,
    pub commerce: Arc<FakeCommerce>,
    pub users: Arc<FakeUsers>,
    pub markers: Arc<InMemoryDedupStore>,
}

impl Harness {
    /// Profile `U1`/`P1` and user `U1` exist; no consent records.
    pub fn new() -> Self {
        Self::with(
            FakeSubmissions::default(),
            FakeProfiles::default().with_profile("U1", "P1"),
            FakeConsent::default(),
            FakeUsers::default().with_user("U1"),
        )
    }

    pub fn with(
        submissions: FakeSubmissions,
        profiles: FakeProfiles,
        consent: FakeConsent,
        users: FakeUsers,
    ) -> Self {
        Self {
            submissions: Arc::new(submissions),
            profiles: Arc::new(profiles),
            consent: Arc::new(consent),
            commerce: Arc::new(FakeCommerce::default()),
            users: Arc::new(users),
            markers: Arc::new(InMemoryDedupStore::in_memory()),
        }
    }

    pub fn services(&self) -> Services {
        Services {
            submissions: self.submissions.clone(),
            profiles: self.profiles.clone(),
            consent: self.consent.clone(),
            commerce: self.commerce.clone(),
            users: self.users.clone(),
            markers: self.markers.clone() as Arc<dyn DedupStore>,
        }
    }

    pub fn processor(&self) -> SubmissionProcessor {
        SubmissionProcessor::new(self.services(), SurveySettings::default()).with_today(fixed_today)
    }

    /// Total side-effecting calls across consent, commerce and events.
    pub fn side_effects(&self) -> usize {
        self.consent.created().len() + self.commerce.requests().len() + self.profiles.events().len()
    }
}
