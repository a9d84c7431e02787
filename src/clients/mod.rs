//! Service boundaries the pipeline depends on.
//!
//! Each remote service is a trait so the processor and reconciler can be
//! driven by in-process fakes. The `http-client` feature adds `reqwest`
//! implementations of every trait. All calls take the caller's
//! [`CancellationToken`] and return [`IntakeError::Cancelled`] once it fires;
//! callers race marker-store calls the same way through `until_cancelled`.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use survey_intake_dedup::DedupStore;
use tokio_util::sync::CancellationToken;

use crate::error::{IntakeError, Result};
use crate::types::{
    ConsentFilter, ConsentRecord, ConsentRecordList, DiscountCodeRequest, NewConsentRecord,
    Pagination, Profile, ProfileEvent, ProfileIdType, Submission, User,
};

#[cfg(feature = "http-client")]
mod http;
#[cfg(feature = "http-client")]
mod commerce;
#[cfg(feature = "http-client")]
mod consent;
#[cfg(feature = "http-client")]
mod forms;
#[cfg(feature = "http-client")]
mod profiles;
#[cfg(feature = "http-client")]
mod users;

#[cfg(feature = "http-client")]
pub use commerce::HttpCommerceService;
#[cfg(feature = "http-client")]
pub use consent::HttpConsentService;
#[cfg(feature = "http-client")]
pub use forms::HttpSubmissionSource;
#[cfg(feature = "http-client")]
pub use profiles::HttpProfileService;
#[cfg(feature = "http-client")]
pub use users::HttpUserDirectory;

/// Page request for [`SubmissionSource::list_submissions`].
///
/// Results are always ascending by submission id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionQuery {
    /// Only submissions with an id strictly greater than this.
    pub after_id: Option<String>,
    /// Maximum number of submissions to return.
    pub limit: usize,
}

impl SubmissionQuery {
    /// Builds a query from a checkpoint cursor; an empty cursor means
    /// "from the beginning".
    pub fn after(cursor: &str, limit: usize) -> Self {
        Self {
            after_id: (!cursor.is_empty()).then(|| cursor.to_string()),
            limit,
        }
    }
}

/// Form-collection service.
#[async_trait]
pub trait SubmissionSource: Send + Sync {
    /// Lists one page of a form's submissions, ascending by id.
    async fn list_submissions(
        &self,
        ctx: &CancellationToken,
        form_id: &str,
        query: &SubmissionQuery,
    ) -> Result<Vec<Submission>>;

    /// Fetches a single submission.
    async fn get_submission(&self, ctx: &CancellationToken, submission_id: &str)
        -> Result<Submission>;
}

/// Profile / marketing-automation service.
#[async_trait]
pub trait ProfileService: Send + Sync {
    /// Looks up a profile; `Ok(None)` when it does not exist.
    async fn get_profile(
        &self,
        ctx: &CancellationToken,
        id: &str,
        id_type: ProfileIdType,
    ) -> Result<Option<Profile>>;

    /// Appends an event to a profile's timeline.
    async fn send_event(
        &self,
        ctx: &CancellationToken,
        profile_id: &str,
        event: &ProfileEvent,
    ) -> Result<()>;
}

/// Consent-record service.
#[async_trait]
pub trait ConsentService: Send + Sync {
    /// Lists a user's consent records matching `filter`.
    async fn list_records(
        &self,
        ctx: &CancellationToken,
        user_id: &str,
        filter: &ConsentFilter,
        page: &Pagination,
    ) -> Result<ConsentRecordList>;

    /// Creates a consent record for a user.
    async fn create_record(
        &self,
        ctx: &CancellationToken,
        user_id: &str,
        record: &NewConsentRecord,
    ) -> Result<ConsentRecord>;
}

/// Commerce service.
#[async_trait]
pub trait CommerceService: Send + Sync {
    /// Creates a discount code. A code that already exists counts as success.
    async fn create_discount_code(
        &self,
        ctx: &CancellationToken,
        request: &DiscountCodeRequest,
    ) -> Result<()>;
}

/// User existence lookups.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Looks up a user; `Ok(None)` when it does not exist.
    async fn get_user(&self, ctx: &CancellationToken, user_id: &str) -> Result<Option<User>>;
}

/// Every collaborator the pipeline needs, behind trait objects.
#[derive(Clone)]
pub struct Services {
    /// Form-collection service.
    pub submissions: Arc<dyn SubmissionSource>,
    /// Profile service.
    pub profiles: Arc<dyn ProfileService>,
    /// Consent-record service.
    pub consent: Arc<dyn ConsentService>,
    /// Commerce service.
    pub commerce: Arc<dyn CommerceService>,
    /// User existence service.
    pub users: Arc<dyn UserDirectory>,
    /// Processed-submission markers.
    pub markers: Arc<dyn DedupStore>,
}

#[cfg(feature = "http-client")]
impl Services {
    /// Builds HTTP clients for every service in `config`.
    pub fn from_config(
        config: &crate::config::IntakeConfig,
        markers: Arc<dyn DedupStore>,
    ) -> Result<Self> {
        Ok(Self {
            submissions: Arc::new(HttpSubmissionSource::new(&config.forms)?),
            profiles: Arc::new(HttpProfileService::new(&config.profiles)?),
            consent: Arc::new(HttpConsentService::new(&config.consent)?),
            commerce: Arc::new(HttpCommerceService::new(&config.commerce)?),
            users: Arc::new(HttpUserDirectory::new(&config.users)?),
            markers,
        })
    }
}

/// Fails fast when the context is already cancelled.
pub(crate) fn ensure_active(ctx: &CancellationToken) -> Result<()> {
    if ctx.is_cancelled() {
        Err(IntakeError::Cancelled)
    } else {
        Ok(())
    }
}

/// Drives `call` to completion unless `ctx` is cancelled first.
pub(crate) async fn until_cancelled<T, F>(ctx: &CancellationToken, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    ensure_active(ctx)?;
    tokio::select! {
        biased;
        () = ctx.cancelled() => Err(IntakeError::Cancelled),
        result = call => result,
    }
}
