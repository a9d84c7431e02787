//! HTTP client for the consent-record service.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::http::HttpService;
use super::ConsentService;
use crate::config::ServiceEndpoint;
use crate::error::Result;
use crate::types::{ConsentFilter, ConsentRecord, ConsentRecordList, NewConsentRecord, Pagination};

/// [`ConsentService`] over `/users/{id}/consent-records`.
#[derive(Debug, Clone)]
pub struct HttpConsentService {
    http: HttpService,
    token: String,
}

impl HttpConsentService {
    /// Creates a client from endpoint settings.
    pub fn new(endpoint: &ServiceEndpoint) -> Result<Self> {
        Ok(Self {
            http: HttpService::new("consent", &endpoint.url, endpoint.timeout())?,
            token: endpoint.token.clone(),
        })
    }

    fn records_url(&self, user_id: &str) -> String {
        self.http.endpoint(&["users", user_id, "consent-records"])
    }
}

#[async_trait]
impl ConsentService for HttpConsentService {
    async fn list_records(
        &self,
        ctx: &CancellationToken,
        user_id: &str,
        filter: &ConsentFilter,
        page: &Pagination,
    ) -> Result<ConsentRecordList> {
        let params = [
            ("type", filter.record_type.clone()),
            ("version", filter.version.to_string()),
            ("latest", filter.latest.to_string()),
            ("status", filter.status.as_str().to_string()),
            ("page", page.page.to_string()),
            ("pageSize", page.page_size.to_string()),
        ];
        let request = self
            .http
            .client()
            .get(self.records_url(user_id))
            .query(&params)
            .bearer_auth(&self.token);
        self.http.execute(ctx, request).await?.error_for_status()?.json()
    }

    async fn create_record(
        &self,
        ctx: &CancellationToken,
        user_id: &str,
        record: &NewConsentRecord,
    ) -> Result<ConsentRecord> {
        let request = self
            .http
            .client()
            .post(self.records_url(user_id))
            .bearer_auth(&self.token)
            .json(record);
        self.http.execute(ctx, request).await?.error_for_status()?.json()
    }
}
