//! HTTP client for the form-collection service.
//!
//! Responses are wrapped in an envelope
//! `{"responseCode": 200, "message": "success", "content": ...}`; an HTTP 200
//! with any other `responseCode` is an application error.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::http::HttpService;
use super::{SubmissionQuery, SubmissionSource};
use crate::config::FormsEndpoint;
use crate::error::{IntakeError, Result};
use crate::types::Submission;

const SERVICE: &str = "forms";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    response_code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    content: Value,
}

impl Envelope {
    fn into_content<T: DeserializeOwned>(self) -> Result<T> {
        if self.response_code != 200 {
            return Err(IntakeError::Application {
                service: SERVICE,
                code: self.response_code,
                message: self.message,
            });
        }
        if self.content.is_null() {
            return Err(IntakeError::decode(SERVICE, "response envelope has no content"));
        }
        serde_json::from_value(self.content).map_err(|e| IntakeError::decode(SERVICE, e))
    }
}

/// [`SubmissionSource`] over the form service's REST API.
#[derive(Debug, Clone)]
pub struct HttpSubmissionSource {
    http: HttpService,
    api_key: String,
}

impl HttpSubmissionSource {
    /// Creates a client from endpoint settings.
    pub fn new(endpoint: &FormsEndpoint) -> Result<Self> {
        Ok(Self {
            http: HttpService::new(
                SERVICE,
                &endpoint.url,
                Duration::from_millis(endpoint.timeout_ms),
            )?,
            api_key: endpoint.api_key.clone(),
        })
    }

    async fn get_content<T: DeserializeOwned>(
        &self,
        ctx: &CancellationToken,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let request = request.header("APIKEY", &self.api_key);
        let response = self.http.execute(ctx, request).await?.error_for_status()?;
        response.json::<Envelope>()?.into_content()
    }
}

#[async_trait]
impl SubmissionSource for HttpSubmissionSource {
    async fn list_submissions(
        &self,
        ctx: &CancellationToken,
        form_id: &str,
        query: &SubmissionQuery,
    ) -> Result<Vec<Submission>> {
        let url = self.http.endpoint(&["form", form_id, "submissions"]);
        let mut params = vec![
            ("limit", query.limit.to_string()),
            ("orderby", "id".to_string()),
            ("direction", "ASC".to_string()),
        ];
        if let Some(after) = &query.after_id {
            params.push(("filter", serde_json::json!({ "id:gt": after }).to_string()));
        }

        tracing::debug!(form_id, after = ?query.after_id, limit = query.limit, "listing submissions");
        let request = self.http.client().get(url).query(&params);
        self.get_content(ctx, request).await
    }

    async fn get_submission(
        &self,
        ctx: &CancellationToken,
        submission_id: &str,
    ) -> Result<Submission> {
        let url = self.http.endpoint(&["submission", submission_id]);
        let request = self.http.client().get(url);
        self.get_content(ctx, request).await
    }
}
