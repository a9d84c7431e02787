//! HTTP client for the user service.

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

use super::http::HttpService;
use super::UserDirectory;
use crate::config::ServiceEndpoint;
use crate::error::Result;
use crate::types::User;

/// [`UserDirectory`] over `GET /users/{id}`.
#[derive(Debug, Clone)]
pub struct HttpUserDirectory {
    http: HttpService,
    token: String,
}

impl HttpUserDirectory {
    /// Creates a client from endpoint settings.
    pub fn new(endpoint: &ServiceEndpoint) -> Result<Self> {
        Ok(Self {
            http: HttpService::new("users", &endpoint.url, endpoint.timeout())?,
            token: endpoint.token.clone(),
        })
    }
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn get_user(&self, ctx: &CancellationToken, user_id: &str) -> Result<Option<User>> {
        let request = self
            .http
            .client()
            .get(self.http.endpoint(&["users", user_id]))
            .bearer_auth(&self.token);
        let response = self.http.execute(ctx, request).await?;
        if response.status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        response.error_for_status()?.json().map(Some)
    }
}
