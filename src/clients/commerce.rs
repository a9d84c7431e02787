//! HTTP client for the commerce service.

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

use super::http::HttpService;
use super::CommerceService;
use crate::config::ServiceEndpoint;
use crate::error::Result;
use crate::types::DiscountCodeRequest;

/// [`CommerceService`] over `POST /discount-codes`.
///
/// `409 Conflict` and `422 Unprocessable Entity` mean the code already
/// exists and are reported as success.
#[derive(Debug, Clone)]
pub struct HttpCommerceService {
    http: HttpService,
    token: String,
}

impl HttpCommerceService {
    /// Creates a client from endpoint settings.
    pub fn new(endpoint: &ServiceEndpoint) -> Result<Self> {
        Ok(Self {
            http: HttpService::new("commerce", &endpoint.url, endpoint.timeout())?,
            token: endpoint.token.clone(),
        })
    }
}

#[async_trait]
impl CommerceService for HttpCommerceService {
    async fn create_discount_code(
        &self,
        ctx: &CancellationToken,
        request: &DiscountCodeRequest,
    ) -> Result<()> {
        let http_request = self
            .http
            .client()
            .post(self.http.endpoint(&["discount-codes"]))
            .bearer_auth(&self.token)
            .json(request);
        let response = self.http.execute(ctx, http_request).await?;
        match response.status {
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                tracing::info!(
                    code = %request.code,
                    service = self.http.service(),
                    "discount code already exists"
                );
                Ok(())
            },
            _ => response.error_for_status().map(|_| ()),
        }
    }
}
