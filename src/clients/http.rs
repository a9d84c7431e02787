//! Shared `reqwest` plumbing: client construction, cancellation racing and
//! status mapping.

use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::until_cancelled;
use crate::error::{IntakeError, Result};

const MAX_ERROR_BODY: usize = 512;

/// Base URL plus a configured client for one service.
#[derive(Debug, Clone)]
pub(crate) struct HttpService {
    service: &'static str,
    base: String,
    client: reqwest::Client,
}

impl HttpService {
    pub(crate) fn new(service: &'static str, base_url: &str, timeout: Duration) -> Result<Self> {
        Url::parse(base_url).map_err(|e| {
            IntakeError::Config(format!("invalid {service} url {base_url:?}: {e}"))
        })?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IntakeError::Config(format!("failed to create {service} client: {e}")))?;
        Ok(Self {
            service,
            base: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub(crate) fn service(&self) -> &'static str {
        self.service
    }

    pub(crate) fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Appends `segments` to the base URL, percent-encoding each one so
    /// caller-supplied ids cannot add path segments or a query string.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> String {
        let mut url = self.base.clone();
        for segment in segments {
            url.push('/');
            url.push_str(&urlencoding::encode(segment));
        }
        url
    }

    /// Sends the request and reads the whole body, racing both against `ctx`.
    pub(crate) async fn execute(
        &self,
        ctx: &CancellationToken,
        request: RequestBuilder,
    ) -> Result<RawResponse> {
        let service = self.service;
        let exchange = async move {
            let response = request
                .send()
                .await
                .map_err(|e| IntakeError::upstream(service, e))?;
            let status = response.status();
            let body = response
                .bytes()
                .await
                .map_err(|e| IntakeError::upstream(service, e))?;
            Ok(RawResponse {
                service,
                status,
                body: body.to_vec(),
            })
        };

        until_cancelled(ctx, exchange).await
    }
}

/// A fully-read response.
#[derive(Debug)]
pub(crate) struct RawResponse {
    service: &'static str,
    pub(crate) status: StatusCode,
    pub(crate) body: Vec<u8>,
}

impl RawResponse {
    /// Passes 2xx responses through; anything else becomes [`IntakeError::Status`].
    pub(crate) fn error_for_status(self) -> Result<Self> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(self.into_status_error())
        }
    }

    pub(crate) fn into_status_error(self) -> IntakeError {
        let mut body = String::from_utf8_lossy(&self.body).into_owned();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        IntakeError::Status {
            service: self.service,
            status: self.status.as_u16(),
            body,
        }
    }

    pub(crate) fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| IntakeError::decode(self.service, e))
    }
}
