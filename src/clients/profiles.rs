//! HTTP client for the profile service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

use super::http::HttpService;
use super::ProfileService;
use crate::config::ProfilesEndpoint;
use crate::error::Result;
use crate::types::{Profile, ProfileEvent, ProfileIdType};

/// [`ProfileService`] using bearer auth for reads and basic auth for event
/// writes.
#[derive(Debug, Clone)]
pub struct HttpProfileService {
    http: HttpService,
    token: String,
    event_username: String,
    event_password: String,
}

impl HttpProfileService {
    /// Creates a client from endpoint settings.
    pub fn new(endpoint: &ProfilesEndpoint) -> Result<Self> {
        Ok(Self {
            http: HttpService::new(
                "profiles",
                &endpoint.url,
                Duration::from_millis(endpoint.timeout_ms),
            )?,
            token: endpoint.token.clone(),
            event_username: endpoint.event_username.clone(),
            event_password: endpoint.event_password.clone(),
        })
    }
}

#[async_trait]
impl ProfileService for HttpProfileService {
    async fn get_profile(
        &self,
        ctx: &CancellationToken,
        id: &str,
        id_type: ProfileIdType,
    ) -> Result<Option<Profile>> {
        let request = self
            .http
            .client()
            .get(self.http.endpoint(&["profiles", id]))
            .query(&[("idType", id_type.as_str())])
            .bearer_auth(&self.token);
        let response = self.http.execute(ctx, request).await?;
        if response.status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        response.error_for_status()?.json().map(Some)
    }

    async fn send_event(
        &self,
        ctx: &CancellationToken,
        profile_id: &str,
        event: &ProfileEvent,
    ) -> Result<()> {
        let request = self
            .http
            .client()
            .post(self.http.endpoint(&["profiles", profile_id, "events"]))
            .basic_auth(&self.event_username, Some(&self.event_password))
            .json(event);
        self.http.execute(ctx, request).await?.error_for_status()?;
        tracing::debug!(profile_id, event = %event.name, "profile event sent");
        Ok(())
    }
}
