//! Configuration for service endpoints, survey rules and job pacing.
//!
//! Typically loaded from a TOML file:
//!
//! ```toml
//! [forms]
//! url = "https://api.forms.example.com"
//! api_key = "form-api-key"
//!
//! [profiles]
//! url = "https://profiles.example.com/api"
//! token = "profile-read-token"
//! event_username = "intake"
//! event_password = "secret"
//!
//! [consent]
//! url = "https://consent.example.com"
//! token = "consent-token"
//!
//! [reconcile]
//! page_size = 100
//! max_items_per_run = 1000
//! ```
//!
//! Every section has defaults, so a partial file is valid.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{IntakeError, Result};
use crate::survey::ADULT_AGE;

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "SURVEY_INTAKE_";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntakeConfig {
    /// Form-collection service.
    #[serde(default)]
    pub forms: FormsEndpoint,

    /// Profile / marketing-automation service.
    #[serde(default)]
    pub profiles: ProfilesEndpoint,

    /// Consent-record service.
    #[serde(default)]
    pub consent: ServiceEndpoint,

    /// Commerce (discount code) service.
    #[serde(default)]
    pub commerce: ServiceEndpoint,

    /// User existence service.
    #[serde(default)]
    pub users: ServiceEndpoint,

    /// Survey field names and reward settings.
    #[serde(default)]
    pub survey: SurveySettings,

    /// Reconciliation paging and volume bounds.
    #[serde(default)]
    pub reconcile: ReconcileSettings,

    /// Recurring job pacing.
    #[serde(default)]
    pub job: JobSettings,
}

impl IntakeConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            IntakeError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string and validates it.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| IntakeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the pipeline cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.survey.minimum_age < ADULT_AGE {
            return Err(IntakeError::Config(format!(
                "survey.minimum_age must be at least {ADULT_AGE}, got {}",
                self.survey.minimum_age
            )));
        }
        Ok(())
    }

    /// Builds configuration from defaults overlaid with environment variables.
    ///
    /// Recognized variables (all prefixed with `SURVEY_INTAKE_`):
    /// `FORMS_URL`, `FORMS_API_KEY`, `PROFILES_URL`, `PROFILES_TOKEN`,
    /// `PROFILES_EVENT_USERNAME`, `PROFILES_EVENT_PASSWORD`, `CONSENT_URL`,
    /// `CONSENT_TOKEN`, `COMMERCE_URL`, `COMMERCE_TOKEN`, `USERS_URL`,
    /// `USERS_TOKEN`, `REWARD_PRODUCT_ID`, `PAGE_SIZE`, `MAX_ITEMS_PER_RUN`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|name| std::env::var(format!("{ENV_PREFIX}{name}")).ok());
        config
    }

    /// Overlays values produced by `lookup` (keyed without the prefix).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |target: &mut String, name: &str| {
            if let Some(value) = lookup(name) {
                *target = value;
            }
        };
        set(&mut self.forms.url, "FORMS_URL");
        set(&mut self.forms.api_key, "FORMS_API_KEY");
        set(&mut self.profiles.url, "PROFILES_URL");
        set(&mut self.profiles.token, "PROFILES_TOKEN");
        set(&mut self.profiles.event_username, "PROFILES_EVENT_USERNAME");
        set(&mut self.profiles.event_password, "PROFILES_EVENT_PASSWORD");
        set(&mut self.consent.url, "CONSENT_URL");
        set(&mut self.consent.token, "CONSENT_TOKEN");
        set(&mut self.commerce.url, "COMMERCE_URL");
        set(&mut self.commerce.token, "COMMERCE_TOKEN");
        set(&mut self.users.url, "USERS_URL");
        set(&mut self.users.token, "USERS_TOKEN");
        set(&mut self.survey.reward_product_id, "REWARD_PRODUCT_ID");

        if let Some(n) = lookup("PAGE_SIZE").and_then(|v| v.parse().ok()) {
            self.reconcile.page_size = n;
        }
        if let Some(n) = lookup("MAX_ITEMS_PER_RUN").and_then(|v| v.parse().ok()) {
            self.reconcile.max_items_per_run = n;
        }
    }

    /// Serializes the configuration to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| IntakeError::Config(e.to_string()))
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}

/// Base URL, bearer token and timeout for a JSON service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    /// Base URL; paths are appended to it.
    #[serde(default)]
    pub url: String,

    /// Bearer token sent as `Authorization: Bearer <token>`.
    #[serde(default)]
    pub token: String,

    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ServiceEndpoint {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ServiceEndpoint {
    /// Creates an endpoint with the default timeout.
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            timeout_ms: default_timeout_ms(),
        }
    }

    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Form-collection service; authenticates with a static API key header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormsEndpoint {
    /// Base URL of the form API.
    #[serde(default)]
    pub url: String,

    /// Static API key.
    #[serde(default)]
    pub api_key: String,

    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for FormsEndpoint {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Profile service; bearer token for reads, basic auth for event writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfilesEndpoint {
    /// Base URL of the profile API.
    #[serde(default)]
    pub url: String,

    /// Bearer token for profile reads.
    #[serde(default)]
    pub token: String,

    /// Basic-auth user for event writes.
    #[serde(default)]
    pub event_username: String,

    /// Basic-auth password for event writes.
    #[serde(default)]
    pub event_password: String,

    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ProfilesEndpoint {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            event_username: String::new(),
            event_password: String::new(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Names of the survey questions the pipeline reads, plus consent and
/// reward parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SurveySettings {
    /// Field holding the internal user id.
    pub user_id_field: String,
    /// Field holding the external participant id.
    pub participant_id_field: String,
    /// Field holding the eligibility answer.
    pub eligibility_field: String,
    /// Field holding the respondent's full name.
    pub name_field: String,
    /// Field holding the respondent's date of birth.
    pub date_of_birth_field: String,
    /// Consent record type to look up and create.
    pub consent_type: String,
    /// Consent record version to look up and create.
    pub consent_version: u32,
    /// Minimum age for the consent flow; at least 18.
    pub minimum_age: u32,
    /// Product the discount code is scoped to.
    pub reward_product_id: String,
    /// Prefix for the discount code title.
    pub reward_title_prefix: String,
    /// Name of the marketing event emitted per submission.
    pub event_name: String,
}

impl Default for SurveySettings {
    fn default() -> Self {
        Self {
            user_id_field: "userId".to_string(),
            participant_id_field: "participantId".to_string(),
            eligibility_field: "eligible".to_string(),
            name_field: "name".to_string(),
            date_of_birth_field: "dateOfBirth".to_string(),
            consent_type: "big_data_donation_project".to_string(),
            consent_version: 1,
            minimum_age: ADULT_AGE,
            reward_product_id: String::new(),
            reward_title_prefix: "Eligibility survey reward".to_string(),
            event_name: "Eligibility Survey Completed".to_string(),
        }
    }
}

/// Reconciliation paging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileSettings {
    /// Submissions requested per page.
    pub page_size: usize,
    /// Hard cap on submissions processed per invocation.
    pub max_items_per_run: usize,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_items_per_run: 1_000,
        }
    }
}

/// Recurring job pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    /// Seconds between scheduled runs.
    pub frequency_secs: u64,
    /// Wall-clock bound for one run, in seconds.
    pub processing_timeout_secs: u64,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            frequency_secs: 900,
            processing_timeout_secs: 600,
        }
    }
}

impl JobSettings {
    /// Interval between runs.
    pub fn frequency(&self) -> Duration {
        Duration::from_secs(self.frequency_secs)
    }

    /// Per-run timeout.
    pub fn processing_timeout(&self) -> Duration {
        Duration::from_secs(self.processing_timeout_secs)
    }
}
