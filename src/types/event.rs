//! Outbound payloads: profile events and discount codes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An event appended to a profile's timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileEvent {
    /// Event name.
    pub name: String,
    /// Event id; the submission id, so replays collapse downstream.
    pub id: String,
    /// Event payload.
    pub data: Value,
}

/// Payload of the survey-completed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyCompletedData {
    /// Whether the respondent answered the eligibility question positively.
    pub eligible: bool,
    /// Issued reward code, for eligible respondents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_code: Option<String>,
}

/// Body of a discount code creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountCodeRequest {
    /// Display title.
    pub title: String,
    /// The code itself.
    pub code: String,
    /// Product the code applies to.
    pub product_id: String,
}
