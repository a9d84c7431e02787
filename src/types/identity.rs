//! Identity records returned by the profile and user services.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier triple linking a respondent across systems.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identifiers {
    /// Internal user id.
    #[serde(rename = "userId", default)]
    pub internal_user_id: String,
    /// External research-panel participant id.
    #[serde(rename = "participantId", default)]
    pub external_participant_id: String,
    /// External commerce customer id, when linked.
    #[serde(rename = "customerId", default, skip_serializing_if = "Option::is_none")]
    pub external_customer_id: Option<String>,
}

/// Which identifier a profile lookup is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileIdType {
    /// Internal user id.
    UserId,
    /// External participant id.
    ParticipantId,
}

impl ProfileIdType {
    /// Value of the `idType` query parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UserId => "userId",
            Self::ParticipantId => "participantId",
        }
    }
}

/// A profile as returned by the profile service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Profile id.
    #[serde(default)]
    pub id: String,
    /// Linked identifiers.
    #[serde(default)]
    pub identifiers: Identifiers,
    /// Free-form profile attributes.
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// A user known to the user service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User id.
    pub id: String,
    /// Contact address, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}
