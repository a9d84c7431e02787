//! Consent records.

use serde::{Deserialize, Serialize};

/// Age bracket recorded on a consent grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgeGroup {
    /// Eighteen or older.
    #[serde(rename = ">=18")]
    Adult,
    /// Under eighteen.
    #[serde(rename = "<18")]
    Minor,
}

/// Who granted the consent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantorType {
    /// The data subject themself.
    Owner,
    /// A legal guardian on the subject's behalf.
    Guardian,
}

/// Consent record status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentStatus {
    /// In force.
    #[default]
    Active,
    /// Withdrawn by the grantor.
    Revoked,
}

impl ConsentStatus {
    /// Query-string form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Revoked => "revoked",
        }
    }
}

/// Filter for consent record lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentFilter {
    /// Consent type, e.g. `big_data_donation_project`.
    pub record_type: String,
    /// Consent document version.
    pub version: u32,
    /// Only the latest record per type.
    pub latest: bool,
    /// Required status.
    pub status: ConsentStatus,
}

impl ConsentFilter {
    /// Latest active record of a type and version.
    pub fn latest_active(record_type: impl Into<String>, version: u32) -> Self {
        Self {
            record_type: record_type.into(),
            version,
            latest: true,
            status: ConsentStatus::Active,
        }
    }
}

/// Page selector for list calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// One-based page number.
    pub page: u32,
    /// Items per page.
    pub page_size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 10,
        }
    }
}

/// A stored consent record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentRecord {
    /// Record id.
    #[serde(default)]
    pub id: String,
    /// Consent type.
    #[serde(rename = "type")]
    pub record_type: String,
    /// Consent document version.
    pub version: u32,
    /// Record status.
    #[serde(default)]
    pub status: ConsentStatus,
    /// Age bracket at grant time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_group: Option<AgeGroup>,
    /// Grantor kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grantor_type: Option<GrantorType>,
    /// Name of the person who granted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
}

/// One page of consent records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecordList {
    /// Total matching records.
    #[serde(default)]
    pub count: u64,
    /// Records on this page.
    #[serde(default)]
    pub items: Vec<ConsentRecord>,
}

impl ConsentRecordList {
    /// True when no record matched.
    pub fn is_empty(&self) -> bool {
        self.count == 0 && self.items.is_empty()
    }
}

/// Body of a consent record creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewConsentRecord {
    /// Age bracket.
    pub age_group: AgeGroup,
    /// Grantor kind.
    pub grantor_type: GrantorType,
    /// Name of the person granting.
    pub owner_name: String,
    /// Consent type.
    #[serde(rename = "type")]
    pub record_type: String,
    /// Consent document version.
    pub version: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn new_record_wire_shape() {
        let record = NewConsentRecord {
            age_group: AgeGroup::Adult,
            grantor_type: GrantorType::Owner,
            owner_name: "Ada Lovelace".into(),
            record_type: "big_data_donation_project".into(),
            version: 1,
        };
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "ageGroup": ">=18",
                "grantorType": "owner",
                "ownerName": "Ada Lovelace",
                "type": "big_data_donation_project",
                "version": 1
            })
        );
    }

    #[test]
    fn stored_minor_guardian_record_decodes() {
        let record: ConsentRecord = serde_json::from_value(json!({
            "id": "c-9",
            "type": "big_data_donation_project",
            "version": 1,
            "status": "active",
            "ageGroup": "<18",
            "grantorType": "guardian"
        }))
        .unwrap();
        assert_eq!(record.age_group, Some(AgeGroup::Minor));
        assert_eq!(record.grantor_type, Some(GrantorType::Guardian));
    }
}
