//! Cross-system identity check for a respondent.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::clients::{ProfileService, UserDirectory};
use crate::error::Result;
use crate::processor::SkipReason;
use crate::types::{Identifiers, ProfileIdType};

/// Outcome of [`IdentityValidator::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityCheck {
    /// Both identifiers resolve to the same respondent.
    Verified(Identifiers),
    /// The submission cannot be attributed; skip it.
    Rejected(SkipReason),
}

/// Confirms that the user id and participant id in a submission belong to
/// the same, existing person.
#[derive(Clone)]
pub struct IdentityValidator {
    profiles: Arc<dyn ProfileService>,
    users: Arc<dyn UserDirectory>,
}

impl IdentityValidator {
    /// Creates a validator over the given services.
    pub fn new(profiles: Arc<dyn ProfileService>, users: Arc<dyn UserDirectory>) -> Self {
        Self { profiles, users }
    }

    /// Validates the raw identifiers from a submission.
    ///
    /// Inputs are trimmed. Blank identifiers, an unknown profile, a
    /// participant mismatch or an unknown user are soft rejections; service
    /// failures are errors. On success the profile's own identifiers are
    /// returned, never the submitted strings.
    pub async fn validate(
        &self,
        ctx: &CancellationToken,
        user_id: &str,
        participant_id: &str,
    ) -> Result<IdentityCheck> {
        let user_id = user_id.trim();
        let participant_id = participant_id.trim();
        if user_id.is_empty() || participant_id.is_empty() {
            return Ok(IdentityCheck::Rejected(SkipReason::MissingIdentity));
        }

        let Some(profile) = self
            .profiles
            .get_profile(ctx, user_id, ProfileIdType::UserId)
            .await?
        else {
            tracing::info!(user_id, "no profile for user id");
            return Ok(IdentityCheck::Rejected(SkipReason::ProfileNotFound));
        };

        let recorded = profile.identifiers.external_participant_id.trim();
        if recorded != participant_id {
            tracing::warn!(
                user_id,
                submitted = participant_id,
                recorded,
                "participant id does not match profile"
            );
            return Ok(IdentityCheck::Rejected(SkipReason::ParticipantMismatch));
        }

        if self.users.get_user(ctx, user_id).await?.is_none() {
            tracing::info!(user_id, "user does not exist");
            return Ok(IdentityCheck::Rejected(SkipReason::UserNotFound));
        }

        Ok(IdentityCheck::Verified(profile.identifiers))
    }
}
