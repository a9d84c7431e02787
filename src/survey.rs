//! Survey answer rules: eligibility, validation and reward codes.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::SurveySettings;
use crate::types::Submission;

/// Length of generated discount codes.
pub const DISCOUNT_CODE_LEN: usize = 12;

/// Lowest age the consent flow accepts. Consent is always recorded as an
/// adult owner grant, so a lower configured minimum is raised to this.
pub const ADULT_AGE: u32 = 18;

/// 32 symbols without look-alikes (no `0`/`O`, `1`/`I`).
const CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Why an eligible respondent's answers were not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SurveyRejection {
    /// The name question is unanswered.
    #[error("full name is missing")]
    MissingName,
    /// The date-of-birth question is unanswered.
    #[error("date of birth is missing")]
    MissingDateOfBirth,
    /// The date of birth does not parse or lies in the future.
    #[error("invalid date of birth: {value}")]
    InvalidDateOfBirth {
        /// The answer as given.
        value: String,
    },
    /// The respondent is younger than the effective minimum age.
    #[error("respondent is {age}, below the minimum age of {minimum}")]
    Underage {
        /// Age in whole years.
        age: u32,
        /// Effective minimum, never below [`ADULT_AGE`].
        minimum: u32,
    },
}

/// Answers of an eligible respondent that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSurvey {
    /// Respondent's full name.
    pub full_name: String,
    /// Respondent's date of birth.
    pub date_of_birth: NaiveDate,
    /// Age in whole years on the validation date.
    pub age: u32,
}

/// Interprets the eligibility answer. Affirmative answers (`yes`, `true`,
/// `1`, `y`, any case) are eligible; everything else, including blank, is not.
pub fn parse_eligibility(answer: &str) -> bool {
    matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "yes" | "true" | "1" | "y"
    )
}

/// Whole years between `date_of_birth` and `today`.
pub fn age_on(date_of_birth: NaiveDate, today: NaiveDate) -> u32 {
    let mut years = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        years -= 1;
    }
    u32::try_from(years).unwrap_or(0)
}

/// Checks the name and date-of-birth answers of an eligible respondent.
pub fn validate_survey(
    submission: &Submission,
    settings: &SurveySettings,
    today: NaiveDate,
) -> Result<ValidatedSurvey, SurveyRejection> {
    let full_name = submission.text(&settings.name_field);
    if full_name.is_empty() {
        return Err(SurveyRejection::MissingName);
    }

    let dob_text = submission.text(&settings.date_of_birth_field);
    if dob_text.is_empty() {
        return Err(SurveyRejection::MissingDateOfBirth);
    }
    let date_of_birth = NaiveDate::parse_from_str(&dob_text, "%Y-%m-%d")
        .ok()
        .filter(|dob| *dob <= today)
        .ok_or_else(|| SurveyRejection::InvalidDateOfBirth {
            value: dob_text.clone(),
        })?;

    let age = age_on(date_of_birth, today);
    let minimum = settings.minimum_age.max(ADULT_AGE);
    if age < minimum {
        return Err(SurveyRejection::Underage { age, minimum });
    }

    Ok(ValidatedSurvey {
        full_name,
        date_of_birth,
        age,
    })
}

/// Derives the reward code for a submission.
///
/// The code is a pure function of the submission id, so a replayed
/// submission asks the commerce service for the same code again.
///
/// # Examples
///
/// ```
/// use survey_intake::survey::derive_discount_code;
///
/// let code = derive_discount_code("5830000000001");
/// assert_eq!(code.len(), 12);
/// assert_eq!(code, derive_discount_code("5830000000001"));
/// ```
pub fn derive_discount_code(submission_id: &str) -> String {
    let digest = Sha256::digest(submission_id.as_bytes());
    digest
        .iter()
        .take(DISCOUNT_CODE_LEN)
        .map(|byte| CODE_ALPHABET[usize::from(*byte) % CODE_ALPHABET.len()] as char)
        .collect()
}
