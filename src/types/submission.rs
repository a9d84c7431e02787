//! Form submissions and their polymorphic answers.
//!
//! The form service reports each answer with a runtime `type` tag. Decoding
//! goes through [`ANSWER_DECODERS`], a table from tag to decoder function;
//! tags that are not in the table, and entries whose payload does not fit
//! their tag, decode to "absent" and are dropped.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

/// One answer of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Free-text field.
    Textbox {
        /// Question name.
        name: String,
        /// Answer text.
        text: String,
    },
    /// First/last name pair.
    FullName {
        /// Question name.
        name: String,
        /// Given name.
        first: String,
        /// Family name.
        last: String,
    },
    /// Calendar date, normalized to `YYYY-MM-DD` when the parts are known.
    DateTime {
        /// Question name.
        name: String,
        /// Normalized date text.
        date: String,
    },
}

impl Answer {
    /// Creates a textbox answer.
    pub fn textbox(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Textbox {
            name: name.into(),
            text: text.into(),
        }
    }

    /// Creates a full-name answer.
    pub fn full_name(
        name: impl Into<String>,
        first: impl Into<String>,
        last: impl Into<String>,
    ) -> Self {
        Self::FullName {
            name: name.into(),
            first: first.into(),
            last: last.into(),
        }
    }

    /// Creates a date answer.
    pub fn date_time(name: impl Into<String>, date: impl Into<String>) -> Self {
        Self::DateTime {
            name: name.into(),
            date: date.into(),
        }
    }

    /// The question name this answer belongs to.
    pub fn field_name(&self) -> &str {
        match self {
            Self::Textbox { name, .. }
            | Self::FullName { name, .. }
            | Self::DateTime { name, .. } => name,
        }
    }

    /// The answer flattened to trimmed text.
    ///
    /// # Examples
    ///
    /// ```
    /// use survey_intake::types::Answer;
    ///
    /// let answer = Answer::full_name("name", " Ada ", "Lovelace");
    /// assert_eq!(answer.text_value(), "Ada Lovelace");
    /// ```
    pub fn text_value(&self) -> String {
        match self {
            Self::Textbox { text, .. } => text.trim().to_string(),
            Self::FullName { first, last, .. } => {
                let parts: Vec<&str> = [first.trim(), last.trim()]
                    .into_iter()
                    .filter(|p| !p.is_empty())
                    .collect();
                parts.join(" ")
            },
            Self::DateTime { date, .. } => date.trim().to_string(),
        }
    }
}

/// Decoder signature used by the dispatch table.
pub type AnswerDecoder = fn(String, &RawAnswer) -> Option<Answer>;

/// Answer kinds understood by the decoder, keyed by the form service's tag.
pub const ANSWER_DECODERS: &[(&str, AnswerDecoder)] = &[
    ("control_textbox", decode_textbox),
    ("control_fullname", decode_full_name),
    ("control_datetime", decode_date_time),
];

/// Answer entry as delivered by the form service.
#[derive(Debug, Clone, Deserialize)]
pub struct RawAnswer {
    /// Question name.
    #[serde(default)]
    pub name: Option<String>,
    /// Answer kind tag, e.g. `control_textbox`.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Kind-specific payload.
    #[serde(default)]
    pub answer: Option<Value>,
}

impl RawAnswer {
    /// Decodes through [`ANSWER_DECODERS`]; unknown kinds yield `None`.
    pub fn decode(&self) -> Option<Answer> {
        let name = self.name.clone().filter(|n| !n.is_empty())?;
        let kind = self.kind.as_deref()?;
        let (_, decoder) = ANSWER_DECODERS.iter().find(|(tag, _)| *tag == kind)?;
        decoder(name, self)
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn decode_textbox(name: String, raw: &RawAnswer) -> Option<Answer> {
    let text = raw.answer.as_ref().and_then(value_text)?;
    Some(Answer::Textbox { name, text })
}

fn decode_full_name(name: String, raw: &RawAnswer) -> Option<Answer> {
    let parts = raw.answer.as_ref()?.as_object()?;
    let first = parts.get("first").and_then(value_text).unwrap_or_default();
    let last = parts.get("last").and_then(value_text).unwrap_or_default();
    Some(Answer::FullName { name, first, last })
}

fn decode_date_time(name: String, raw: &RawAnswer) -> Option<Answer> {
    let date = match raw.answer.as_ref()? {
        Value::String(s) => s.split_whitespace().next().unwrap_or_default().to_string(),
        Value::Object(parts) => {
            if let Some(dt) = parts.get("datetime").and_then(value_text) {
                dt.split_whitespace().next().unwrap_or_default().to_string()
            } else {
                let year = parts.get("year").and_then(value_text)?;
                let month = parts.get("month").and_then(value_text)?;
                let day = parts.get("day").and_then(value_text)?;
                format!("{:0>4}-{:0>2}-{:0>2}", year.trim(), month.trim(), day.trim())
            }
        },
        _ => return None,
    };
    Some(Answer::DateTime { name, date })
}

/// A form response. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawSubmission")]
pub struct Submission {
    /// Submission id; lexically ordered and monotonic per form.
    pub id: String,
    /// Form the submission belongs to.
    pub form_id: String,
    /// Decoded answers, in question order.
    pub answers: Vec<Answer>,
    /// When the respondent submitted.
    pub created_at: DateTime<Utc>,
}

impl Submission {
    /// Creates a submission with no answers, stamped now.
    pub fn new(id: impl Into<String>, form_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            form_id: form_id.into(),
            answers: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Appends an answer.
    pub fn with_answer(mut self, answer: Answer) -> Self {
        self.answers.push(answer);
        self
    }

    /// Finds the answer for a question name.
    pub fn answer(&self, field_name: &str) -> Option<&Answer> {
        self.answers.iter().find(|a| a.field_name() == field_name)
    }

    /// Trimmed text of a question's answer; empty when absent.
    pub fn text(&self, field_name: &str) -> String {
        self.answer(field_name)
            .map(Answer::text_value)
            .unwrap_or_default()
    }
}

/// Submission as delivered by the form service.
#[derive(Debug, Deserialize)]
struct RawSubmission {
    id: Value,
    form_id: Value,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    answers: Value,
}

impl TryFrom<RawSubmission> for Submission {
    type Error = String;

    fn try_from(raw: RawSubmission) -> Result<Self, Self::Error> {
        let id = value_text(&raw.id).ok_or("submission id must be a string or number")?;
        let form_id = value_text(&raw.form_id).ok_or("form_id must be a string or number")?;
        let created_at = match raw.created_at.as_deref() {
            Some(text) => parse_created_at(text)
                .ok_or_else(|| format!("unrecognized created_at timestamp: {text}"))?,
            None => Utc::now(),
        };

        Ok(Self {
            id,
            form_id,
            answers: decode_answers(&raw.answers),
            created_at,
        })
    }
}

/// Decodes the `answers` payload, which is an object keyed by question id
/// or, for empty submissions, an empty array.
pub fn decode_answers(value: &Value) -> Vec<Answer> {
    let entries: Vec<&Value> = match value {
        Value::Object(map) => {
            let ordered: BTreeMap<QuestionKey<'_>, &Value> =
                map.iter().map(|(k, v)| (QuestionKey(k), v)).collect();
            ordered.into_values().collect()
        },
        Value::Array(items) => items.iter().collect(),
        _ => Vec::new(),
    };

    entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value::<RawAnswer>(entry.clone()).ok())
        .filter_map(|raw| raw.decode())
        .collect()
}

/// Orders numeric question ids numerically, others lexically after them.
#[derive(PartialEq, Eq)]
struct QuestionKey<'a>(&'a str);

impl Ord for QuestionKey<'_> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (self.0.parse::<u64>(), other.0.parse::<u64>()) {
            (Ok(a), Ok(b)) => a.cmp(&b),
            (Ok(_), Err(_)) => std::cmp::Ordering::Less,
            (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
            (Err(_), Err(_)) => self.0.cmp(other.0),
        }
    }
}

impl PartialOrd for QuestionKey<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

fn parse_created_at(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}
