//! Survey submission intake.
//!
//! Turns completed eligibility-survey submissions from a form-collection
//! service into downstream side effects: a consent record, a discount code
//! and a profile event. Each submission is processed at most once, recorded
//! by a marker in a [`DedupStore`](survey_intake_dedup::DedupStore).
//!
//! # Overview
//!
//! A recurring [`ReconcileJob`] walks a form's submissions in id order,
//! resuming from a checkpoint stored in its job metadata. Each submission
//! goes through the [`SubmissionProcessor`], which skips submissions that
//! were already handled, are incomplete, or cannot be attributed to a known
//! respondent.
//!
//! # Module Organization
//!
//! - [`types`] - Submissions, answers and service payloads
//! - [`clients`] - Service traits and their HTTP implementations
//! - [`identity`] - Cross-system identity check
//! - [`survey`] - Eligibility, validation and discount codes
//! - [`processor`] - The per-submission pipeline
//! - [`reconcile`] - Resumable paging over a form's submissions
//! - [`job`] - Recurring-job contract and the reconcile job
//! - [`config`] - TOML and environment configuration
//! - [`error`] - Error types

pub mod clients;
pub mod config;
pub mod error;
pub mod identity;
pub mod job;
#[cfg(feature = "logging")]
pub mod logging;
pub mod processor;
pub mod reconcile;
pub mod survey;
pub mod types;

// Re-exports for ergonomic access
pub use clients::Services;
pub use config::IntakeConfig;
pub use error::{IntakeError, Result};
pub use job::{Job, JobOutcome, ReconcileJob, RecurringJobProcessor};
pub use processor::{ProcessOutcome, SkipReason, SubmissionHandler, SubmissionProcessor};
pub use reconcile::{ReconcileFailure, ReconcileResult, Reconciler};
pub use survey_intake_dedup as dedup;
