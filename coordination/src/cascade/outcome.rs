//! Outcome — the terminal record of a cascade run
//!
//! Produced exactly once per run and handed to the caller; the controller
//! keeps no reference. Serializes with a `status` tag so it can be emitted
//! as-is for external persistence.

use crate::attempt::Attempt;
use crate::feedback::{FailureCategory, FeedbackEntry};
use crate::review::ReviewDecision;
use crate::verifier::report::CheckResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Run ended with output that passed validation (and review, if configured)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessReport {
    pub task_id: Uuid,
    pub tier: String,
    pub tier_rank: u32,
    pub total_attempts: u32,
    pub total_cost: u64,
    pub elapsed_ms: u64,
    pub feedback_history: Vec<FeedbackEntry>,
    pub attempts: Vec<Attempt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewDecision>,
    /// Non-blocking check failures on the accepted output
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advisories: Vec<CheckResult>,
    /// The accepted output
    pub output: String,
}

/// Every tier's budget was spent without an accepted output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExhaustedReport {
    pub task_id: Uuid,
    pub total_attempts: u32,
    pub total_cost: u64,
    pub elapsed_ms: u64,
    pub feedback_history: Vec<FeedbackEntry>,
    pub attempts: Vec<Attempt>,
    /// Human-readable handoff note
    pub recommendation: String,
}

/// Caller cancelled the run; carries whatever had accumulated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelledReport {
    pub task_id: Uuid,
    pub total_attempts: u32,
    pub total_cost: u64,
    pub elapsed_ms: u64,
    pub feedback_history: Vec<FeedbackEntry>,
    pub attempts: Vec<Attempt>,
    /// Tier in flight when cancellation was observed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
}

/// Terminal result of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success(SuccessReport),
    Exhausted(ExhaustedReport),
    Cancelled(CancelledReport),
}

impl Outcome {
    /// Status label (`success`, `exhausted`, `cancelled`)
    pub fn status(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Exhausted(_) => "exhausted",
            Self::Cancelled(_) => "cancelled",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn task_id(&self) -> Uuid {
        match self {
            Self::Success(r) => r.task_id,
            Self::Exhausted(r) => r.task_id,
            Self::Cancelled(r) => r.task_id,
        }
    }

    /// Attempt slots consumed across all tiers (micro-retries excluded)
    pub fn total_attempts(&self) -> u32 {
        match self {
            Self::Success(r) => r.total_attempts,
            Self::Exhausted(r) => r.total_attempts,
            Self::Cancelled(r) => r.total_attempts,
        }
    }

    pub fn total_cost(&self) -> u64 {
        match self {
            Self::Success(r) => r.total_cost,
            Self::Exhausted(r) => r.total_cost,
            Self::Cancelled(r) => r.total_cost,
        }
    }

    pub fn feedback_history(&self) -> &[FeedbackEntry] {
        match self {
            Self::Success(r) => &r.feedback_history,
            Self::Exhausted(r) => &r.feedback_history,
            Self::Cancelled(r) => &r.feedback_history,
        }
    }

    /// Every executor invocation, micro-retries included
    pub fn attempts(&self) -> &[Attempt] {
        match self {
            Self::Success(r) => &r.attempts,
            Self::Exhausted(r) => &r.attempts,
            Self::Cancelled(r) => &r.attempts,
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        match self {
            Self::Success(r) => r.elapsed_ms,
            Self::Exhausted(r) => r.elapsed_ms,
            Self::Cancelled(r) => r.elapsed_ms,
        }
    }

    /// Compact summary for logging
    pub fn summary(&self) -> String {
        match self {
            Self::Success(r) => format!(
                "success tier={} attempts={} cost={} feedback={}",
                r.tier,
                r.total_attempts,
                r.total_cost,
                r.feedback_history.len()
            ),
            Self::Exhausted(r) => format!(
                "exhausted attempts={} cost={} feedback={}",
                r.total_attempts,
                r.total_cost,
                r.feedback_history.len()
            ),
            Self::Cancelled(r) => format!(
                "cancelled attempts={} cost={} feedback={}",
                r.total_attempts,
                r.total_cost,
                r.feedback_history.len()
            ),
        }
    }
}

/// Handoff note for an exhausted run
pub(crate) fn recommendation(
    tiers_tried: &[String],
    total_attempts: u32,
    dominant: Option<FailureCategory>,
    last: Option<&FeedbackEntry>,
) -> String {
    let mut text = format!(
        "All {} tier(s) exhausted ({}) after {} attempt(s); human review required.",
        tiers_tried.len(),
        tiers_tried.join(" → "),
        total_attempts,
    );
    if let Some(category) = dominant {
        text.push_str(&format!(" Dominant failure category: {}.", category));
        if category == FailureCategory::Infra {
            text.push_str(" Check executor and gate infrastructure before retrying.");
        }
    }
    if let Some(entry) = last {
        text.push_str(&format!(" Last failure: {}.", entry.description.summary));
    }
    text
}
