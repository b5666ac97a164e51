//! Review Gate — optional independent approval of passing output
//!
//! A tier may name a more capable reviewer tier (`reviewer_rank`). When a
//! review gate is configured, output from that tier that passed the quality
//! gate goes to the reviewer exactly once before the run can succeed.
//!
//! ```text
//! passing output ─→ ReviewGate::review
//!                      ├─ approve          → Outcome::Success
//!                      ├─ request_changes  → feedback, retry same tier (budget permitting)
//!                      └─ reject           → feedback, escalate to next tier
//! ```

use crate::error::InfraFault;
use crate::feedback::FeedbackEntry;
use crate::ladder::Tier;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Structured change request from a reviewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewFeedback {
    pub summary: String,
    /// Individual requested changes, most important first
    #[serde(default)]
    pub items: Vec<String>,
}

/// Reviewer verdict on a passing output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    RequestChanges { feedback: ReviewFeedback },
    Reject { confidence: f32, reason: String },
}

impl ReviewDecision {
    pub fn request_changes(summary: impl Into<String>, items: Vec<String>) -> Self {
        Self::RequestChanges {
            feedback: ReviewFeedback {
                summary: summary.into(),
                items,
            },
        }
    }

    /// Reject with the confidence clamped to 0.0–1.0
    pub fn reject(confidence: f32, reason: impl Into<String>) -> Self {
        Self::Reject {
            confidence: confidence.clamp(0.0, 1.0),
            reason: reason.into(),
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approve)
    }
}

impl std::fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approve => write!(f, "approve"),
            Self::RequestChanges { .. } => write!(f, "request_changes"),
            Self::Reject { .. } => write!(f, "reject"),
        }
    }
}

/// Independent reviewer of passing output
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReviewGate: Send + Sync {
    async fn review(
        &self,
        reviewer: &Tier,
        output: &str,
        feedback: &[FeedbackEntry],
    ) -> Result<ReviewDecision, InfraFault>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_clamps_confidence() {
        match ReviewDecision::reject(1.7, "wrong approach") {
            ReviewDecision::Reject { confidence, .. } => assert_eq!(confidence, 1.0),
            other => panic!("unexpected decision: {other}"),
        }
    }

    #[test]
    fn test_decision_serialization() {
        let json = serde_json::to_value(ReviewDecision::request_changes(
            "tighten error handling",
            vec!["map io errors".to_string()],
        ))
        .unwrap();
        assert_eq!(json["decision"], "request_changes");
        assert_eq!(json["feedback"]["items"][0], "map io errors");

        let parsed: ReviewDecision = serde_json::from_str(r#"{"decision":"approve"}"#).unwrap();
        assert!(parsed.is_approved());
    }

    #[tokio::test]
    async fn test_mock_review_gate() {
        let mut gate = MockReviewGate::new();
        gate.expect_review()
            .times(1)
            .returning(|_, _, _| Ok(ReviewDecision::Approve));

        let reviewer = Tier::new("frontier", 2, 1, 40);
        let decision = gate.review(&reviewer, "output", &[]).await.unwrap();
        assert_eq!(decision.to_string(), "approve");
    }
}
