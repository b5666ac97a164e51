//! Feedback entries and the append-only feedback log

use crate::review::ReviewFeedback;
use crate::verifier::report::CheckResult;
use serde::{Deserialize, Serialize};

/// Failure taxonomy carried by a feedback entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// Output failed a blocking check; more attempts may fix it
    Logic,
    /// Infrastructure stayed down through every micro-retry
    Infra,
    /// The tier cannot handle the task; move up the ladder
    EscalateRequired,
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Logic => write!(f, "logic"),
            Self::Infra => write!(f, "infra"),
            Self::EscalateRequired => write!(f, "escalate-required"),
        }
    }
}

/// Which stage produced the feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackSource {
    QualityGate,
    Executor,
    Review,
}

/// One failing check, as carried forward to later attempts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedCheck {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<&CheckResult> for FailedCheck {
    fn from(check: &CheckResult) -> Self {
        Self {
            name: check.name.clone(),
            detail: check.detail.clone(),
        }
    }
}

/// Structured description of what failed and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDescription {
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_checks: Vec<FailedCheck>,
}

/// Why one attempt slot failed. Immutable once appended to a [`FeedbackLog`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    /// Position in the run's history, assigned on append
    pub seq: usize,
    pub tier_rank: u32,
    pub tier_name: String,
    pub attempt_index: u32,
    pub category: FailureCategory,
    pub source: FeedbackSource,
    pub description: FailureDescription,
    /// Guidance for the next attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl FeedbackEntry {
    pub fn new(
        tier_rank: u32,
        tier_name: impl Into<String>,
        attempt_index: u32,
        category: FailureCategory,
        source: FeedbackSource,
        description: FailureDescription,
    ) -> Self {
        Self {
            seq: 0,
            tier_rank,
            tier_name: tier_name.into(),
            attempt_index,
            category,
            source,
            description,
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Entry for a reviewer's `request_changes`
    pub fn changes_requested(
        tier_rank: u32,
        tier_name: impl Into<String>,
        attempt_index: u32,
        reviewer: &str,
        feedback: &ReviewFeedback,
    ) -> Self {
        let description = FailureDescription {
            summary: format!("reviewer '{}' requested changes: {}", reviewer, feedback.summary),
            failed_checks: feedback
                .items
                .iter()
                .map(|item| FailedCheck {
                    name: "review".to_string(),
                    detail: Some(item.clone()),
                })
                .collect(),
        };
        let entry = Self::new(
            tier_rank,
            tier_name,
            attempt_index,
            FailureCategory::Logic,
            FeedbackSource::Review,
            description,
        );
        match feedback.items.first() {
            Some(first) => entry.with_hint(first.clone()),
            None => entry,
        }
    }

    /// Entry for a reviewer's `reject`
    pub fn rejected(
        tier_rank: u32,
        tier_name: impl Into<String>,
        attempt_index: u32,
        reviewer: &str,
        confidence: f32,
        reason: &str,
    ) -> Self {
        Self::new(
            tier_rank,
            tier_name,
            attempt_index,
            FailureCategory::EscalateRequired,
            FeedbackSource::Review,
            FailureDescription {
                summary: format!(
                    "reviewer '{}' rejected the output (confidence {:.2}): {}",
                    reviewer, confidence, reason
                ),
                failed_checks: Vec::new(),
            },
        )
    }

    /// Entry for a review that could not be obtained; fails closed
    pub fn review_unavailable(
        tier_rank: u32,
        tier_name: impl Into<String>,
        attempt_index: u32,
        reviewer: &str,
        reason: &str,
    ) -> Self {
        Self::new(
            tier_rank,
            tier_name,
            attempt_index,
            FailureCategory::Infra,
            FeedbackSource::Review,
            FailureDescription {
                summary: format!("reviewer '{}' unavailable: {}", reviewer, reason),
                failed_checks: Vec::new(),
            },
        )
    }

    /// One-line rendering for logs and prompts
    pub fn headline(&self) -> String {
        format!(
            "#{} {} attempt {} [{}]: {}",
            self.seq, self.tier_name, self.attempt_index, self.category, self.description.summary
        )
    }
}

/// Append-only, ordered feedback history for one run.
///
/// Entries are numbered on append and only handed out as shared slices, so
/// a prefix never changes once written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedbackLog {
    entries: Vec<FeedbackEntry>,
}

impl FeedbackLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, assigning its sequence number
    pub fn append(&mut self, mut entry: FeedbackEntry) -> usize {
        let seq = self.entries.len();
        entry.seq = seq;
        self.entries.push(entry);
        seq
    }

    pub fn entries(&self) -> &[FeedbackEntry] {
        &self.entries
    }

    /// The history as it was when it had `len` entries
    pub fn prefix(&self, len: usize) -> &[FeedbackEntry] {
        &self.entries[..len.min(self.entries.len())]
    }

    pub fn last(&self) -> Option<&FeedbackEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most frequent category so far (ties go to the most recent)
    pub fn dominant_category(&self) -> Option<FailureCategory> {
        let mut best: Option<(FailureCategory, usize)> = None;
        for entry in self.entries.iter().rev() {
            let count = self
                .entries
                .iter()
                .filter(|e| e.category == entry.category)
                .count();
            match best {
                Some((_, best_count)) if count <= best_count => {}
                _ => best = Some((entry.category, count)),
            }
        }
        best.map(|(category, _)| category)
    }

    pub fn into_entries(self) -> Vec<FeedbackEntry> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(category: FailureCategory) -> FeedbackEntry {
        FeedbackEntry::new(
            0,
            "fast",
            1,
            category,
            FeedbackSource::QualityGate,
            FailureDescription {
                summary: "tests failed".to_string(),
                failed_checks: vec![],
            },
        )
    }

    #[test]
    fn test_append_assigns_sequence() {
        let mut log = FeedbackLog::new();
        assert_eq!(log.append(entry(FailureCategory::Logic)), 0);
        assert_eq!(log.append(entry(FailureCategory::Infra)), 1);
        assert_eq!(log.entries()[1].seq, 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_prefix_is_stable() {
        let mut log = FeedbackLog::new();
        log.append(entry(FailureCategory::Logic));
        let before: Vec<FeedbackEntry> = log.prefix(1).to_vec();
        log.append(entry(FailureCategory::EscalateRequired));
        log.append(entry(FailureCategory::Logic));
        assert_eq!(log.prefix(1), before.as_slice());
        assert_eq!(log.prefix(10).len(), 3);
    }

    #[test]
    fn test_dominant_category() {
        let mut log = FeedbackLog::new();
        assert_eq!(log.dominant_category(), None);
        log.append(entry(FailureCategory::Logic));
        log.append(entry(FailureCategory::Infra));
        log.append(entry(FailureCategory::Logic));
        assert_eq!(log.dominant_category(), Some(FailureCategory::Logic));
    }

    #[test]
    fn test_category_display() {
        assert_eq!(FailureCategory::EscalateRequired.to_string(), "escalate-required");
    }

    #[test]
    fn test_changes_requested_entry() {
        let feedback = ReviewFeedback {
            summary: "missing error handling".to_string(),
            items: vec!["handle timeout in fetch()".to_string()],
        };
        let e = FeedbackEntry::changes_requested(0, "fast", 2, "frontier", &feedback);
        assert_eq!(e.category, FailureCategory::Logic);
        assert_eq!(e.source, FeedbackSource::Review);
        assert_eq!(e.hint.as_deref(), Some("handle timeout in fetch()"));
        assert_eq!(e.description.failed_checks.len(), 1);
    }

    #[test]
    fn test_log_serializes_as_list() {
        let mut log = FeedbackLog::new();
        log.append(entry(FailureCategory::Logic));
        let json = serde_json::to_value(&log).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["category"], "logic");
    }
}
