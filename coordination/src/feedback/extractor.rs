//! Feedback Extractor — failed validation report → one feedback entry
//!
//! Extraction is a pure function of the report and the attempt that
//! produced it, so a run can be replayed deterministically. Exactly one
//! entry is produced per call, which keeps
//! `total_attempts == feedback.len() + success` intact.

use crate::attempt::{Attempt, AttemptResult};
use crate::feedback::entry::{
    FailedCheck, FailureCategory, FailureDescription, FeedbackEntry, FeedbackSource,
};
use crate::verifier::report::ValidationReport;
use regex::Regex;
use std::sync::LazyLock;

/// `path/to/file.ext:LINE` references inside check output
static LOCATION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z0-9_./\\-]+\.[A-Za-z0-9]+):(\d+)").unwrap());

/// Upper bound on carried check detail, to keep prompts compact
const MAX_DETAIL_CHARS: usize = 2048;

/// Turns a failed report into exactly one feedback entry
pub trait FeedbackExtractor: Send + Sync {
    fn extract(&self, report: &ValidationReport, attempt: &Attempt) -> FeedbackEntry;
}

/// Default extractor working from blocking check results
#[derive(Debug, Clone, Default)]
pub struct ReportFeedbackExtractor;

impl ReportFeedbackExtractor {
    pub fn new() -> Self {
        Self
    }

    fn category(report: &ValidationReport, attempt: &Attempt) -> FailureCategory {
        match &attempt.result {
            AttemptResult::EscalateRequired { .. } => FailureCategory::EscalateRequired,
            AttemptResult::Infra { .. } => FailureCategory::Infra,
            _ if report.infra_fault.is_some() => FailureCategory::Infra,
            _ => FailureCategory::Logic,
        }
    }

    fn source(attempt: &Attempt) -> FeedbackSource {
        match attempt.result {
            AttemptResult::Output { .. } => FeedbackSource::QualityGate,
            _ => FeedbackSource::Executor,
        }
    }

    fn summary(report: &ValidationReport, attempt: &Attempt) -> String {
        if let Some(reason) = attempt.result.failure_reason() {
            return match &attempt.result {
                AttemptResult::Infra { .. } => format!(
                    "executor unavailable after {} micro-retries: {}",
                    attempt.micro_retry, reason
                ),
                AttemptResult::EscalateRequired { .. } => {
                    format!("executor requested escalation: {}", reason)
                }
                _ => format!("executor produced no output: {}", reason),
            };
        }

        let names: Vec<&str> = report.blocking_failures().map(|c| c.name.as_str()).collect();
        match names.len() {
            0 => "output rejected by quality gate".to_string(),
            1 => format!("blocking check '{}' failed", names[0]),
            n => format!("{} blocking checks failed: {}", n, names.join(", ")),
        }
    }

    fn hint(report: &ValidationReport, category: FailureCategory) -> Option<String> {
        if let Some(hint) = report.blocking_failures().find_map(|c| c.hint.clone()) {
            return Some(hint);
        }

        let location = report
            .blocking_failures()
            .filter_map(|c| c.detail.as_deref())
            .find_map(|detail| LOCATION_PATTERN.captures(detail))
            .map(|caps| format!("start at {}:{}", &caps[1], &caps[2]));
        if location.is_some() {
            return location;
        }

        match category {
            FailureCategory::Infra => {
                Some("previous attempt hit an infrastructure fault; retry unchanged".to_string())
            }
            FailureCategory::EscalateRequired => None,
            FailureCategory::Logic => report
                .blocking_failures()
                .next()
                .map(|c| format!("make check '{}' pass", c.name)),
        }
    }
}

fn truncate(detail: &str) -> String {
    if detail.chars().count() <= MAX_DETAIL_CHARS {
        return detail.to_string();
    }
    let mut cut: String = detail.chars().take(MAX_DETAIL_CHARS).collect();
    cut.push_str("…[truncated]");
    cut
}

impl FeedbackExtractor for ReportFeedbackExtractor {
    fn extract(&self, report: &ValidationReport, attempt: &Attempt) -> FeedbackEntry {
        let category = Self::category(report, attempt);
        let failed_checks = report
            .blocking_failures()
            .map(|check| {
                let mut failed = FailedCheck::from(check);
                failed.detail = failed.detail.as_deref().map(truncate);
                failed
            })
            .collect();

        let entry = FeedbackEntry::new(
            attempt.tier_rank,
            attempt.tier_name.clone(),
            attempt.attempt_index,
            category,
            Self::source(attempt),
            FailureDescription {
                summary: Self::summary(report, attempt),
                failed_checks,
            },
        );

        match Self::hint(report, category) {
            Some(hint) => entry.with_hint(hint),
            None => entry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::report::CheckResult;
    use chrono::Utc;

    fn attempt(result: AttemptResult) -> Attempt {
        Attempt {
            seq: 3,
            tier_rank: 1,
            tier_name: "standard".to_string(),
            attempt_index: 2,
            micro_retry: 0,
            history_len: 1,
            result,
            cost: 5,
            duration_ms: 10,
            timestamp: Utc::now(),
        }
    }

    fn output() -> AttemptResult {
        AttemptResult::Output {
            output: "fn main() {}".to_string(),
        }
    }

    #[test]
    fn test_logic_failure_from_blocking_check() {
        let report = ValidationReport::from_checks(vec![
            CheckResult::pass("fmt"),
            CheckResult::fail("tests", "thread 'it_works' panicked at src/lib.rs:42:9"),
            CheckResult::fail("lint", "unused import").advisory(),
        ]);
        let entry = ReportFeedbackExtractor::new().extract(&report, &attempt(output()));

        assert_eq!(entry.category, FailureCategory::Logic);
        assert_eq!(entry.source, FeedbackSource::QualityGate);
        assert_eq!(entry.tier_rank, 1);
        assert_eq!(entry.attempt_index, 2);
        assert_eq!(entry.description.summary, "blocking check 'tests' failed");
        assert_eq!(entry.description.failed_checks.len(), 1);
        assert_eq!(entry.hint.as_deref(), Some("start at src/lib.rs:42"));
    }

    #[test]
    fn test_check_hint_wins_over_location() {
        let report = ValidationReport::from_checks(vec![CheckResult::fail(
            "typecheck",
            "src/a.rs:3 expected u32",
        )
        .with_hint("return a u32 from parse()")]);
        let entry = ReportFeedbackExtractor::new().extract(&report, &attempt(output()));
        assert_eq!(entry.hint.as_deref(), Some("return a u32 from parse()"));
    }

    #[test]
    fn test_escalate_required_category() {
        let report = ValidationReport::degraded("needs architecture change");
        let entry = ReportFeedbackExtractor::new().extract(
            &report,
            &attempt(AttemptResult::EscalateRequired {
                reason: "needs architecture change".to_string(),
            }),
        );
        assert_eq!(entry.category, FailureCategory::EscalateRequired);
        assert_eq!(entry.source, FeedbackSource::Executor);
        assert!(entry.description.summary.contains("requested escalation"));
    }

    #[test]
    fn test_exhausted_infra_category() {
        let mut infra = attempt(AttemptResult::Infra {
            reason: "connection refused".to_string(),
        });
        infra.micro_retry = 2;
        let report = ValidationReport::degraded("connection refused");
        let entry = ReportFeedbackExtractor::new().extract(&report, &infra);
        assert_eq!(entry.category, FailureCategory::Infra);
        assert!(entry.description.summary.contains("after 2 micro-retries"));
        assert!(entry.hint.is_some());
    }

    #[test]
    fn test_gate_unavailable_is_infra() {
        let report = ValidationReport::gate_unavailable("gate timed out after 50ms");
        let entry = ReportFeedbackExtractor::new().extract(&report, &attempt(output()));
        assert_eq!(entry.category, FailureCategory::Infra);
        assert_eq!(entry.source, FeedbackSource::QualityGate);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let report = ValidationReport::from_checks(vec![
            CheckResult::fail("tests", "2 failed"),
            CheckResult::fail("lint", "x"),
        ]);
        let a = attempt(output());
        let extractor = ReportFeedbackExtractor::new();
        let first = extractor.extract(&report, &a);
        let second = extractor.extract(&report, &a);
        assert_eq!(first, second);
        assert_eq!(first.description.summary, "2 blocking checks failed: tests, lint");
        assert_eq!(first.hint.as_deref(), Some("make check 'tests' pass"));
    }

    #[test]
    fn test_long_detail_truncated() {
        let report =
            ValidationReport::from_checks(vec![CheckResult::fail("tests", "x".repeat(5000))]);
        let entry = ReportFeedbackExtractor::new().extract(&report, &attempt(output()));
        let detail = entry.description.failed_checks[0].detail.as_deref().unwrap();
        assert!(detail.ends_with("[truncated]"));
        assert!(detail.chars().count() < 5000);
    }
}
