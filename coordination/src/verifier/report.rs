//! Validation Report — structured output from a quality gate
//!
//! A report passes iff every blocking check passes. Advisory failures never
//! block success but are carried into the successful outcome for visibility.

use serde::{Deserialize, Serialize};

/// Status of a single named check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Fail,
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}

/// Result of one named check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Check name (tests, lint, typecheck, ...)
    pub name: String,
    pub status: CheckStatus,
    /// Whether a failure of this check blocks success
    pub blocking: bool,
    /// What the check reported (truncated output, failing assertion, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Guidance for the next attempt, if the check can offer any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
}

impl CheckResult {
    /// A passing blocking check
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Pass,
            blocking: true,
            detail: None,
            hint: None,
            duration_ms: 0,
        }
    }

    /// A failing blocking check
    pub fn fail(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Fail,
            blocking: true,
            detail: Some(detail.into()),
            hint: None,
            duration_ms: 0,
        }
    }

    /// Mark as advisory (non-blocking)
    pub fn advisory(mut self) -> Self {
        self.blocking = false;
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn is_pass(&self) -> bool {
        self.status == CheckStatus::Pass
    }

    /// Failed and blocking
    pub fn is_blocking_failure(&self) -> bool {
        self.blocking && self.status == CheckStatus::Fail
    }
}

/// Complete report from one quality gate run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub checks: Vec<CheckResult>,
    /// Set when the gate itself (not the output) was unavailable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infra_fault: Option<String>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list of checks
    pub fn from_checks(checks: Vec<CheckResult>) -> Self {
        Self {
            checks,
            infra_fault: None,
        }
    }

    /// Report for an attempt that produced no usable output
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self::from_checks(vec![CheckResult::fail("executor_output", reason)])
    }

    /// Report for a gate that stayed unavailable through every micro-retry
    pub fn gate_unavailable(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            checks: vec![CheckResult::fail("quality_gate", reason.clone())],
            infra_fault: Some(reason),
        }
    }

    pub fn push(&mut self, check: CheckResult) {
        self.checks.push(check);
    }

    /// True iff every blocking check passed
    pub fn passed(&self) -> bool {
        !self.checks.iter().any(CheckResult::is_blocking_failure)
    }

    pub fn blocking_failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| c.is_blocking_failure())
    }

    pub fn advisory_failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks
            .iter()
            .filter(|c| !c.blocking && c.status == CheckStatus::Fail)
    }

    /// Compact summary for logging
    pub fn summary(&self) -> String {
        let statuses: Vec<String> = self
            .checks
            .iter()
            .map(|c| {
                if c.blocking {
                    format!("{}:{}", c.name, c.status)
                } else {
                    format!("{}:{}(advisory)", c.name, c.status)
                }
            })
            .collect();

        format!(
            "[{}] {} blocking failure(s) [{}]",
            if self.passed() { "GREEN" } else { "RED" },
            self.blocking_failures().count(),
            statuses.join(" → "),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_status_display() {
        assert_eq!(CheckStatus::Pass.to_string(), "PASS");
        assert_eq!(CheckStatus::Fail.to_string(), "FAIL");
    }

    #[test]
    fn test_advisory_failure_does_not_block() {
        let report = ValidationReport::from_checks(vec![
            CheckResult::pass("tests"),
            CheckResult::fail("lint", "2 warnings").advisory(),
        ]);
        assert!(report.passed());
        assert_eq!(report.advisory_failures().count(), 1);
        assert_eq!(report.blocking_failures().count(), 0);
        assert!(report.summary().contains("GREEN"));
        assert!(report.summary().contains("lint:FAIL(advisory)"));
    }

    #[test]
    fn test_blocking_failure_fails_report() {
        let mut report = ValidationReport::new();
        report.push(CheckResult::pass("lint"));
        report.push(CheckResult::fail("tests", "assertion failed"));
        assert!(!report.passed());
        let names: Vec<&str> = report.blocking_failures().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["tests"]);
        assert!(report.summary().starts_with("[RED] 1 blocking"));
    }

    #[test]
    fn test_empty_report_passes() {
        assert!(ValidationReport::new().passed());
    }

    #[test]
    fn test_degraded_and_unavailable_always_fail() {
        let degraded = ValidationReport::degraded("no output");
        assert!(!degraded.passed());
        assert!(degraded.infra_fault.is_none());

        let unavailable = ValidationReport::gate_unavailable("gate timed out");
        assert!(!unavailable.passed());
        assert_eq!(unavailable.infra_fault.as_deref(), Some("gate timed out"));
    }
}
