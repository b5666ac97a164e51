//! Prompt text for the endpoint executor and reviewer.
//!
//! Prompt versioning: bump `PROMPT_VERSION` whenever preamble content changes
//! so telemetry can be correlated with the prompt that produced it.

use coordination::{FeedbackEntry, Task, Tier};
use std::fmt::Write;

/// Prompt version. Bump on any preamble content change.
pub const PROMPT_VERSION: &str = "1.2.0";

/// Marker an executor reply starts with to hand the task to a stronger tier.
pub const ESCALATE_MARKER: &str = "ESCALATE:";

pub const EXECUTOR_PREAMBLE: &str = "\
You are one tier in a cascade of increasingly capable workers. Produce the \
complete output for the task; it is checked by an automated quality gate.

## Rules
- Reply with the output only. No commentary before or after it.
- If earlier attempts failed, the failures are listed under \"Previous attempts\". \
  Fix every listed problem; do not repeat a rejected approach.
- If the task is clearly beyond what you can do, reply with a single line \
  starting with `ESCALATE:` followed by the reason. The task then moves to a \
  stronger tier without spending your remaining attempts.";

pub const REVIEWER_PREAMBLE: &str = "\
You review output that already passed automated checks. Judge whether it \
actually accomplishes the task and is safe to accept.

Reply with a single JSON object and nothing else:
- {\"decision\": \"approve\"}
- {\"decision\": \"request_changes\", \"summary\": \"...\", \"items\": [\"...\"]}
- {\"decision\": \"reject\", \"confidence\": 0.0-1.0, \"reason\": \"...\"}

Use `reject` only when the approach is wrong at its root and another attempt \
by the same worker would not help.";

/// Render the feedback history, oldest first
pub fn render_feedback(feedback: &[FeedbackEntry]) -> String {
    let mut out = String::new();
    for entry in feedback {
        let _ = writeln!(out, "- {}", entry.headline());
        for check in &entry.description.failed_checks {
            match &check.detail {
                Some(detail) => {
                    let _ = writeln!(out, "  - check `{}`:\n```\n{}\n```", check.name, detail);
                }
                None => {
                    let _ = writeln!(out, "  - check `{}`", check.name);
                }
            }
        }
        if let Some(hint) = &entry.hint {
            let _ = writeln!(out, "  - hint: {}", hint);
        }
    }
    out
}

/// User prompt for one attempt at `tier`
pub fn build_attempt_prompt(task: &Task, tier: &Tier, feedback: &[FeedbackEntry]) -> String {
    let mut prompt = format!("## Task\n\n{}\n", task.objective());
    if let Some(risk) = task.risk() {
        let _ = write!(prompt, "\n**Risk:** {}\n", risk);
    }
    if !task.context().is_null() {
        let context =
            serde_json::to_string_pretty(task.context()).unwrap_or_else(|_| task.context().to_string());
        let _ = write!(prompt, "\n## Context\n\n```json\n{}\n```\n", context);
    }
    if !feedback.is_empty() {
        let _ = write!(
            prompt,
            "\n## Previous attempts ({} failed)\n\n{}",
            feedback.len(),
            render_feedback(feedback)
        );
    }
    let _ = write!(prompt, "\n_Tier: {}_\n", tier);
    prompt
}

/// User prompt for a review of passing output
pub fn build_review_prompt(output: &str, feedback: &[FeedbackEntry]) -> String {
    let mut prompt = format!("## Output under review\n\n```\n{}\n```\n", output);
    if !feedback.is_empty() {
        let _ = write!(
            prompt,
            "\n## History of this task\n\n{}",
            render_feedback(feedback)
        );
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordination::{FailedCheck, FailureCategory, FailureDescription, FeedbackSource, RiskHint};

    fn entry() -> FeedbackEntry {
        FeedbackEntry::new(
            0,
            "fast",
            1,
            FailureCategory::Logic,
            FeedbackSource::QualityGate,
            FailureDescription {
                summary: "blocking check 'tests' failed".to_string(),
                failed_checks: vec![FailedCheck {
                    name: "tests".to_string(),
                    detail: Some("src/lib.rs:3: expected 4".to_string()),
                }],
            },
        )
        .with_hint("start at src/lib.rs:3")
    }

    #[test]
    fn test_attempt_prompt_without_history() {
        let task = Task::new("add a checked_div helper").with_risk(RiskHint::Low);
        let prompt = build_attempt_prompt(&task, &Tier::new("fast", 0, 3, 1), &[]);
        assert!(prompt.contains("add a checked_div helper"));
        assert!(prompt.contains("**Risk:** low"));
        assert!(!prompt.contains("Previous attempts"));
        assert!(!prompt.contains("## Context"));
    }

    #[test]
    fn test_attempt_prompt_renders_feedback() {
        let task = Task::new("fix").with_context(serde_json::json!({"file": "src/lib.rs"}));
        let prompt = build_attempt_prompt(&task, &Tier::new("fast", 0, 3, 1), &[entry()]);
        assert!(prompt.contains("## Context"));
        assert!(prompt.contains("Previous attempts (1 failed)"));
        assert!(prompt.contains("check `tests`"));
        assert!(prompt.contains("src/lib.rs:3: expected 4"));
        assert!(prompt.contains("hint: start at src/lib.rs:3"));
    }

    #[test]
    fn test_review_prompt() {
        let prompt = build_review_prompt("fn f() {}", &[]);
        assert!(prompt.contains("fn f() {}"));
        assert!(!prompt.contains("History"));
    }
}
