//! Attempt records — one per executor invocation
//!
//! Attempts are append-only. A tier-level attempt slot may hold several
//! records when infra faults are micro-retried; the first record of a slot
//! has `micro_retry == 0`.

use crate::error::ExecutionFailure;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a single executor invocation produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptResult {
    /// Raw output, still to be validated
    Output { output: String },
    /// Transient fault or timeout
    Infra { reason: String },
    /// Executor gave up without output
    Logic { reason: String },
    /// Executor signalled the task is beyond this tier
    EscalateRequired { reason: String },
}

impl AttemptResult {
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Output { output } => Some(output),
            _ => None,
        }
    }

    pub fn is_infra(&self) -> bool {
        matches!(self, Self::Infra { .. })
    }

    /// Failure reason, if the invocation produced no output
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Output { .. } => None,
            Self::Infra { reason } | Self::Logic { reason } | Self::EscalateRequired { reason } => {
                Some(reason)
            }
        }
    }
}

impl From<Result<String, ExecutionFailure>> for AttemptResult {
    fn from(result: Result<String, ExecutionFailure>) -> Self {
        match result {
            Ok(output) => Self::Output { output },
            Err(ExecutionFailure::Infra(reason)) => Self::Infra { reason },
            Err(ExecutionFailure::Logic(reason)) => Self::Logic { reason },
            Err(ExecutionFailure::EscalateRequired(reason)) => Self::EscalateRequired { reason },
        }
    }
}

/// Immutable record of one executor invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    /// Position in the run's attempt log (0-based)
    pub seq: usize,
    pub tier_rank: u32,
    pub tier_name: String,
    /// Attempt slot within the tier (1-based)
    pub attempt_index: u32,
    /// Micro-retry number within the slot (0 = first invocation)
    pub micro_retry: u32,
    /// Length of the feedback history handed to the executor
    pub history_len: usize,
    pub result: AttemptResult,
    pub cost: u64,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl Attempt {
    /// Whether this record opened a new attempt slot
    pub fn is_slot_start(&self) -> bool {
        self.micro_retry == 0
    }
}
