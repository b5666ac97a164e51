//! Error types for the cascade orchestrator
//!
//! Terminal run states (success, exhaustion, cancellation) are values of
//! [`crate::cascade::Outcome`], not errors. The types here cover invalid
//! configuration, which is rejected before any attempt, and the failures
//! reported by pluggable capabilities.

use thiserror::Error;

/// Result type alias for orchestrator setup operations
pub type CascadeResult<T> = Result<T, CascadeError>;

/// Ladder validation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LadderError {
    /// Ladder has no tiers
    #[error("Tier ladder must contain at least one tier")]
    Empty,

    /// A tier has no attempt budget
    #[error("Tier '{tier}' has max_attempts = 0 (must be >= 1)")]
    ZeroAttempts { tier: String },

    /// Two tiers share a rank
    #[error("Duplicate tier rank {rank} ('{first}' and '{second}')")]
    DuplicateRank {
        rank: u32,
        first: String,
        second: String,
    },

    /// Reviewer is not more capable than the tier it reviews
    #[error("Tier '{tier}' (rank {rank}) names reviewer rank {reviewer_rank}, which is not above it")]
    ReviewerNotAbove {
        tier: String,
        rank: u32,
        reviewer_rank: u32,
    },

    /// Reviewer rank does not exist in the ladder
    #[error("Tier '{tier}' names reviewer rank {reviewer_rank}, which is not in the ladder")]
    UnknownReviewer { tier: String, reviewer_rank: u32 },
}

/// Errors that prevent a run from starting
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CascadeError {
    /// Ladder failed validation
    #[error("Invalid tier ladder: {0}")]
    InvalidLadder(#[from] LadderError),

    /// Controller configuration is unusable
    #[error("Invalid cascade configuration: {message}")]
    InvalidConfig { message: String },
}

impl CascadeError {
    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Why an executor could not produce output
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionFailure {
    /// Transient fault (connection, rate limit, backend hiccup); micro-retried
    #[error("infrastructure fault: {0}")]
    Infra(String),

    /// The tier tried and could not produce usable output
    #[error("logic failure: {0}")]
    Logic(String),

    /// The task is beyond this tier; skip its remaining budget
    #[error("escalation required: {0}")]
    EscalateRequired(String),
}

impl ExecutionFailure {
    pub fn infra(reason: impl Into<String>) -> Self {
        Self::Infra(reason.into())
    }

    pub fn logic(reason: impl Into<String>) -> Self {
        Self::Logic(reason.into())
    }

    pub fn escalate(reason: impl Into<String>) -> Self {
        Self::EscalateRequired(reason.into())
    }

    /// Whether the micro-retry policy applies
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Infra(_))
    }
}

/// Transient fault raised by a quality gate or review gate
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct InfraFault(pub String);

impl InfraFault {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ladder_error_converts_into_cascade_error() {
        let err: CascadeError = LadderError::Empty.into();
        assert_eq!(err, CascadeError::InvalidLadder(LadderError::Empty));
        assert!(err.to_string().contains("at least one tier"));
    }

    #[test]
    fn test_only_infra_is_transient() {
        assert!(ExecutionFailure::infra("503").is_transient());
        assert!(!ExecutionFailure::logic("bad").is_transient());
        assert!(!ExecutionFailure::escalate("too hard").is_transient());
    }
}
