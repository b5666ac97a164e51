//! Executor — the pluggable capability that performs work at a tier

use crate::error::ExecutionFailure;
use crate::feedback::FeedbackEntry;
use crate::ladder::Tier;
use crate::task::Task;
use async_trait::async_trait;

/// Performs a task at a given tier.
///
/// `feedback` is the full history accumulated so far in this run, oldest
/// first. Implementations report transient faults as
/// [`ExecutionFailure::Infra`] so the controller can micro-retry them
/// without spending attempt budget.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(
        &self,
        task: &Task,
        tier: &Tier,
        feedback: &[FeedbackEntry],
    ) -> Result<String, ExecutionFailure>;
}
