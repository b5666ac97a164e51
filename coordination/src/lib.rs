//! Cascade Coordination Library
//!
//! Escalating tier-retry orchestration for tasks whose outputs are judged by
//! an external quality gate:
//! - Tier ladder: ordered capability tiers with attempt budgets and costs
//! - Feedback log: append-only, structured failure history per run
//! - Cascade controller: attempt loop, micro-retry of infra faults,
//!   escalation, optional independent review
//! - Cost accounting: per-run accountant and optional process-wide metrics
//!
//! Executors, quality gates and reviewers are traits; the embedding
//! application supplies implementations.
//!
//! # Usage
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use coordination::{
//! #     CascadeConfig, CascadeController, Executor, QualityGate, RetryPolicy, Task, Tier,
//! #     TierLadder, Timeouts,
//! # };
//! # use tokio_util::sync::CancellationToken;
//! # async fn demo(executor: Arc<dyn Executor>, gate: Arc<dyn QualityGate>) -> coordination::CascadeResult<()> {
//! let ladder = TierLadder::new(vec![
//!     Tier::new("fast", 0, 3, 1),
//!     Tier::new("frontier", 1, 2, 20),
//! ])?;
//! let config = CascadeConfig::new(
//!     RetryPolicy::new(2, 500, 5_000),
//!     Timeouts::new(120_000, 300_000, 120_000),
//! );
//! let controller = CascadeController::new(config, executor, gate)?;
//! let outcome = controller
//!     .run(Task::new("fix the failing parser test"), &ladder, &CancellationToken::new())
//!     .await?;
//! println!("{}", outcome.summary());
//! # Ok(())
//! # }
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod attempt;
pub mod cascade;
pub mod cost;
pub mod error;
pub mod executor;
pub mod feedback;
pub mod ladder;
pub mod review;
pub mod task;
pub mod verifier;

pub use attempt::{Attempt, AttemptResult};
pub use cascade::{
    CancelledReport, CascadeConfig, CascadeController, ExhaustedReport, Outcome, RetryPolicy,
    SuccessReport, Timeouts,
};
pub use cost::{CascadeMetrics, CostAccountant, MetricsSnapshot, RunStatus};
pub use error::{
    CascadeError, CascadeResult, ExecutionFailure, InfraFault, LadderError,
};
pub use executor::Executor;
pub use feedback::{
    FailedCheck, FailureCategory, FailureDescription, FeedbackEntry, FeedbackExtractor,
    FeedbackLog, FeedbackSource, ReportFeedbackExtractor,
};
pub use ladder::{Tier, TierLadder};
pub use review::{ReviewDecision, ReviewFeedback, ReviewGate};
pub use task::{RiskHint, Task};
pub use verifier::{CheckResult, CheckStatus, QualityGate, ValidationReport};
