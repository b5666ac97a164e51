//! Cascade Controller — drives one task up the tier ladder
//!
//! Attempts within a run are strictly sequential: each executor call sees
//! the complete feedback history of every earlier slot. The only repetition
//! inside a slot is the bounded micro-retry of infra faults, which resolves
//! before the run moves on.
//!
//! ```text
//! for tier in ladder (ascending rank):
//!     for slot in 1..=tier.max_attempts:
//!         execute (timeout, micro-retry infra) ─→ validate (timeout, micro-retry infra)
//!           ├─ RED   → extract one FeedbackEntry
//!           │            └─ escalate-required → next tier
//!           └─ GREEN → review (if configured)
//!                        ├─ approve / none     → Outcome::Success
//!                        ├─ request_changes    → feedback, next slot
//!                        └─ reject             → feedback, next tier
//! Outcome::Exhausted
//! ```

use crate::attempt::{Attempt, AttemptResult};
use crate::cascade::config::CascadeConfig;
use crate::cascade::outcome::{
    recommendation, CancelledReport, ExhaustedReport, Outcome, SuccessReport,
};
use crate::cost::{CascadeMetrics, CostAccountant, RunStatus};
use crate::error::CascadeResult;
use crate::executor::Executor;
use crate::feedback::{
    FailureCategory, FeedbackEntry, FeedbackExtractor, FeedbackLog, ReportFeedbackExtractor,
};
use crate::ladder::{Tier, TierLadder};
use crate::review::{ReviewDecision, ReviewGate};
use crate::task::Task;
use crate::verifier::{QualityGate, ValidationReport};
use chrono::Utc;
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// State owned by a single run; never shared across tasks
struct RunState {
    task: Task,
    feedback: FeedbackLog,
    attempts: Vec<Attempt>,
    accountant: CostAccountant,
    started: Instant,
    tiers_tried: Vec<String>,
}

impl RunState {
    fn new(task: Task) -> Self {
        Self {
            task,
            feedback: FeedbackLog::new(),
            attempts: Vec::new(),
            accountant: CostAccountant::new(),
            started: Instant::now(),
            tiers_tried: Vec::new(),
        }
    }

    fn record_attempt(
        &mut self,
        tier: &Tier,
        attempt_index: u32,
        micro_retry: u32,
        history_len: usize,
        result: AttemptResult,
        duration: Duration,
    ) -> Attempt {
        self.accountant.add(tier.unit_cost);
        self.accountant.record_elapsed(duration);

        let attempt = Attempt {
            seq: self.attempts.len(),
            tier_rank: tier.rank,
            tier_name: tier.name.clone(),
            attempt_index,
            micro_retry,
            history_len,
            result,
            cost: tier.unit_cost,
            duration_ms: duration.as_millis() as u64,
            timestamp: Utc::now(),
        };
        self.attempts.push(attempt.clone());
        attempt
    }

    fn append_feedback(&mut self, entry: FeedbackEntry) {
        let seq = self.feedback.append(entry);
        if let Some(entry) = self.feedback.last() {
            info!(
                task_id = %self.task.id(),
                seq,
                category = %entry.category,
                "Feedback: {}",
                entry.description.summary
            );
        }
    }

    /// Attempt slots consumed; micro-retries share their slot
    fn slots_used(&self) -> u32 {
        self.attempts.iter().filter(|a| a.is_slot_start()).count() as u32
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// What the review step decided for a passing output
enum ReviewStep {
    /// Output accepted; carries the decision if a review took place
    Accepted(Option<ReviewDecision>),
    /// Changes requested; try the next slot at this tier
    Retry,
    /// Rejected; move to the next tier
    Escalate,
    Cancelled,
}

/// Drives tasks through a [`TierLadder`]
pub struct CascadeController {
    config: CascadeConfig,
    executor: Arc<dyn Executor>,
    gate: Arc<dyn QualityGate>,
    extractor: Arc<dyn FeedbackExtractor>,
    review_gate: Option<Arc<dyn ReviewGate>>,
    metrics: Option<Arc<CascadeMetrics>>,
}

impl CascadeController {
    /// Create a controller; rejects invalid configuration up front
    pub fn new(
        config: CascadeConfig,
        executor: Arc<dyn Executor>,
        gate: Arc<dyn QualityGate>,
    ) -> CascadeResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            executor,
            gate,
            extractor: Arc::new(ReportFeedbackExtractor::new()),
            review_gate: None,
            metrics: None,
        })
    }

    /// Replace the default [`ReportFeedbackExtractor`]
    pub fn with_extractor(mut self, extractor: Arc<dyn FeedbackExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Review passing output of tiers that name a reviewer rank
    pub fn with_review_gate(mut self, review_gate: Arc<dyn ReviewGate>) -> Self {
        self.review_gate = Some(review_gate);
        self
    }

    /// Report into a process-wide aggregator owned by the caller
    pub fn with_metrics(mut self, metrics: Arc<CascadeMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    /// Run one task to a terminal [`Outcome`].
    ///
    /// Returns `Err` only for configuration problems, before any attempt is
    /// made. Exhaustion and cancellation are outcomes.
    pub async fn run(
        &self,
        task: Task,
        ladder: &TierLadder,
        cancel: &CancellationToken,
    ) -> CascadeResult<Outcome> {
        self.config.validate()?;

        let mut run = RunState::new(task);
        if let Some(metrics) = &self.metrics {
            metrics.record_run_started();
        }
        info!(
            task_id = %run.task.id(),
            ladder = %ladder.summary(),
            budget = ladder.total_budget(),
            "Cascade run starting"
        );

        for (position, tier) in ladder.tiers().iter().enumerate() {
            if position > 0 {
                if let Some(metrics) = &self.metrics {
                    metrics.record_escalation();
                }
            }
            run.tiers_tried.push(tier.name.clone());
            info!(
                task_id = %run.task.id(),
                tier = %tier,
                max_attempts = tier.max_attempts,
                history = run.feedback.len(),
                "Entering tier"
            );

            let mut attempt_index = 0;
            while attempt_index < tier.max_attempts {
                if cancel.is_cancelled() {
                    return Ok(self.finish_cancelled(run, Some(tier)));
                }
                attempt_index += 1;

                let Some(attempt) = self.execute_slot(&mut run, tier, attempt_index, cancel).await
                else {
                    return Ok(self.finish_cancelled(run, Some(tier)));
                };
                if cancel.is_cancelled() {
                    return Ok(self.finish_cancelled(run, Some(tier)));
                }

                let (report, output) = match &attempt.result {
                    AttemptResult::Output { output } => {
                        match self.validate(output, cancel).await {
                            Some(report) => (report, Some(output.as_str())),
                            None => return Ok(self.finish_cancelled(run, Some(tier))),
                        }
                    }
                    other => (
                        ValidationReport::degraded(other.failure_reason().unwrap_or("no output")),
                        None,
                    ),
                };
                if cancel.is_cancelled() {
                    return Ok(self.finish_cancelled(run, Some(tier)));
                }
                debug!(
                    task_id = %run.task.id(),
                    tier = %tier,
                    attempt = attempt_index,
                    "Validation: {}",
                    report.summary()
                );

                let accepted = if report.passed() { output } else { None };
                let Some(output) = accepted else {
                    let entry = self.extractor.extract(&report, &attempt);
                    let escalate = entry.category == FailureCategory::EscalateRequired;
                    run.append_feedback(entry);
                    if escalate {
                        info!(
                            task_id = %run.task.id(),
                            tier = %tier,
                            skipped = tier.max_attempts - attempt_index,
                            "Executor requested escalation; skipping remaining tier budget"
                        );
                        break;
                    }
                    continue;
                };

                match self
                    .review(&mut run, ladder, tier, attempt_index, output, cancel)
                    .await
                {
                    ReviewStep::Accepted(review) => {
                        return Ok(self.finish_success(run, tier, output, review, &report));
                    }
                    ReviewStep::Retry => continue,
                    ReviewStep::Escalate => break,
                    ReviewStep::Cancelled => return Ok(self.finish_cancelled(run, Some(tier))),
                }
            }

            match ladder.next_after(tier.rank) {
                Some(next) => info!(
                    task_id = %run.task.id(),
                    from = %tier,
                    to = %next,
                    "Escalating"
                ),
                None => info!(task_id = %run.task.id(), tier = %tier, "Final tier spent"),
            }
        }

        Ok(self.finish_exhausted(run))
    }

    /// Run independent tasks concurrently, each with its own history and
    /// accountant. Results are returned in input order.
    pub async fn run_batch(
        &self,
        tasks: Vec<Task>,
        ladder: &TierLadder,
        concurrency: usize,
        cancel: &CancellationToken,
    ) -> Vec<CascadeResult<Outcome>> {
        futures::stream::iter(tasks)
            .map(|task| self.run(task, ladder, cancel))
            .buffered(concurrency.max(1))
            .collect()
            .await
    }

    /// Execute one attempt slot, micro-retrying infra faults.
    ///
    /// Returns the slot's final attempt record, or `None` if cancelled
    /// during backoff.
    async fn execute_slot(
        &self,
        run: &mut RunState,
        tier: &Tier,
        attempt_index: u32,
        cancel: &CancellationToken,
    ) -> Option<Attempt> {
        let mut micro_retry = 0;
        loop {
            let history_len = run.feedback.len();
            let started = Instant::now();
            let result: AttemptResult = match tokio::time::timeout(
                self.config.timeouts.executor(),
                self.executor.execute(&run.task, tier, run.feedback.entries()),
            )
            .await
            {
                Ok(result) => result.into(),
                Err(_) => AttemptResult::Infra {
                    reason: format!(
                        "executor timed out after {}ms",
                        self.config.timeouts.executor_ms
                    ),
                },
            };

            let attempt = run.record_attempt(
                tier,
                attempt_index,
                micro_retry,
                history_len,
                result,
                started.elapsed(),
            );
            if let Some(metrics) = &self.metrics {
                metrics.record_invocation(tier.unit_cost, attempt.is_slot_start());
            }
            debug!(
                task_id = %run.task.id(),
                tier = %tier,
                attempt = attempt_index,
                micro_retry,
                cost = attempt.cost,
                total_cost = run.accountant.total(),
                "Executor returned"
            );

            let retryable =
                attempt.result.is_infra() && micro_retry < self.config.retry.micro_retries;
            if !retryable {
                return Some(attempt);
            }

            micro_retry += 1;
            let delay = self.config.retry.backoff(micro_retry);
            warn!(
                task_id = %run.task.id(),
                tier = %tier,
                attempt = attempt_index,
                micro_retry,
                max_micro_retries = self.config.retry.micro_retries,
                backoff_ms = delay.as_millis() as u64,
                reason = attempt.result.failure_reason().unwrap_or_default(),
                "Executor infra fault; retrying same slot"
            );
            if !backoff(delay, cancel).await {
                return None;
            }
        }
    }

    /// Validate output, micro-retrying gate infra faults at no cost.
    ///
    /// Returns `None` if cancelled during backoff.
    async fn validate(&self, output: &str, cancel: &CancellationToken) -> Option<ValidationReport> {
        let mut retry = 0;
        loop {
            let fault = match tokio::time::timeout(
                self.config.timeouts.gate(),
                self.gate.validate(output),
            )
            .await
            {
                Ok(Ok(report)) => return Some(report),
                Ok(Err(fault)) => fault.0,
                Err(_) => format!(
                    "quality gate timed out after {}ms",
                    self.config.timeouts.gate_ms
                ),
            };

            if retry >= self.config.retry.micro_retries {
                warn!(reason = %fault, "Quality gate unavailable; failing attempt");
                return Some(ValidationReport::gate_unavailable(fault));
            }

            retry += 1;
            let delay = self.config.retry.backoff(retry);
            warn!(
                retry,
                backoff_ms = delay.as_millis() as u64,
                reason = %fault,
                "Quality gate infra fault; retrying"
            );
            if !backoff(delay, cancel).await {
                return None;
            }
        }
    }

    /// Obtain the reviewer's decision, failing closed if it cannot be had
    async fn request_review(
        &self,
        gate: &dyn ReviewGate,
        reviewer: &Tier,
        output: &str,
        feedback: &[FeedbackEntry],
        cancel: &CancellationToken,
    ) -> Option<Result<ReviewDecision, String>> {
        let mut retry = 0;
        loop {
            let fault = match tokio::time::timeout(
                self.config.timeouts.review(),
                gate.review(reviewer, output, feedback),
            )
            .await
            {
                Ok(Ok(decision)) => return Some(Ok(decision)),
                Ok(Err(fault)) => fault.0,
                Err(_) => format!(
                    "review timed out after {}ms",
                    self.config.timeouts.review_ms
                ),
            };

            if retry >= self.config.retry.micro_retries {
                return Some(Err(fault));
            }

            retry += 1;
            let delay = self.config.retry.backoff(retry);
            warn!(
                reviewer = %reviewer,
                retry,
                backoff_ms = delay.as_millis() as u64,
                reason = %fault,
                "Review infra fault; retrying"
            );
            if !backoff(delay, cancel).await {
                return None;
            }
        }
    }

    /// Success path: review passing output if the tier calls for it
    async fn review(
        &self,
        run: &mut RunState,
        ladder: &TierLadder,
        tier: &Tier,
        attempt_index: u32,
        output: &str,
        cancel: &CancellationToken,
    ) -> ReviewStep {
        let (Some(gate), Some(reviewer)) = (&self.review_gate, ladder.reviewer_for(tier)) else {
            return ReviewStep::Accepted(None);
        };

        let Some(decision) = self
            .request_review(gate.as_ref(), reviewer, output, run.feedback.entries(), cancel)
            .await
        else {
            return ReviewStep::Cancelled;
        };
        if cancel.is_cancelled() {
            return ReviewStep::Cancelled;
        }

        match decision {
            Ok(ReviewDecision::Approve) => {
                info!(task_id = %run.task.id(), tier = %tier, reviewer = %reviewer, "Review approved");
                ReviewStep::Accepted(Some(ReviewDecision::Approve))
            }
            Ok(ReviewDecision::RequestChanges { feedback }) => {
                info!(
                    task_id = %run.task.id(),
                    tier = %tier,
                    reviewer = %reviewer,
                    remaining = tier.max_attempts - attempt_index,
                    "Review requested changes"
                );
                run.append_feedback(FeedbackEntry::changes_requested(
                    tier.rank,
                    tier.name.clone(),
                    attempt_index,
                    &reviewer.name,
                    &feedback,
                ));
                ReviewStep::Retry
            }
            Ok(ReviewDecision::Reject { confidence, reason }) => {
                info!(
                    task_id = %run.task.id(),
                    tier = %tier,
                    reviewer = %reviewer,
                    confidence,
                    "Review rejected output; escalating"
                );
                run.append_feedback(FeedbackEntry::rejected(
                    tier.rank,
                    tier.name.clone(),
                    attempt_index,
                    &reviewer.name,
                    confidence,
                    &reason,
                ));
                ReviewStep::Escalate
            }
            Err(reason) => {
                warn!(
                    task_id = %run.task.id(),
                    reviewer = %reviewer,
                    reason = %reason,
                    "Review unavailable; treating as changes requested"
                );
                run.append_feedback(FeedbackEntry::review_unavailable(
                    tier.rank,
                    tier.name.clone(),
                    attempt_index,
                    &reviewer.name,
                    &reason,
                ));
                ReviewStep::Retry
            }
        }
    }

    fn record_finish(&self, status: RunStatus) {
        if let Some(metrics) = &self.metrics {
            metrics.record_run_finished(status);
        }
    }

    fn finish_success(
        &self,
        run: RunState,
        tier: &Tier,
        output: &str,
        review: Option<ReviewDecision>,
        report: &ValidationReport,
    ) -> Outcome {
        let outcome = Outcome::Success(SuccessReport {
            task_id: run.task.id(),
            tier: tier.name.clone(),
            tier_rank: tier.rank,
            total_attempts: run.slots_used(),
            total_cost: run.accountant.total(),
            elapsed_ms: run.elapsed_ms(),
            advisories: report.advisory_failures().cloned().collect(),
            review,
            output: output.to_string(),
            feedback_history: run.feedback.into_entries(),
            attempts: run.attempts,
        });
        info!(task_id = %outcome.task_id(), "Cascade finished: {}", outcome.summary());
        self.record_finish(RunStatus::Succeeded);
        outcome
    }

    fn finish_exhausted(&self, run: RunState) -> Outcome {
        let total_attempts = run.slots_used();
        let recommendation = recommendation(
            &run.tiers_tried,
            total_attempts,
            run.feedback.dominant_category(),
            run.feedback.last(),
        );
        let outcome = Outcome::Exhausted(ExhaustedReport {
            task_id: run.task.id(),
            total_attempts,
            total_cost: run.accountant.total(),
            elapsed_ms: run.elapsed_ms(),
            recommendation,
            feedback_history: run.feedback.into_entries(),
            attempts: run.attempts,
        });
        warn!(task_id = %outcome.task_id(), "Cascade finished: {}", outcome.summary());
        self.record_finish(RunStatus::Exhausted);
        outcome
    }

    fn finish_cancelled(&self, run: RunState, tier: Option<&Tier>) -> Outcome {
        let outcome = Outcome::Cancelled(CancelledReport {
            task_id: run.task.id(),
            total_attempts: run.slots_used(),
            total_cost: run.accountant.total(),
            elapsed_ms: run.elapsed_ms(),
            tier: tier.map(|t| t.name.clone()),
            feedback_history: run.feedback.into_entries(),
            attempts: run.attempts,
        });
        warn!(task_id = %outcome.task_id(), "Cascade finished: {}", outcome.summary());
        self.record_finish(RunStatus::Cancelled);
        outcome
    }
}

/// Sleep for `delay` unless cancelled first; `false` means cancelled
async fn backoff(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
