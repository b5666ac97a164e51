//! Cost accounting
//!
//! - [`CostAccountant`]: one per run, owned by that run, never shared across
//!   tasks. Atomic so micro-retries may charge it concurrently.
//! - [`CascadeMetrics`]: optional process-wide aggregator owned by the
//!   embedding application and handed to the controller as an `Arc`. Plain
//!   atomic increments; no run ever waits on another run's update.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Per-run aggregator of attempt cost and elapsed time
#[derive(Debug, Default)]
pub struct CostAccountant {
    total: AtomicU64,
    invocations: AtomicU64,
    elapsed_us: AtomicU64,
}

impl CostAccountant {
    pub fn new() -> Self {
        Self::default()
    }

    /// Charge one executor invocation
    pub fn add(&self, cost: u64) {
        self.total.fetch_add(cost, Ordering::Relaxed);
        self.invocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    pub fn record_elapsed(&self, elapsed: Duration) {
        self.elapsed_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    /// Time spent inside executor invocations
    pub fn elapsed(&self) -> Duration {
        Duration::from_micros(self.elapsed_us.load(Ordering::Relaxed))
    }
}

/// Terminal status counted by [`CascadeMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Succeeded,
    Exhausted,
    Cancelled,
}

/// Process-wide counters across runs
#[derive(Debug, Default)]
pub struct CascadeMetrics {
    runs_started: AtomicU64,
    runs_succeeded: AtomicU64,
    runs_exhausted: AtomicU64,
    runs_cancelled: AtomicU64,
    attempts: AtomicU64,
    invocations: AtomicU64,
    cost: AtomicU64,
    escalations: AtomicU64,
}

impl CascadeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one executor invocation and its cost
    pub fn record_invocation(&self, cost: u64, opens_slot: bool) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        self.cost.fetch_add(cost, Ordering::Relaxed);
        if opens_slot {
            self.attempts.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_escalation(&self) {
        self.escalations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run_finished(&self, status: RunStatus) {
        let counter = match status {
            RunStatus::Succeeded => &self.runs_succeeded,
            RunStatus::Exhausted => &self.runs_exhausted,
            RunStatus::Cancelled => &self.runs_cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runs_started: self.runs_started.load(Ordering::Relaxed),
            runs_succeeded: self.runs_succeeded.load(Ordering::Relaxed),
            runs_exhausted: self.runs_exhausted.load(Ordering::Relaxed),
            runs_cancelled: self.runs_cancelled.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            invocations: self.invocations.load(Ordering::Relaxed),
            cost: self.cost.load(Ordering::Relaxed),
            escalations: self.escalations.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CascadeMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub runs_started: u64,
    pub runs_succeeded: u64,
    pub runs_exhausted: u64,
    pub runs_cancelled: u64,
    pub attempts: u64,
    pub invocations: u64,
    pub cost: u64,
    pub escalations: u64,
}

impl MetricsSnapshot {
    /// Fraction of finished runs that succeeded
    pub fn success_rate(&self) -> f64 {
        let finished = self.runs_succeeded + self.runs_exhausted + self.runs_cancelled;
        if finished == 0 {
            return 0.0;
        }
        self.runs_succeeded as f64 / finished as f64
    }
}
