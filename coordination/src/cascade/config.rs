//! Cascade configuration
//!
//! Timeouts and the micro-retry policy are required inputs. There is no
//! implied default retry count; callers state it explicitly.

use crate::error::{CascadeError, CascadeResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded immediate retry of infra faults within one attempt slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Extra invocations allowed after the first infra fault (0 = none)
    pub micro_retries: u32,
    /// Delay before the first micro-retry; doubles each retry
    pub backoff_base_ms: u64,
    /// Ceiling on the delay between micro-retries
    pub backoff_max_ms: u64,
}

impl RetryPolicy {
    pub fn new(micro_retries: u32, backoff_base_ms: u64, backoff_max_ms: u64) -> Self {
        Self {
            micro_retries,
            backoff_base_ms,
            backoff_max_ms,
        }
    }

    /// Delay before micro-retry number `retry` (1-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(32);
        let ms = self
            .backoff_base_ms
            .saturating_mul(1u64 << exp)
            .min(self.backoff_max_ms);
        Duration::from_millis(ms)
    }
}

/// Per-call bounds on every capability invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    pub executor_ms: u64,
    pub gate_ms: u64,
    pub review_ms: u64,
}

impl Timeouts {
    pub fn new(executor_ms: u64, gate_ms: u64, review_ms: u64) -> Self {
        Self {
            executor_ms,
            gate_ms,
            review_ms,
        }
    }

    pub fn executor(&self) -> Duration {
        Duration::from_millis(self.executor_ms)
    }

    pub fn gate(&self) -> Duration {
        Duration::from_millis(self.gate_ms)
    }

    pub fn review(&self) -> Duration {
        Duration::from_millis(self.review_ms)
    }
}

/// Configuration for a [`crate::cascade::CascadeController`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeConfig {
    pub retry: RetryPolicy,
    pub timeouts: Timeouts,
}

impl CascadeConfig {
    pub fn new(retry: RetryPolicy, timeouts: Timeouts) -> Self {
        Self { retry, timeouts }
    }

    /// Reject unusable settings before any run starts
    pub fn validate(&self) -> CascadeResult<()> {
        for (name, ms) in [
            ("executor", self.timeouts.executor_ms),
            ("gate", self.timeouts.gate_ms),
            ("review", self.timeouts.review_ms),
        ] {
            if ms == 0 {
                return Err(CascadeError::invalid_config(format!(
                    "{name} timeout must be greater than zero"
                )));
            }
        }
        if self.retry.backoff_max_ms < self.retry.backoff_base_ms {
            return Err(CascadeError::invalid_config(format!(
                "backoff_max_ms ({}) is below backoff_base_ms ({})",
                self.retry.backoff_max_ms, self.retry.backoff_base_ms
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CascadeConfig {
        CascadeConfig::new(RetryPolicy::new(2, 100, 1000), Timeouts::new(1000, 500, 1000))
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(5, 100, 350);
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(350));
        assert_eq!(policy.backoff(60), Duration::from_millis(350));
    }

    #[test]
    fn test_valid_config() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut cfg = config();
        cfg.timeouts.gate_ms = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("gate timeout"));
    }

    #[test]
    fn test_inverted_backoff_rejected() {
        let mut cfg = config();
        cfg.retry = RetryPolicy::new(1, 500, 100);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_config_requires_every_field() {
        let missing = serde_json::from_str::<CascadeConfig>(
            r#"{"retry":{"micro_retries":1,"backoff_base_ms":10},"timeouts":{"executor_ms":1,"gate_ms":1,"review_ms":1}}"#,
        );
        assert!(missing.is_err());
    }
}
