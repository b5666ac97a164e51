//! Quality Gate — pluggable validation of attempt output

use crate::error::InfraFault;
use crate::verifier::report::ValidationReport;
use async_trait::async_trait;

/// Runs named checks against a raw output.
///
/// Must be a pure function of `output` so a run can be replayed given the
/// same executor behavior. Return [`InfraFault`] only when the gate itself
/// could not run; a failing check belongs in the report.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QualityGate: Send + Sync {
    async fn validate(&self, output: &str) -> Result<ValidationReport, InfraFault>;
}
