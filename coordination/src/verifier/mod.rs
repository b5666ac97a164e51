//! Verifier Module — quality gates over attempt output
//!
//! The cascade never inspects output itself. It hands each raw output to a
//! [`QualityGate`] and acts only on the returned [`ValidationReport`]:
//!
//! ```text
//! output → QualityGate::validate → ValidationReport
//!                                    ├─ all blocking checks pass → success path
//!                                    └─ any blocking failure     → FeedbackExtractor
//! ```

pub mod gate;
pub mod report;

pub use gate::QualityGate;
pub use report::{CheckResult, CheckStatus, ValidationReport};
