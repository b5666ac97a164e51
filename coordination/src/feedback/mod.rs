//! Feedback Module
//!
//! Every failed attempt slot leaves exactly one [`FeedbackEntry`] in the
//! run's [`FeedbackLog`]. The log is carried forward across tiers and handed
//! to each later executor invocation.
//!
//! ```text
//! ValidationReport (RED) ─┐
//!                         ├─ FeedbackExtractor ─→ FeedbackEntry ─→ FeedbackLog (append-only)
//! Attempt ────────────────┘                                            │
//!                                                                      ▼
//!                                                         next Executor::execute
//! ```

pub mod entry;
pub mod extractor;

pub use entry::{
    FailedCheck, FailureCategory, FailureDescription, FeedbackEntry, FeedbackLog, FeedbackSource,
};
pub use extractor::{FeedbackExtractor, ReportFeedbackExtractor};
