//! Cascade — tiered retry with accumulated feedback
//!
//! A task starts at the cheapest tier of a [`crate::ladder::TierLadder`].
//! Each failed attempt appends one entry to the run's feedback history, and
//! every later attempt sees the whole history. When a tier's budget is spent
//! the run escalates to the next rank; when the last tier is spent the run
//! ends [`Outcome::Exhausted`] with a recommendation for human review.

pub mod config;
pub mod controller;
pub mod outcome;

pub use config::{CascadeConfig, RetryPolicy, Timeouts};
pub use controller::CascadeController;
pub use outcome::{CancelledReport, ExhaustedReport, Outcome, SuccessReport};
