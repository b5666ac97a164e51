//! Cascade runner — a reference embedding of the cascade controller.
//!
//! Supplies concrete capabilities for the `coordination` traits:
//! - [`endpoint::EndpointExecutor`] / [`endpoint::EndpointReviewer`]:
//!   OpenAI-compatible chat endpoints, one per tier
//! - [`gate::CommandGate`]: subprocess checks as the quality gate
//! - [`telemetry`]: JSONL outcome sink
//!
//! Configuration comes from a TOML file ([`config::RunnerConfig`]).

pub mod config;
pub mod endpoint;
pub mod gate;
pub mod prompts;
pub mod telemetry;

use coordination::Outcome;

/// Process exit code for a terminal outcome
pub fn exit_code(outcome: &Outcome) -> u8 {
    match outcome {
        Outcome::Success(_) => 0,
        Outcome::Exhausted(_) => 2,
        Outcome::Cancelled(_) => 130,
    }
}
