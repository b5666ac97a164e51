//! Outcome telemetry — one JSON line per finished run.
//!
//! The record is the serialized [`Outcome`] itself; downstream analytics
//! read it back with [`read_outcomes`].

use anyhow::{Context, Result};
use coordination::Outcome;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tracing::{info, warn};

/// Append an outcome to the JSONL file at `path`.
///
/// Best-effort: failures are logged and never abort the caller.
pub fn append_outcome(outcome: &Outcome, path: &Path) {
    let json = match serde_json::to_string(outcome) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize outcome telemetry: {e}");
            return;
        }
    };
    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
    {
        Ok(mut file) => {
            if let Err(e) = writeln!(file, "{json}") {
                warn!("Failed to append outcome telemetry: {e}");
            } else {
                info!(
                    path = %path.display(),
                    task_id = %outcome.task_id(),
                    status = outcome.status(),
                    "Appended outcome telemetry"
                );
            }
        }
        Err(e) => warn!("Failed to open telemetry file {}: {e}", path.display()),
    }
}

/// Read every outcome recorded at `path`, skipping blank lines.
pub fn read_outcomes(path: &Path) -> Result<Vec<Outcome>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open telemetry file {}", path.display()))?;
    let mut outcomes = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", idx + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let outcome: Outcome = serde_json::from_str(&line)
            .with_context(|| format!("Malformed outcome on line {}", idx + 1))?;
        outcomes.push(outcome);
    }
    Ok(outcomes)
}
