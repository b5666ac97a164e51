//! Command quality gate — runs configured checks as subprocesses.
//!
//! Each check receives the candidate output on stdin. Exit code 0 passes;
//! anything else fails with the (truncated) stderr/stdout as detail. A check
//! that cannot be spawned or exceeds its timeout is a gate infra fault, not
//! a failure of the output.

use async_trait::async_trait;
use coordination::{CheckResult, InfraFault, QualityGate, ValidationReport};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::config::RunnerConfig;

/// Max bytes of check output kept as detail
const MAX_DETAIL_BYTES: usize = 4096;

/// One check command, already split into argv
#[derive(Debug, Clone, PartialEq)]
pub struct CheckCommand {
    pub name: String,
    pub argv: Vec<String>,
    pub blocking: bool,
    pub hint: Option<String>,
}

impl CheckCommand {
    pub fn new(name: impl Into<String>, argv: Vec<String>) -> Self {
        Self {
            name: name.into(),
            argv,
            blocking: true,
            hint: None,
        }
    }

    pub fn advisory(mut self) -> Self {
        self.blocking = false;
        self
    }
}

pub struct CommandGate {
    checks: Vec<CheckCommand>,
    timeout: Duration,
    working_dir: Option<PathBuf>,
}

impl CommandGate {
    pub fn new(checks: Vec<CheckCommand>, timeout: Duration) -> Self {
        Self {
            checks,
            timeout,
            working_dir: None,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn from_config(config: &RunnerConfig) -> anyhow::Result<Self> {
        let checks = config
            .checks
            .iter()
            .map(|check| {
                Ok(CheckCommand {
                    name: check.name.clone(),
                    argv: check.argv()?,
                    blocking: check.blocking,
                    hint: check.hint.clone(),
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let gate = Self::new(checks, Duration::from_millis(config.check_timeout_ms));
        Ok(match &config.working_dir {
            Some(dir) => gate.with_working_dir(dir),
            None => gate,
        })
    }

    /// Run one check to completion. `Err` means the check itself could not run.
    async fn run_check(&self, check: &CheckCommand, output: &str) -> Result<CheckResult, String> {
        let start = Instant::now();
        let Some((program, args)) = check.argv.split_first() else {
            return Err(format!("check '{}' has an empty command", check.name));
        };

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        // Own process group so descendants die with the check on timeout
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .map_err(|e| format!("check '{}': failed to spawn {}: {e}", check.name, program))?;

        let input = output.as_bytes().to_vec();
        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                // Checks that never read stdin close the pipe early
                match stdin.write_all(&input).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                    Err(e) => return Err(e),
                }
            }
            Ok(())
        };
        // Drain stdout/stderr while stdin is still being written; a check
        // that logs before reading its input would otherwise fill the pipe
        let run = async move {
            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            fed?;
            output
        };

        let result = match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => return Err(format!("check '{}': {e}", check.name)),
            Err(_) => {
                return Err(format!(
                    "check '{}' timed out after {}ms",
                    check.name,
                    self.timeout.as_millis()
                ))
            }
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let mut check_result = if result.status.success() {
            CheckResult::pass(&check.name)
        } else {
            let detail = if result.stderr.is_empty() {
                truncate(&result.stdout)
            } else {
                truncate(&result.stderr)
            };
            let detail = match result.status.code() {
                Some(code) => format!("exit code {code}\n{detail}"),
                None => format!("terminated by signal\n{detail}"),
            };
            let mut failed = CheckResult::fail(&check.name, detail.trim_end());
            if let Some(hint) = &check.hint {
                failed = failed.with_hint(hint);
            }
            failed
        };
        if !check.blocking {
            check_result = check_result.advisory();
        }
        debug!(
            check = %check.name,
            passed = check_result.is_pass(),
            duration_ms,
            "Check finished"
        );
        Ok(check_result.with_duration_ms(duration_ms))
    }
}

fn truncate(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= MAX_DETAIL_BYTES {
        return text.into_owned();
    }
    let mut cut = MAX_DETAIL_BYTES;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}\n...[truncated]", &text[..cut])
}

#[async_trait]
impl QualityGate for CommandGate {
    async fn validate(&self, output: &str) -> Result<ValidationReport, InfraFault> {
        let mut report = ValidationReport::new();
        for check in &self.checks {
            match self.run_check(check, output).await {
                Ok(result) => report.push(result),
                Err(reason) => {
                    warn!(check = %check.name, reason = %reason, "Check could not run");
                    return Err(InfraFault::new(reason));
                }
            }
        }
        Ok(report)
    }
}
