use anyhow::{bail, Context, Result};
use coordination::{
    CascadeConfig, LadderError, RetryPolicy, Tier, TierLadder, Timeouts,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::endpoint::Endpoint;

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.2
}

fn default_true() -> bool {
    true
}

fn default_check_timeout_ms() -> u64 {
    120_000
}

/// One ladder tier plus the inference endpoint that serves it.
#[derive(Debug, Clone, Deserialize)]
pub struct TierConfig {
    pub name: String,
    pub rank: u32,
    pub max_attempts: u32,
    pub unit_cost: u64,
    #[serde(default)]
    pub reviewer_rank: Option<u32>,
    /// OpenAI-compatible base URL (e.g. `http://localhost:8080/v1`)
    pub url: String,
    pub model: String,
    /// Name of the env var holding the API key; local servers need none
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl TierConfig {
    pub fn tier(&self) -> Tier {
        let tier = Tier::new(&self.name, self.rank, self.max_attempts, self.unit_cost);
        match self.reviewer_rank {
            Some(rank) => tier.with_reviewer(rank),
            None => tier,
        }
    }

    /// Env var that overrides this tier's URL, e.g. `CASCADE_FAST_URL`
    pub fn url_override_var(&self) -> String {
        let name: String = self
            .name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("CASCADE_{name}_URL")
    }
}

/// A quality check run against each output.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckConfig {
    pub name: String,
    /// Shell-style command line; the output is piped to its stdin
    pub command: String,
    #[serde(default = "default_true")]
    pub blocking: bool,
    #[serde(default)]
    pub hint: Option<String>,
}

impl CheckConfig {
    pub fn argv(&self) -> Result<Vec<String>> {
        let argv = shlex::split(&self.command)
            .with_context(|| format!("check '{}': unbalanced quoting in command", self.name))?;
        if argv.is_empty() {
            bail!("check '{}': empty command", self.name);
        }
        Ok(argv)
    }
}

/// Top-level runner configuration, loaded from TOML.
///
/// ```toml
/// check_timeout_ms = 60000
/// telemetry_path = ".cascade-telemetry.jsonl"
///
/// [retry]
/// micro_retries = 2
/// backoff_base_ms = 500
/// backoff_max_ms = 8000
///
/// [timeouts]
/// executor_ms = 180000
/// gate_ms = 300000
/// review_ms = 120000
///
/// [[tiers]]
/// name = "fast"
/// rank = 0
/// max_attempts = 3
/// unit_cost = 1
/// reviewer_rank = 1
/// url = "http://localhost:8080/v1"
/// model = "qwen2.5-coder-14b"
///
/// [[checks]]
/// name = "tests"
/// command = "sh -c 'cat > /tmp/out.rs && rustc --test /tmp/out.rs -o /tmp/out && /tmp/out'"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    pub tiers: Vec<TierConfig>,
    pub retry: RetryPolicy,
    pub timeouts: Timeouts,
    #[serde(default)]
    pub checks: Vec<CheckConfig>,
    #[serde(default = "default_check_timeout_ms")]
    pub check_timeout_ms: u64,
    /// Working directory for checks (None = current directory)
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// JSONL sink for outcomes (None = disabled)
    #[serde(default)]
    pub telemetry_path: Option<PathBuf>,
}

impl RunnerConfig {
    /// Read, parse, validate and apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let mut config = Self::from_toml_str(&text)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.ladder().context("Invalid tier ladder")?;
        self.cascade_config()
            .validate()
            .context("Invalid cascade settings")?;
        if self.check_timeout_ms == 0 {
            bail!("check_timeout_ms must be greater than zero");
        }
        for check in &self.checks {
            check.argv()?;
        }
        Ok(())
    }

    /// `CASCADE_TELEMETRY_PATH` and `CASCADE_<TIER>_URL`
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub(crate) fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("CASCADE_TELEMETRY_PATH") {
            self.telemetry_path = Some(PathBuf::from(path));
        }
        for tier in &mut self.tiers {
            if let Some(url) = lookup(&tier.url_override_var()) {
                tier.url = url;
            }
        }
    }

    pub fn ladder(&self) -> Result<TierLadder, LadderError> {
        TierLadder::new(self.tiers.iter().map(TierConfig::tier).collect())
    }

    pub fn cascade_config(&self) -> CascadeConfig {
        CascadeConfig::new(self.retry, self.timeouts)
    }

    /// Endpoints keyed by tier rank, with API keys resolved from the env
    pub fn endpoints(&self) -> Result<HashMap<u32, Endpoint>> {
        self.resolve_endpoints(|key| std::env::var(key).ok())
    }

    pub(crate) fn resolve_endpoints(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<HashMap<u32, Endpoint>> {
        let mut endpoints = HashMap::new();
        for tier in &self.tiers {
            let api_key = match &tier.api_key_env {
                Some(var) => Some(lookup(var).with_context(|| {
                    format!("tier '{}': env var {} is not set", tier.name, var)
                })?),
                None => None,
            };
            endpoints.insert(
                tier.rank,
                Endpoint {
                    url: tier.url.clone(),
                    model: tier.model.clone(),
                    api_key,
                    max_tokens: tier.max_tokens,
                    temperature: tier.temperature,
                },
            );
        }
        Ok(endpoints)
    }
}
