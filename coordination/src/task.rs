//! Task — the unit of work submitted to the cascade

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Declared risk/complexity hint, passed through to executors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskHint {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for RiskHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

impl FromStr for RiskHint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(format!(
                "unknown risk hint '{other}' (expected low, medium, high or critical)"
            )),
        }
    }
}

/// A unit of work. Built by the caller, immutable once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    id: Uuid,
    objective: String,
    #[serde(default)]
    context: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    risk: Option<RiskHint>,
}

impl Task {
    pub fn new(objective: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            objective: objective.into(),
            context: serde_json::Value::Null,
            risk: None,
        }
    }

    /// Attach an opaque context payload
    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    pub fn with_risk(mut self, risk: RiskHint) -> Self {
        self.risk = Some(risk);
        self
    }

    /// Use a caller-chosen id (replay, external tracking)
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn objective(&self) -> &str {
        &self.objective
    }

    pub fn context(&self) -> &serde_json::Value {
        &self.context
    }

    pub fn risk(&self) -> Option<RiskHint> {
        self.risk
    }
}
