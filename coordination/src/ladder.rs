//! Tier Ladder — ordered capability/cost levels
//!
//! A ladder is validated once at construction and never mutated afterwards.
//! Tiers are kept in ascending rank order; lower rank is cheaper and is
//! tried first.
//!
//! ```text
//! rank 0  fast      3 attempts  cost 1   reviewer: rank 2
//!    │
//!    ▼
//! rank 1  standard  2 attempts  cost 5
//!    │
//!    ▼
//! rank 2  frontier  1 attempt   cost 40
//!    │
//!    ▼
//! exhausted → human handoff
//! ```

use crate::error::LadderError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single capability/cost level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    /// Display name (e.g. "fast", "frontier")
    pub name: String,
    /// Ordinal rank; lower is cheaper and tried first
    pub rank: u32,
    /// Attempt slots at this tier (>= 1)
    pub max_attempts: u32,
    /// Cost charged per executor invocation, in integer cost units
    pub unit_cost: u64,
    /// Rank of the tier allowed to review this tier's passing output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer_rank: Option<u32>,
}

impl Tier {
    pub fn new(name: impl Into<String>, rank: u32, max_attempts: u32, unit_cost: u64) -> Self {
        Self {
            name: name.into(),
            rank,
            max_attempts,
            unit_cost,
            reviewer_rank: None,
        }
    }

    /// Require review of passing output by the tier at `rank`
    pub fn with_reviewer(mut self, rank: u32) -> Self {
        self.reviewer_rank = Some(rank);
        self
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.name, self.rank)
    }
}

/// Validated, immutable, strictly ordered set of tiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Tier>", into = "Vec<Tier>")]
pub struct TierLadder {
    tiers: Vec<Tier>,
}

impl TierLadder {
    /// Validate and order a set of tiers
    pub fn new(mut tiers: Vec<Tier>) -> Result<Self, LadderError> {
        if tiers.is_empty() {
            return Err(LadderError::Empty);
        }

        tiers.sort_by_key(|t| t.rank);

        let mut seen: HashMap<u32, &str> = HashMap::new();
        for tier in &tiers {
            if tier.max_attempts == 0 {
                return Err(LadderError::ZeroAttempts {
                    tier: tier.name.clone(),
                });
            }
            if let Some(first) = seen.insert(tier.rank, &tier.name) {
                return Err(LadderError::DuplicateRank {
                    rank: tier.rank,
                    first: first.to_string(),
                    second: tier.name.clone(),
                });
            }
        }

        for tier in &tiers {
            let Some(reviewer_rank) = tier.reviewer_rank else {
                continue;
            };
            if reviewer_rank <= tier.rank {
                return Err(LadderError::ReviewerNotAbove {
                    tier: tier.name.clone(),
                    rank: tier.rank,
                    reviewer_rank,
                });
            }
            if !seen.contains_key(&reviewer_rank) {
                return Err(LadderError::UnknownReviewer {
                    tier: tier.name.clone(),
                    reviewer_rank,
                });
            }
        }

        Ok(Self { tiers })
    }

    /// Tiers in ascending rank order
    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// Look up a tier by rank
    pub fn get(&self, rank: u32) -> Option<&Tier> {
        self.tiers.iter().find(|t| t.rank == rank)
    }

    /// The tier eligible to review `tier`'s output, if any
    pub fn reviewer_for(&self, tier: &Tier) -> Option<&Tier> {
        tier.reviewer_rank.and_then(|rank| self.get(rank))
    }

    /// The next more capable tier after `rank`
    pub fn next_after(&self, rank: u32) -> Option<&Tier> {
        self.tiers.iter().find(|t| t.rank > rank)
    }

    /// Upper bound on attempt slots for any run over this ladder
    pub fn total_budget(&self) -> u32 {
        self.tiers.iter().map(|t| t.max_attempts).sum()
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Compact summary for logging
    pub fn summary(&self) -> String {
        self.tiers
            .iter()
            .map(|t| format!("{}x{}@{}", t.name, t.max_attempts, t.unit_cost))
            .collect::<Vec<_>>()
            .join(" → ")
    }
}

impl TryFrom<Vec<Tier>> for TierLadder {
    type Error = LadderError;

    fn try_from(tiers: Vec<Tier>) -> Result<Self, Self::Error> {
        Self::new(tiers)
    }
}

impl From<TierLadder> for Vec<Tier> {
    fn from(ladder: TierLadder) -> Self {
        ladder.tiers
    }
}
