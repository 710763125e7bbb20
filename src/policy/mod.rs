//! Blocking policy.
//!
//! A policy is a single OR across the selected conditions:
//!
//! | Condition   | Blocks when                              |
//! |-------------|------------------------------------------|
//! | `verdict`   | remote verdict is `BLOCK`                |
//! | `score`     | `score > scoreThreshold` (strictly)      |
//! | `riskLevel` | `riskLevel` is one of the chosen levels  |
//!
//! A disabled policy, or one with no condition selected, never blocks. A
//! block is reported as [`ScanError::PolicyBlock`], which hosts can tell
//! apart from transport and validation failures.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, ScanError};
use crate::protocol::{NormalizedResult, RiskLevel, Verdict};

/// Condition a user can select to block on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockingCondition {
    /// Remote verdict
    Verdict,
    /// Numeric score against the threshold
    Score,
    /// Risk tier membership
    RiskLevel,
}

impl BlockingCondition {
    /// Every condition.
    pub const ALL: [BlockingCondition; 3] = [
        BlockingCondition::Verdict,
        BlockingCondition::Score,
        BlockingCondition::RiskLevel,
    ];

    /// Host-facing name
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockingCondition::Verdict => "verdict",
            BlockingCondition::Score => "score",
            BlockingCondition::RiskLevel => "riskLevel",
        }
    }
}

impl std::str::FromStr for BlockingCondition {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        BlockingCondition::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown blocking condition: {s}"))
    }
}

/// Decision rules derived from the host parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockingPolicy {
    /// Master switch
    pub enabled: bool,
    /// Selected conditions
    pub conditions: BTreeSet<BlockingCondition>,
    /// Score threshold in [0, 100]
    pub score_threshold: u8,
    /// Risk tiers that block
    pub risk_levels: BTreeSet<RiskLevel>,
}

impl Default for BlockingPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            conditions: BlockingCondition::ALL.into_iter().collect(),
            score_threshold: 50,
            risk_levels: [RiskLevel::Critical, RiskLevel::High].into_iter().collect(),
        }
    }
}

impl BlockingPolicy {
    /// Enabled policy with a single condition and default thresholds.
    pub fn only(condition: BlockingCondition) -> Self {
        Self {
            enabled: true,
            conditions: BTreeSet::from([condition]),
            ..Default::default()
        }
    }

    /// Conditions that fire for `result`, in declaration order.
    pub fn triggered(&self, result: &NormalizedResult) -> Vec<BlockingCondition> {
        if !self.enabled {
            return Vec::new();
        }

        self.conditions
            .iter()
            .copied()
            .filter(|condition| match condition {
                BlockingCondition::Verdict => result.verdict == Verdict::Block,
                BlockingCondition::Score => result.score > f64::from(self.score_threshold),
                BlockingCondition::RiskLevel => self.risk_levels.contains(&result.risk_level),
            })
            .collect()
    }

    /// Whether `result` should stop the workflow.
    pub fn evaluate(&self, result: &NormalizedResult) -> bool {
        !self.triggered(result).is_empty()
    }

    /// Return a [`ScanError::PolicyBlock`] when `result` should stop the workflow.
    pub fn enforce(&self, result: &NormalizedResult) -> Result<()> {
        let triggered = self.triggered(result);
        if triggered.is_empty() {
            return Ok(());
        }

        let violation = PolicyViolation::new(result, triggered);
        warn!(
            risk_level = %violation.risk_level,
            score = violation.score,
            threats = violation.threat_count,
            conditions = ?violation.triggered,
            "Scan blocked by security policy"
        );
        Err(ScanError::from(violation))
    }
}

/// Details of a policy block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyViolation {
    /// Risk tier of the result
    pub risk_level: RiskLevel,
    /// Score in [0, 100]
    pub score: f64,
    /// Remote recommendation
    pub recommendation: Option<String>,
    /// Number of matched threats
    pub threat_count: usize,
    /// `category (severity)` list
    pub threat_summary: String,
    /// Conditions that fired
    pub triggered: Vec<BlockingCondition>,
}

impl PolicyViolation {
    fn new(result: &NormalizedResult, triggered: Vec<BlockingCondition>) -> Self {
        Self {
            risk_level: result.risk_level,
            score: result.score,
            recommendation: result.recommendation.clone(),
            threat_count: result.threats.len(),
            threat_summary: result.threat_summary(),
            triggered,
        }
    }

    /// Short message, e.g. `Security threat detected: high risk (score: 85.0)`.
    pub fn message(&self) -> String {
        format!(
            "Security threat detected: {} risk (score: {:.1})",
            self.risk_level, self.score
        )
    }

    /// Operator-facing explanation.
    pub fn description(&self) -> String {
        let recommendation = self
            .recommendation
            .as_deref()
            .map(|r| r.trim_end_matches('.'))
            .filter(|r| !r.is_empty())
            .unwrap_or("No recommendation provided");
        let summary = if self.threat_summary.is_empty() {
            "none"
        } else {
            &self.threat_summary
        };

        format!(
            "{recommendation}. The prompt was flagged as {} risk with {} threat(s): {summary}. \
             Workflow blocked by security policy.",
            self.risk_level, self.threat_count
        )
    }
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}
