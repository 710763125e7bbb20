//! Normalized scan result handed back to the host.
//!
//! `score`/`threat_score` and `riskLevel`/`threat_level` carry the same
//! information twice. Both pairs are kept because existing consumers read
//! either spelling.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::response::{MatchedRule, RawApiResponse, RiskLevel, Verdict};

/// Threat entry exposed downstream.
///
/// Pattern text, pattern type and evidence from the raw rule are not exposed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threat {
    /// Rule identifier
    pub rule_id: String,
    /// Human-readable rule name
    pub rule_name: String,
    /// Threat category
    pub category: String,
    /// Severity label
    pub severity: String,
    /// Match confidence
    pub confidence: f64,
}

impl From<&MatchedRule> for Threat {
    fn from(rule: &MatchedRule) -> Self {
        Self {
            rule_id: rule.rule_id.clone(),
            rule_name: rule.rule_name.clone(),
            category: rule.category.clone(),
            severity: rule.severity.clone(),
            confidence: rule.confidence,
        }
    }
}

/// Host-facing scan result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedResult {
    /// Remote verdict
    pub verdict: Verdict,
    /// Threat score scaled to [0, 100]
    pub score: f64,
    /// Threat score in [0, 1]
    pub threat_score: f64,
    /// Risk tier (camelCase spelling)
    #[serde(rename = "riskLevel")]
    pub risk_level: RiskLevel,
    /// Risk tier (snake_case spelling)
    pub threat_level: RiskLevel,
    /// Confidence in [0, 1]
    pub confidence_score: f64,
    /// Matched threats
    pub threats: Vec<Threat>,
    /// Remediation advice
    pub recommendation: Option<String>,
    /// Open-ended analysis details
    pub analysis: Map<String, Value>,
}

impl NormalizedResult {
    /// `category (severity)` for every threat, comma-joined.
    pub fn threat_summary(&self) -> String {
        self.threats
            .iter()
            .map(|t| format!("{} ({})", t.category, t.severity))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl From<RawApiResponse> for NormalizedResult {
    fn from(raw: RawApiResponse) -> Self {
        Self {
            verdict: raw.verdict,
            score: scale_score(raw.threat_score),
            threat_score: raw.threat_score,
            risk_level: raw.threat_level,
            threat_level: raw.threat_level,
            confidence_score: raw.confidence_score,
            threats: raw.matched_rules.iter().map(Threat::from).collect(),
            recommendation: raw.recommendation,
            analysis: raw.analysis,
        }
    }
}

/// Map a raw response into the host-facing shape.
pub fn normalize(raw: RawApiResponse) -> NormalizedResult {
    NormalizedResult::from(raw)
}

/// Scale a [0, 1] score to [0, 100].
///
/// Rounded to six decimals so binary artifacts (`0.85 * 100 = 85.00000000000001`)
/// never tip a strict threshold comparison.
fn scale_score(threat_score: f64) -> f64 {
    (threat_score * 100.0 * 1e6).round() / 1e6
}
