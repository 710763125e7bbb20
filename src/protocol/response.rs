//! Raw analyze response and its validation.
//!
//! The remote body is parsed as loose JSON first and checked field by field,
//! so a malformed reply yields a precise [`ScanError::InvalidResponse`]
//! instead of a generic deserialization message.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, ScanError};

/// Remote verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// Prompt may proceed
    Allow,
    /// Remote service recommends blocking
    Block,
}

impl Verdict {
    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Allow => "ALLOW",
            Verdict::Block => "BLOCK",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ALLOW" => Ok(Verdict::Allow),
            "BLOCK" => Ok(Verdict::Block),
            _ => Err(ScanError::InvalidResponse(
                "Invalid verdict (must be ALLOW or BLOCK)".to_string(),
            )),
        }
    }
}

/// Risk tier, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// No threat found
    Safe,
    /// Low risk
    Low,
    /// Medium risk
    Medium,
    /// High risk
    High,
    /// Critical risk
    Critical,
}

impl RiskLevel {
    /// All tiers, least severe first
    pub const ALL: [RiskLevel; 5] = [
        RiskLevel::Safe,
        RiskLevel::Low,
        RiskLevel::Medium,
        RiskLevel::High,
        RiskLevel::Critical,
    ];

    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "safe",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        RiskLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == s.to_lowercase())
            .ok_or_else(|| format!("Unknown risk level: {s}"))
    }
}

/// A rule the remote engine matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedRule {
    /// Rule identifier
    pub rule_id: String,
    /// Human-readable rule name
    pub rule_name: String,
    /// Threat category (e.g. `prompt_injection`)
    pub category: String,
    /// Severity label
    pub severity: String,
    /// Match confidence
    pub confidence: f64,
    /// Pattern that matched
    #[serde(default)]
    pub matched_pattern: String,
    /// Pattern kind (regex, semantic, ...)
    #[serde(default)]
    pub pattern_type: String,
    /// Supporting evidence, shape defined by the remote engine
    #[serde(default)]
    pub evidence: Value,
}

/// Analyze response as returned by the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawApiResponse {
    /// Remote verdict
    pub verdict: Verdict,
    /// Threat score in [0, 1]
    pub threat_score: f64,
    /// Risk tier
    pub threat_level: RiskLevel,
    /// Confidence in [0, 1]
    pub confidence_score: f64,
    /// Rules matched by the prompt
    pub matched_rules: Vec<MatchedRule>,
    /// Open-ended analysis details
    pub analysis: Map<String, Value>,
    /// Remediation advice
    pub recommendation: Option<String>,
}

impl RawApiResponse {
    /// Validate a response body.
    pub fn validate(raw: &Value) -> Result<Self> {
        let obj = raw
            .as_object()
            .ok_or_else(|| invalid("Scan response must be an object"))?;

        let verdict = obj
            .get("verdict")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("Invalid verdict (must be ALLOW or BLOCK)"))?
            .parse::<Verdict>()?;

        let threat_score = unit_interval(obj.get("threat_score"))
            .ok_or_else(|| invalid("Invalid threat_score (must be between 0 and 1)"))?;

        let threat_level = obj
            .get("threat_level")
            .and_then(Value::as_str)
            .and_then(|s| RiskLevel::ALL.into_iter().find(|l| l.as_str() == s))
            .ok_or_else(|| invalid("Invalid threat_level"))?;

        let confidence_score = unit_interval(obj.get("confidence_score"))
            .ok_or_else(|| invalid("Invalid confidence_score (must be between 0 and 1)"))?;

        let rules = obj
            .get("matched_rules")
            .and_then(Value::as_array)
            .ok_or_else(|| invalid("matched_rules must be an array"))?;
        let matched_rules = rules
            .iter()
            .enumerate()
            .map(|(i, rule)| {
                MatchedRule::deserialize(rule)
                    .map_err(|e| ScanError::InvalidResponse(format!("matched_rules[{i}]: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let recommendation = match obj.get("recommendation") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => return Err(invalid("recommendation must be a string or null")),
        };

        let analysis = obj
            .get("analysis")
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| invalid("analysis must be an object"))?;

        Ok(Self {
            verdict,
            threat_score,
            threat_level,
            confidence_score,
            matched_rules,
            analysis,
            recommendation,
        })
    }
}

fn unit_interval(value: Option<&Value>) -> Option<f64> {
    value
        .and_then(Value::as_f64)
        .filter(|score| (0.0..=1.0).contains(score))
}

fn invalid(reason: &str) -> ScanError {
    ScanError::InvalidResponse(reason.to_string())
}
