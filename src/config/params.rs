//! Typed per-item host parameters.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::{Result, ScanError};
use crate::policy::{BlockingCondition, BlockingPolicy};
use crate::protocol::{parse_timeout, RiskLevel, DEFAULT_TIMEOUT_SECS};

/// Parameters the host supplies for each item.
///
/// Field names follow the host's camelCase spelling. Everything except
/// `prompt` has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanParameters {
    /// Text to scan
    #[serde(skip_serializing_if = "String::is_empty")]
    pub prompt: String,
    /// Request timeout in seconds; must be an integer in [1, 300]
    pub timeout: Number,
    /// Attach workflow/execution identifiers to the request
    pub include_metadata: bool,
    /// Enable the blocking policy
    pub block_on_threat: bool,
    /// Conditions that may block
    pub blocking_conditions: Vec<BlockingCondition>,
    /// Score threshold in [0, 100]
    pub threat_threshold: i64,
    /// Risk tiers that block
    pub block_on_risk_levels: Vec<RiskLevel>,
}

impl Default for ScanParameters {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            timeout: Number::from(DEFAULT_TIMEOUT_SECS),
            include_metadata: false,
            block_on_threat: false,
            blocking_conditions: BlockingCondition::ALL.to_vec(),
            threat_threshold: 50,
            block_on_risk_levels: vec![RiskLevel::Critical, RiskLevel::High],
        }
    }
}

/// Parameters after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSettings {
    /// Request timeout in seconds
    pub timeout_secs: u32,
    /// Attach workflow/execution identifiers
    pub include_metadata: bool,
    /// Blocking policy
    pub policy: BlockingPolicy,
}

impl ScanParameters {
    /// Parameters for `prompt` with every other field defaulted.
    pub fn for_prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// Read parameters from a loose JSON object.
    pub fn from_value(value: &Value) -> Result<Self> {
        Self::deserialize(value)
            .map_err(|e| ScanError::InvalidRequest(format!("Invalid parameters: {e}")))
    }

    /// Check ranges and derive the settings used by the pipeline.
    pub fn validate(&self) -> Result<ScanSettings> {
        let timeout_secs = parse_timeout(&self.timeout)?;

        let score_threshold = u8::try_from(self.threat_threshold)
            .ok()
            .filter(|t| *t <= 100)
            .ok_or_else(|| {
                ScanError::InvalidRequest("Threat threshold must be between 0 and 100".to_string())
            })?;

        if self.block_on_risk_levels.contains(&RiskLevel::Safe) {
            return Err(ScanError::InvalidRequest(
                "Risk level \"safe\" cannot be used as a blocking level".to_string(),
            ));
        }

        Ok(ScanSettings {
            timeout_secs,
            include_metadata: self.include_metadata,
            policy: BlockingPolicy {
                enabled: self.block_on_threat,
                conditions: self.blocking_conditions.iter().copied().collect(),
                score_threshold,
                risk_levels: self.block_on_risk_levels.iter().copied().collect(),
            },
        })
    }
}
