//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables
//! - CLI arguments (for the `securevector` binary)
//!
//! ```toml
//! [credentials]
//! api_key = "sk_..."
//! base_url = "https://scan.securevector.io"
//!
//! [retry]
//! max_retries = 3
//! base_delay_ms = 1000
//! max_delay_ms = 10000
//! max_jitter_ms = 1000
//!
//! # Keys mirror the host parameter names
//! [scan]
//! timeout = 30
//! blockOnThreat = true
//! blockingConditions = ["verdict", "riskLevel"]
//! blockOnRiskLevels = ["critical", "high"]
//! ```
//!
//! The library core never reads files or the environment itself; hosts load
//! a [`Config`] and hand its parts to the pipeline.

mod params;

pub use params::{ScanParameters, ScanSettings};

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{json, Number, Value};

use crate::dispatch::ExponentialBackoff;
use crate::error::{Result, ScanError};
use crate::security::REDACTION_MARKER;

/// Environment variable holding the API key
pub const ENV_API_KEY: &str = "SECUREVECTOR_API_KEY";
/// Environment variable holding the base URL
pub const ENV_BASE_URL: &str = "SECUREVECTOR_BASE_URL";
/// Environment variable holding the default timeout in seconds
pub const ENV_TIMEOUT: &str = "SECUREVECTOR_TIMEOUT";

/// Main configuration struct
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Stored credentials
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Retry schedule
    #[serde(default)]
    pub retry: ExponentialBackoff,

    /// Default scan parameters
    #[serde(default)]
    pub scan: ScanParameters,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ScanError::Config(format!("Failed to read config file: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| ScanError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(key) = lookup(ENV_API_KEY).filter(|k| !k.is_empty()) {
            config.credentials.api_key = Some(key);
        }
        if let Some(url) = lookup(ENV_BASE_URL).filter(|u| !u.is_empty()) {
            config.credentials.base_url = Some(url);
        }
        if let Some(timeout) = lookup(ENV_TIMEOUT) {
            if let Ok(secs) = timeout.trim().parse::<u32>() {
                config.scan.timeout = Number::from(secs);
            }
        }

        config
    }

    /// Default config file location (`<config dir>/securevector/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("securevector").join("config.toml"))
    }

    /// Merge with another config (other takes precedence)
    ///
    /// Fields are merged one by one: a field in `other` wins only when it
    /// differs from its default, so a partial layer (e.g. an environment
    /// that only sets the timeout) keeps the rest of `self`.
    pub fn merge(self, other: Self) -> Self {
        let retry_default = ExponentialBackoff::default();
        let scan_default = ScanParameters::default();

        Self {
            credentials: CredentialsConfig {
                api_key: other.credentials.api_key.or(self.credentials.api_key),
                base_url: other.credentials.base_url.or(self.credentials.base_url),
            },
            retry: ExponentialBackoff {
                max_retries: prefer(
                    other.retry.max_retries,
                    self.retry.max_retries,
                    &retry_default.max_retries,
                ),
                base_delay_ms: prefer(
                    other.retry.base_delay_ms,
                    self.retry.base_delay_ms,
                    &retry_default.base_delay_ms,
                ),
                max_delay_ms: prefer(
                    other.retry.max_delay_ms,
                    self.retry.max_delay_ms,
                    &retry_default.max_delay_ms,
                ),
                max_jitter_ms: prefer(
                    other.retry.max_jitter_ms,
                    self.retry.max_jitter_ms,
                    &retry_default.max_jitter_ms,
                ),
            },
            scan: ScanParameters {
                prompt: prefer(other.scan.prompt, self.scan.prompt, &scan_default.prompt),
                timeout: prefer(other.scan.timeout, self.scan.timeout, &scan_default.timeout),
                include_metadata: other.scan.include_metadata || self.scan.include_metadata,
                block_on_threat: other.scan.block_on_threat || self.scan.block_on_threat,
                blocking_conditions: prefer(
                    other.scan.blocking_conditions,
                    self.scan.blocking_conditions,
                    &scan_default.blocking_conditions,
                ),
                threat_threshold: prefer(
                    other.scan.threat_threshold,
                    self.scan.threat_threshold,
                    &scan_default.threat_threshold,
                ),
                block_on_risk_levels: prefer(
                    other.scan.block_on_risk_levels,
                    self.scan.block_on_risk_levels,
                    &scan_default.block_on_risk_levels,
                ),
            },
        }
    }
}

fn prefer<T: PartialEq>(other: T, current: T, default: &T) -> T {
    if other != *default {
        other
    } else {
        current
    }
}

/// Credentials as stored, before validation.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// API key
    pub api_key: Option<String>,
    /// Base URL override
    pub base_url: Option<String>,
}

impl CredentialsConfig {
    /// Host-shaped credential object (`{ apiKey, baseUrl }`).
    pub fn to_value(&self) -> Value {
        let mut value = json!({ "apiKey": self.api_key });
        if let Some(url) = &self.base_url {
            value["baseUrl"] = Value::String(url.clone());
        }
        value
    }
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| REDACTION_MARKER))
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Credentials;
    use crate::policy::BlockingCondition;
    use std::collections::HashMap;
    use std::io::Write;

    const KEY: &str = "sv_live_0123456789abcdefghijklmnopqrstuv";

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.max_delay_ms, 10_000);
        assert!(config.credentials.api_key.is_none());
        assert_eq!(config.scan.threat_threshold, 50);
    }

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
            [credentials]
            api_key = "sv_live_0123456789abcdefghijklmnopqrstuv"

            [retry]
            max_retries = 5
            max_jitter_ms = 0

            [scan]
            timeout = 45
            blockOnThreat = true
            blockingConditions = ["riskLevel"]
            blockOnRiskLevels = ["critical"]
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.credentials.api_key.as_deref(), Some(KEY));
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(config.retry.max_jitter_ms, 0);

        let settings = config.scan.validate().unwrap();
        assert_eq!(settings.timeout_secs, 45);
        assert!(settings.policy.enabled);
        assert_eq!(
            settings.policy.conditions.into_iter().collect::<Vec<_>>(),
            vec![BlockingCondition::RiskLevel]
        );
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[credentials]\napi_key = \"{KEY}\"\nbase_url = \"https://eu.securevector.io\""
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        let creds = Credentials::validate(&config.credentials.to_value()).unwrap();
        assert_eq!(creds.base_url(), "https://eu.securevector.io");
    }

    #[test]
    fn test_from_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::from_file(dir.path().join("missing.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));

        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[retry\nmax_retries = ").unwrap();
        let err = Config::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            (ENV_API_KEY, KEY),
            (ENV_BASE_URL, "https://api.securevector.io"),
            (ENV_TIMEOUT, "90"),
        ]
        .into_iter()
        .collect();

        let config = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.credentials.api_key.as_deref(), Some(KEY));
        assert_eq!(
            config.credentials.base_url.as_deref(),
            Some("https://api.securevector.io")
        );
        assert_eq!(config.scan.validate().unwrap().timeout_secs, 90);
    }

    #[test]
    fn test_from_lookup_ignores_garbage_timeout() {
        let config = Config::from_lookup(|k| (k == ENV_TIMEOUT).then(|| "soon".to_string()));
        assert_eq!(config.scan.timeout, Number::from(30));
    }

    #[test]
    fn test_merge_precedence() {
        let file = Config {
            credentials: CredentialsConfig {
                api_key: Some("from-file".into()),
                base_url: Some("https://scan.securevector.io".into()),
            },
            ..Default::default()
        };
        let env = Config {
            credentials: CredentialsConfig {
                api_key: Some("from-env".into()),
                base_url: None,
            },
            ..Default::default()
        };

        let merged = file.merge(env);
        assert_eq!(merged.credentials.api_key.as_deref(), Some("from-env"));
        assert_eq!(
            merged.credentials.base_url.as_deref(),
            Some("https://scan.securevector.io")
        );
    }

    #[test]
    fn test_merge_keeps_file_scan_settings_under_env_timeout() {
        let file: Config = toml::from_str(
            r#"
            [retry]
            max_retries = 5

            [scan]
            blockOnThreat = true
            threatThreshold = 70
            blockingConditions = ["score"]
            blockOnRiskLevels = ["critical"]
        "#,
        )
        .unwrap();
        let env = Config::from_lookup(|k| (k == ENV_TIMEOUT).then(|| "60".to_string()));

        let merged = file.merge(env);
        assert_eq!(merged.retry.max_retries, 5);

        let settings = merged.scan.validate().unwrap();
        assert_eq!(settings.timeout_secs, 60);
        assert!(settings.policy.enabled);
        assert_eq!(settings.policy.score_threshold, 70);
        assert_eq!(
            settings.policy.conditions.into_iter().collect::<Vec<_>>(),
            vec![BlockingCondition::Score]
        );
        assert_eq!(
            settings.policy.risk_levels.into_iter().collect::<Vec<_>>(),
            vec![crate::protocol::RiskLevel::Critical]
        );
    }

    #[test]
    fn test_merge_field_overrides() {
        let file = Config {
            retry: ExponentialBackoff {
                max_retries: 1,
                max_jitter_ms: 0,
                ..Default::default()
            },
            scan: ScanParameters {
                threat_threshold: 80,
                ..Default::default()
            },
            ..Default::default()
        };
        let cli = Config {
            retry: ExponentialBackoff {
                base_delay_ms: 250,
                ..Default::default()
            },
            scan: ScanParameters {
                threat_threshold: 20,
                include_metadata: true,
                ..Default::default()
            },
            ..Default::default()
        };

        let merged = file.merge(cli);
        assert_eq!(merged.retry.max_retries, 1);
        assert_eq!(merged.retry.max_jitter_ms, 0);
        assert_eq!(merged.retry.base_delay_ms, 250);
        assert_eq!(merged.scan.threat_threshold, 20);
        assert!(merged.scan.include_metadata);
    }

    #[test]
    fn test_credentials_debug_redacted() {
        let creds = CredentialsConfig {
            api_key: Some(KEY.into()),
            base_url: None,
        };
        let debug = format!("{creds:?}");
        assert!(!debug.contains(KEY));
        assert!(debug.contains(REDACTION_MARKER));
    }

    #[test]
    fn test_default_path() {
        if let Some(path) = Config::default_path() {
            assert!(path.ends_with("securevector/config.toml"));
        }
    }
}
