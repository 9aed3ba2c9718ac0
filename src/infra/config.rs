//! Configuration loading from TOML files
//!
//! The CLI selects the file via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml

use crate::domain::types::PersonId;
use anyhow::Context;
use chrono::Duration;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_MIN_SESSION_SECONDS: i64 = 300;
pub const DEFAULT_MAX_SESSION_GAP_SECONDS: i64 = 120;
pub const DEFAULT_TOLERANCE_MINUTES: i64 = 10;

/// Upper bound for the second-valued policy constants (one week)
pub const MAX_POLICY_SECONDS: i64 = 7 * 24 * 60 * 60;
/// Upper bound for `tolerance_minutes` (one week)
pub const MAX_TOLERANCE_MINUTES: i64 = MAX_POLICY_SECONDS / 60;

/// Fatal configuration problems
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{name} must be greater than zero (got {value})")]
    NonPositive { name: &'static str, value: i64 },
    #[error("{name} must be at most {max} (got {value})")]
    OutOfRange { name: &'static str, value: i64, max: i64 },
}

/// Policy constants shared by the inference and rule engines.
///
/// Read-only for the lifetime of a run. Construct through [`Policy::new`],
/// which rejects zero, negative or out-of-range values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    min_session_seconds: i64,
    max_session_gap_seconds: i64,
    tolerance_minutes: i64,
}

impl Policy {
    pub fn new(
        min_session_seconds: i64,
        max_session_gap_seconds: i64,
        tolerance_minutes: i64,
    ) -> Result<Self, ConfigError> {
        for (name, value, max) in [
            ("min_session_seconds", min_session_seconds, MAX_POLICY_SECONDS),
            ("max_session_gap_seconds", max_session_gap_seconds, MAX_POLICY_SECONDS),
            ("tolerance_minutes", tolerance_minutes, MAX_TOLERANCE_MINUTES),
        ] {
            if value <= 0 {
                return Err(ConfigError::NonPositive { name, value });
            }
            if value > max {
                return Err(ConfigError::OutOfRange { name, value, max });
            }
        }
        Ok(Self { min_session_seconds, max_session_gap_seconds, tolerance_minutes })
    }

    pub fn min_session_seconds(&self) -> i64 {
        self.min_session_seconds
    }

    pub fn max_session_gap_seconds(&self) -> i64 {
        self.max_session_gap_seconds
    }

    pub fn tolerance_minutes(&self) -> i64 {
        self.tolerance_minutes
    }

    /// Shortest co-presence window kept as a session
    pub fn min_session(&self) -> Duration {
        Duration::seconds(self.min_session_seconds)
    }

    /// Largest gap between sightings that still counts as co-presence
    pub fn max_session_gap(&self) -> Duration {
        Duration::seconds(self.max_session_gap_seconds)
    }

    /// Grace period added to an official session end
    pub fn tolerance(&self) -> Duration {
        Duration::minutes(self.tolerance_minutes)
    }

    /// Copy with any provided values replaced, re-validated
    pub fn with_overrides(
        &self,
        min_session_seconds: Option<i64>,
        max_session_gap_seconds: Option<i64>,
        tolerance_minutes: Option<i64>,
    ) -> Result<Self, ConfigError> {
        Self::new(
            min_session_seconds.unwrap_or(self.min_session_seconds),
            max_session_gap_seconds.unwrap_or(self.max_session_gap_seconds),
            tolerance_minutes.unwrap_or(self.tolerance_minutes),
        )
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            min_session_seconds: DEFAULT_MIN_SESSION_SECONDS,
            max_session_gap_seconds: DEFAULT_MAX_SESSION_GAP_SECONDS,
            tolerance_minutes: DEFAULT_TOLERANCE_MINUTES,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SiteConfig {
    /// Site identifier included in logs (e.g., "downtown")
    #[serde(default = "default_site_id")]
    pub id: String,
}

fn default_site_id() -> String {
    "gym".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_min_session_seconds")]
    pub min_session_seconds: i64,
    #[serde(default = "default_max_session_gap_seconds")]
    pub max_session_gap_seconds: i64,
    #[serde(default = "default_tolerance_minutes")]
    pub tolerance_minutes: i64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            min_session_seconds: default_min_session_seconds(),
            max_session_gap_seconds: default_max_session_gap_seconds(),
            tolerance_minutes: default_tolerance_minutes(),
        }
    }
}

fn default_min_session_seconds() -> i64 {
    DEFAULT_MIN_SESSION_SECONDS
}

fn default_max_session_gap_seconds() -> i64 {
    DEFAULT_MAX_SESSION_GAP_SECONDS
}

fn default_tolerance_minutes() -> i64 {
    DEFAULT_TOLERANCE_MINUTES
}

/// Declared trainer and member identities considered for session inference
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RosterConfig {
    #[serde(default)]
    pub trainers: Vec<String>,
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EgressConfig {
    /// File path for inferred sessions (JSONL format)
    #[serde(default = "default_sessions_file")]
    pub sessions_file: String,
    /// File path for violations (CSV format)
    #[serde(default = "default_violations_file")]
    pub violations_file: String,
}

impl Default for EgressConfig {
    fn default() -> Self {
        Self { sessions_file: default_sessions_file(), violations_file: default_violations_file() }
    }
}

fn default_sessions_file() -> String {
    "data/sessions_inferred.jsonl".to_string()
}

fn default_violations_file() -> String {
    "data/violations.csv".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub roster: RosterConfig,
    #[serde(default)]
    pub egress: EgressConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    site_id: String,
    policy: Policy,
    trainers: Vec<PersonId>,
    members: Vec<PersonId>,
    sessions_file: String,
    violations_file: String,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site_id: default_site_id(),
            policy: Policy::default(),
            trainers: Vec::new(),
            members: Vec::new(),
            sessions_file: default_sessions_file(),
            violations_file: default_violations_file(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str, source: &str) -> anyhow::Result<Self> {
        let toml_config: TomlConfig =
            toml::from_str(content).with_context(|| format!("Failed to parse config {}", source))?;

        let policy = Policy::new(
            toml_config.policy.min_session_seconds,
            toml_config.policy.max_session_gap_seconds,
            toml_config.policy.tolerance_minutes,
        )
        .with_context(|| format!("Invalid policy in {}", source))?;

        Ok(Self {
            site_id: toml_config.site.id,
            policy,
            trainers: parse_roster(&toml_config.roster.trainers),
            members: parse_roster(&toml_config.roster.members),
            sessions_file: toml_config.egress.sessions_file,
            violations_file: toml_config.egress.violations_file,
            config_file: source.to_string(),
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    /// Load configuration from a path, falling back to defaults only when
    /// the file does not exist. Parse and policy errors are returned.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(config_file = %path.display(), "config_file_missing_using_defaults");
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn trainers(&self) -> &[PersonId] {
        &self.trainers
    }

    pub fn members(&self) -> &[PersonId] {
        &self.members
    }

    pub fn sessions_file(&self) -> &str {
        &self.sessions_file
    }

    pub fn violations_file(&self) -> &str {
        &self.violations_file
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Replace the policy, e.g. after applying CLI overrides
    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }
}

fn parse_roster(raw: &[String]) -> Vec<PersonId> {
    raw.iter().filter_map(|id| PersonId::parse(id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.site_id(), "gym");
        assert_eq!(config.policy().min_session_seconds(), 300);
        assert_eq!(config.policy().max_session_gap_seconds(), 120);
        assert_eq!(config.policy().tolerance_minutes(), 10);
        assert!(config.trainers().is_empty());
        assert_eq!(config.violations_file(), "data/violations.csv");
    }

    #[test]
    fn test_policy_rejects_non_positive() {
        assert_eq!(
            Policy::new(0, 120, 10),
            Err(ConfigError::NonPositive { name: "min_session_seconds", value: 0 })
        );
        assert_eq!(
            Policy::new(300, -5, 10),
            Err(ConfigError::NonPositive { name: "max_session_gap_seconds", value: -5 })
        );
        assert!(Policy::new(300, 120, 0).is_err());
        assert!(Policy::new(1, 1, 1).is_ok());
    }

    #[test]
    fn test_policy_rejects_out_of_range() {
        assert_eq!(
            Policy::new(300, 120, 1_000_000_000_000),
            Err(ConfigError::OutOfRange {
                name: "tolerance_minutes",
                value: 1_000_000_000_000,
                max: MAX_TOLERANCE_MINUTES,
            })
        );
        assert!(Policy::new(i64::MAX, 120, 10).is_err());
        assert!(Policy::new(300, MAX_POLICY_SECONDS + 1, 10).is_err());
        assert!(Policy::new(MAX_POLICY_SECONDS, MAX_POLICY_SECONDS, MAX_TOLERANCE_MINUTES).is_ok());
        assert!(Policy::default().with_overrides(None, None, Some(i64::MAX)).is_err());
    }

    #[test]
    fn test_policy_overrides() {
        let policy = Policy::default().with_overrides(None, Some(60), None).unwrap();
        assert_eq!(policy.max_session_gap_seconds(), 60);
        assert_eq!(policy.min_session_seconds(), 300);
        assert!(Policy::default().with_overrides(Some(-1), None, None).is_err());
        assert_eq!(Policy::default().tolerance(), Duration::minutes(10));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml_str("[policy]\ntolerance_minutes = 15\n", "inline").unwrap();
        assert_eq!(config.policy().tolerance_minutes(), 15);
        assert_eq!(config.policy().min_session_seconds(), 300);
        assert_eq!(config.sessions_file(), "data/sessions_inferred.jsonl");
    }

    #[test]
    fn test_roster_trims_and_skips_blank() {
        let toml = "[roster]\ntrainers = [\" T001 \", \"\"]\nmembers = [\"M001\"]\n";
        let config = Config::from_toml_str(toml, "inline").unwrap();
        assert_eq!(config.trainers(), &[PersonId::from("T001")]);
        assert_eq!(config.members(), &[PersonId::from("M001")]);
    }

    #[test]
    fn test_invalid_policy_is_error() {
        let err = Config::from_toml_str("[policy]\nmin_session_seconds = 0\n", "inline");
        assert!(err.is_err());
    }
}
