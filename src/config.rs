//! Engine configuration.
//!
//! Everything here is consumed as already-validated input; loading only
//! checks that the JSON has the right shape.

use crate::executor::RetryPolicy;
use crate::promote::traits::{Ecosystem, PackageType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const DEFAULT_TIMEOUT_SECS: u64 = 400;
const DEFAULT_RELEASE_MARKER: &str = "release";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoterConfig {
    pub store: StoreConfig,

    /// Sends every transfer with the store's validate-only flag.
    #[serde(default)]
    pub dry_run: bool,

    /// Substring of a source repository name meaning the artifact already
    /// lives in the destination namespace.
    #[serde(default = "default_release_marker")]
    pub release_marker: String,

    #[serde(default = "default_retry_delays")]
    pub retry_delays_ms: Vec<u64>,

    #[serde(default)]
    pub repositories: BTreeMap<Ecosystem, RepositoryTargets>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub base_url: Url,
    pub token: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Destination repositories of one ecosystem, one per package type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryTargets {
    #[serde(default)]
    pub third_party: String,
    #[serde(default)]
    pub internal: String,
    #[serde(default)]
    pub development: String,
}

impl RepositoryTargets {
    pub fn for_package_type(&self, package_type: PackageType) -> Option<&str> {
        let repo = match package_type {
            PackageType::ClearedThirdParty => &self.third_party,
            PackageType::Internal => &self.internal,
            PackageType::Development => &self.development,
            PackageType::Unknown => return None,
        };
        (!repo.is_empty()).then_some(repo.as_str())
    }
}

impl PromoterConfig {
    pub fn new(base_url: Url, token: impl Into<String>) -> Self {
        Self {
            store: StoreConfig {
                base_url,
                token: token.into(),
                timeout_secs: DEFAULT_TIMEOUT_SECS,
            },
            dry_run: false,
            release_marker: default_release_marker(),
            retry_delays_ms: default_retry_delays(),
            repositories: BTreeMap::new(),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_retry_delays(mut self, delays_ms: &[u64]) -> Self {
        self.retry_delays_ms = delays_ms.to_vec();
        self
    }

    pub fn with_repositories(mut self, ecosystem: Ecosystem, targets: RepositoryTargets) -> Self {
        self.repositories.insert(ecosystem, targets);
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_millis(&self.retry_delays_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.store.timeout_secs)
    }

    pub fn destination(&self, ecosystem: Ecosystem, package_type: PackageType) -> Option<&str> {
        self.repositories
            .get(&ecosystem)
            .and_then(|targets| targets.for_package_type(package_type))
    }
}

fn default_release_marker() -> String {
    DEFAULT_RELEASE_MARKER.to_string()
}

fn default_retry_delays() -> Vec<u64> {
    vec![5_000, 10_000, 30_000]
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_from_minimal_json() {
        let config = PromoterConfig::from_json_str(
            r#"{
                "store": {"base_url": "https://store.example/artifactory", "token": "t0k"},
                "repositories": {
                    "NPM": {"third_party": "npm-thirdparty", "internal": "npm-internal"}
                }
            }"#,
        )
        .unwrap();

        assert!(!config.dry_run);
        assert_eq!(config.release_marker, "release");
        assert_eq!(config.timeout(), Duration::from_secs(400));
        assert_eq!(config.retry_policy().max_attempts(), 4);
        assert_eq!(
            config.destination(Ecosystem::Npm, PackageType::ClearedThirdParty),
            Some("npm-thirdparty")
        );
        assert_eq!(
            config.destination(Ecosystem::Npm, PackageType::Development),
            None
        );
        assert_eq!(
            config.destination(Ecosystem::Maven, PackageType::Internal),
            None
        );
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let err = PromoterConfig::from_json_str(
            r#"{"store": {"base_url": "not a url", "token": "t"}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = PromoterConfig::load(Path::new("/nonexistent/promoter.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
