//! Configuration
//!
//! [`Config`] is what the caller hands in. [`ClientConfig`] is the resolved,
//! shared settings every sub-client is created from.

use crate::error::ClientError;
use crate::logging::ActionLevels;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::level_filters::LevelFilter;
use url::Url;

/// Public OpenAPI endpoint used when no base URL is configured
pub const DEFAULT_BASE_URL: &str = "https://api.ucloud.cn";

/// Request timeout for ordinary services
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Request timeout for the slow services (database, host, dedicated network, ...)
pub const LONG_TIMEOUT: Duration = Duration::from_secs(60);

/// Action whose logging is turned down in acceptance-test mode
const NOISY_ACTION: &str = "GetRegion";

/// Caller-supplied configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub public_key: String,
    pub private_key: String,
    /// Named profile in the shared credentials file; takes priority over keys
    pub profile: String,
    /// Overrides `~/.ucloud/credential.json`
    pub shared_credentials_file: Option<PathBuf>,
    pub assume_role: Option<AssumeRoleConfig>,
    pub region: String,
    pub project_id: String,
    pub insecure: bool,
    pub base_url: String,
    pub max_retries: u32,
}

/// Parameters for exchanging credentials through STS `AssumeRole`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AssumeRoleConfig {
    #[serde(rename = "duration_seconds", with = "duration_secs")]
    pub duration: Duration,
    pub role_urn: String,
    #[serde(default)]
    pub policy: String,
    pub session_name: String,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Settings shared by all sub-clients of one bundle
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub region: String,
    pub project_id: String,
    pub base_url: Url,
    pub timeout: Duration,
    pub max_retries: u32,
    pub insecure: bool,
    pub user_agent: String,
    pub log_level: LevelFilter,
    pub action_levels: ActionLevels,
}

impl ClientConfig {
    /// Derive the shared configuration from the caller's settings
    pub fn new(config: &Config, acceptance_test: bool) -> Result<Self, ClientError> {
        let raw_url = if config.base_url.is_empty() {
            DEFAULT_BASE_URL
        } else {
            config.base_url.as_str()
        };
        let base_url = Url::parse(raw_url).map_err(|source| ClientError::InvalidBaseUrl {
            value: raw_url.to_string(),
            source,
        })?;

        let mut client_config = Self {
            region: config.region.clone(),
            project_id: config.project_id.clone(),
            base_url,
            timeout: DEFAULT_TIMEOUT,
            max_retries: config.max_retries,
            insecure: config.insecure,
            user_agent: format!("ucloud-client/{}", env!("CARGO_PKG_VERSION")),
            log_level: LevelFilter::OFF,
            action_levels: ActionLevels::default(),
        };

        if acceptance_test {
            client_config.log_level = LevelFilter::DEBUG;
            client_config
                .action_levels
                .set(NOISY_ACTION, LevelFilter::WARN);
        }

        Ok(client_config)
    }

    /// Copy of this configuration with a different request timeout
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            timeout,
            ..self.clone()
        }
    }

    /// Effective log level for an action
    pub fn action_level(&self, action: &str) -> LevelFilter {
        self.action_levels.get(action).unwrap_or(self.log_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ClientConfig::new(&Config::default(), false).unwrap();
        assert_eq!(cfg.base_url.as_str(), "https://api.ucloud.cn/");
        assert_eq!(cfg.timeout, DEFAULT_TIMEOUT);
        assert_eq!(cfg.log_level, LevelFilter::OFF);
        assert_eq!(cfg.action_level("GetRegion"), LevelFilter::OFF);
    }

    #[test]
    fn test_acceptance_mode_levels() {
        let cfg = ClientConfig::new(&Config::default(), true).unwrap();
        assert_eq!(cfg.log_level, LevelFilter::DEBUG);
        assert_eq!(cfg.action_level("GetRegion"), LevelFilter::WARN);
        assert_eq!(cfg.action_level("DescribeUHostInstance"), LevelFilter::DEBUG);
    }

    #[test]
    fn test_invalid_base_url() {
        let config = Config {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        let err = ClientConfig::new(&config, false).unwrap_err();
        assert!(matches!(err, ClientError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn test_with_timeout_keeps_other_fields() {
        let config = Config {
            region: "cn-bj2".to_string(),
            max_retries: 3,
            ..Default::default()
        };
        let cfg = ClientConfig::new(&config, false).unwrap();
        let long = cfg.with_timeout(LONG_TIMEOUT);
        assert_eq!(long.timeout, LONG_TIMEOUT);
        assert_eq!(long.region, "cn-bj2");
        assert_eq!(long.max_retries, 3);
        assert_eq!(cfg.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_deserialize_config() {
        let config: Config = serde_json::from_str(
            r#"{
                "region": "cn-sh2",
                "profile": "dev",
                "assume_role": {
                    "duration_seconds": 900,
                    "role_urn": "ucs:iam::123:role/ops",
                    "session_name": "tf"
                }
            }"#,
        )
        .unwrap();
        assert_eq!(config.region, "cn-sh2");
        assert_eq!(config.profile, "dev");
        let assume_role = config.assume_role.unwrap();
        assert_eq!(assume_role.duration, Duration::from_secs(900));
        assert!(assume_role.policy.is_empty());
    }
}
