//! UCloud Authentication
//!
//! Resolves which authentication material a client bundle uses. Sources are
//! tried in a fixed order and the first one that applies wins:
//!
//! 1. a named profile in the shared credentials file
//! 2. an explicit public/private key pair
//! 3. a cloud shell browser session (cookie + CSRF token)

use super::http::{ApiRequest, RequestHandler};
use crate::config::Config;
use crate::error::{ApiError, ClientError, CredentialFileError};
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderName, HeaderValue, COOKIE};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Environment variable marking a cloud shell execution context
pub const CLOUD_SHELL_ENV: &str = "CLOUD_SHELL";

/// Environment variable enabling acceptance-test mode
pub const ACCEPTANCE_TEST_ENV: &str = "TF_ACC";

/// Profile selected from the cloud shell session file
pub const DEFAULT_PROFILE: &str = "default";

/// Header carrying the cloud shell CSRF token
pub const CSRF_TOKEN_HEADER: &str = "Csrf-Token";

const CSRF_TOKEN: HeaderName = HeaderName::from_static("csrf-token");

/// Authentication material used to sign requests
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential {
    pub public_key: String,
    pub private_key: String,
    /// Present only on session credentials obtained through STS
    pub security_token: Option<String>,
    pub can_expire: bool,
    pub expires: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn from_keys(public_key: &str, private_key: &str) -> Self {
        Self {
            public_key: public_key.to_string(),
            private_key: private_key.to_string(),
            ..Default::default()
        }
    }

    /// True when there is key material to sign with
    pub fn has_keys(&self) -> bool {
        !self.public_key.is_empty() && !self.private_key.is_empty()
    }

    /// Check whether a session credential has passed its expiry
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match (self.can_expire, self.expires) {
            (true, Some(expires)) => now >= expires,
            _ => false,
        }
    }
}

// Security: never print secrets
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .field("security_token", &self.security_token.as_ref().map(|_| "<redacted>"))
            .field("can_expire", &self.can_expire)
            .field("expires", &self.expires)
            .finish()
    }
}

/// Snapshot of the process state credential resolution depends on
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub cloud_shell: bool,
    pub acceptance_test: bool,
    pub home_dir: Option<PathBuf>,
}

impl Environment {
    /// Capture the current process environment
    pub fn from_process() -> Self {
        Self {
            cloud_shell: std::env::var(CLOUD_SHELL_ENV)
                .map(|v| is_truthy(&v))
                .unwrap_or(false),
            acceptance_test: std::env::var(ACCEPTANCE_TEST_ENV)
                .map(|v| !v.is_empty())
                .unwrap_or(false),
            home_dir: dirs::home_dir(),
        }
    }

    /// `<home>/.ucloud/credential.json`
    pub fn default_credential_path(&self) -> Option<PathBuf> {
        self.home_dir
            .as_ref()
            .map(|home| home.join(".ucloud").join("credential.json"))
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

/// One entry of a credential file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileEntry {
    pub profile: String,
    pub public_key: String,
    pub private_key: String,
    pub cookie: String,
    pub csrf_token: String,
}

/// Read a credential file (a JSON array of profile entries)
pub fn load_profile_entries(path: &Path) -> Result<Vec<ProfileEntry>, CredentialFileError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Load a key pair for `profile` from the shared credentials file
pub fn load_shared_credential(path: &Path, profile: &str) -> Result<Credential, CredentialFileError> {
    let entries = load_profile_entries(path)?;
    let entry = entries
        .into_iter()
        .find(|e| e.profile == profile)
        .ok_or_else(|| CredentialFileError::ProfileNotFound(profile.to_string()))?;

    let credential = Credential::from_keys(&entry.public_key, &entry.private_key);
    if !credential.has_keys() {
        return Err(CredentialFileError::IncompleteProfile(profile.to_string()));
    }
    Ok(credential)
}

/// Sets the cloud shell session headers on every outgoing request
#[derive(Clone)]
pub struct CloudShellHeaders {
    cookie: HeaderValue,
    csrf_token: HeaderValue,
}

impl CloudShellHeaders {
    /// Fails when either value cannot be sent as an HTTP header
    pub fn new(cookie: &str, csrf_token: &str) -> Result<Self, ApiError> {
        let mut cookie =
            HeaderValue::from_str(cookie).map_err(|_| ApiError::InvalidHeader("Cookie"))?;
        let mut csrf_token = HeaderValue::from_str(csrf_token)
            .map_err(|_| ApiError::InvalidHeader(CSRF_TOKEN_HEADER))?;
        cookie.set_sensitive(true);
        csrf_token.set_sensitive(true);
        Ok(Self { cookie, csrf_token })
    }
}

impl fmt::Debug for CloudShellHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CloudShellHeaders { .. }")
    }
}

impl RequestHandler for CloudShellHeaders {
    fn handle(&self, request: &mut ApiRequest) -> Result<(), ApiError> {
        request.headers.insert(COOKIE, self.cookie.clone());
        request.headers.insert(CSRF_TOKEN, self.csrf_token.clone());
        Ok(())
    }
}

/// Outcome of credential resolution
#[derive(Clone)]
pub struct ResolvedCredential {
    pub credential: Credential,
    /// Hooks every sub-client must run (only set by the cloud shell source)
    pub handlers: Vec<Arc<dyn RequestHandler>>,
    pub source: CredentialStrategy,
}

impl fmt::Debug for ResolvedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedCredential")
            .field("credential", &self.credential)
            .field("handlers", &self.handlers.len())
            .field("source", &self.source)
            .finish()
    }
}

/// A credential source, tried in [`CredentialStrategy::ORDER`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStrategy {
    SharedFile,
    ExplicitKeys,
    CloudShell,
}

impl CredentialStrategy {
    pub const ORDER: [CredentialStrategy; 3] = [
        CredentialStrategy::SharedFile,
        CredentialStrategy::ExplicitKeys,
        CredentialStrategy::CloudShell,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::SharedFile => "shared-credentials-file",
            Self::ExplicitKeys => "explicit-keys",
            Self::CloudShell => "cloud-shell",
        }
    }

    /// `Ok(None)` means this source does not apply and the next one is tried.
    /// An error stops resolution.
    pub fn try_resolve(
        self,
        config: &Config,
        env: &Environment,
    ) -> Result<Option<ResolvedCredential>, ClientError> {
        let resolved = match self {
            Self::SharedFile => {
                if config.profile.is_empty() {
                    return Ok(None);
                }
                let path = config
                    .shared_credentials_file
                    .clone()
                    .or_else(|| env.default_credential_path())
                    .unwrap_or_else(|| PathBuf::from(".ucloud/credential.json"));
                let credential =
                    load_shared_credential(&path, &config.profile).map_err(|source| {
                        ClientError::CredentialFile {
                            profile: config.profile.clone(),
                            path: path.clone(),
                            source,
                        }
                    })?;
                ResolvedCredential {
                    credential,
                    handlers: Vec::new(),
                    source: self,
                }
            }
            Self::ExplicitKeys => {
                if config.public_key.is_empty() || config.private_key.is_empty() {
                    return Ok(None);
                }
                ResolvedCredential {
                    credential: Credential::from_keys(&config.public_key, &config.private_key),
                    handlers: Vec::new(),
                    source: self,
                }
            }
            Self::CloudShell => {
                if !env.cloud_shell {
                    return Ok(None);
                }
                let headers = load_cloud_shell_session(env)?;
                ResolvedCredential {
                    credential: Credential::default(),
                    handlers: vec![Arc::new(headers)],
                    source: self,
                }
            }
        };
        Ok(Some(resolved))
    }
}

fn load_cloud_shell_session(env: &Environment) -> Result<CloudShellHeaders, ClientError> {
    let Some(path) = env.default_credential_path() else {
        return Err(ClientError::MissingCredential {
            reason: "cannot determine home directory".to_string(),
            source: None,
        });
    };

    let entries = load_profile_entries(&path).map_err(|source| ClientError::MissingCredential {
        reason: format!("cannot load cloud shell credential {}", path.display()),
        source: Some(source),
    })?;

    match entries.iter().find(|e| e.profile == DEFAULT_PROFILE) {
        Some(entry) if !entry.cookie.is_empty() && !entry.csrf_token.is_empty() => {
            CloudShellHeaders::new(&entry.cookie, &entry.csrf_token).map_err(|e| {
                ClientError::MissingCredential {
                    reason: format!("default credential is unusable, {}", e),
                    source: None,
                }
            })
        }
        _ => Err(ClientError::MissingCredential {
            reason: "default credential is null".to_string(),
            source: None,
        }),
    }
}

/// Resolve exactly one credential from `config` and `env`
pub fn resolve_credential(
    config: &Config,
    env: &Environment,
) -> Result<ResolvedCredential, ClientError> {
    for strategy in CredentialStrategy::ORDER {
        if let Some(resolved) = strategy.try_resolve(config, env)? {
            tracing::info!("Resolved credential from {}", strategy.name());
            return Ok(resolved);
        }
    }

    Err(ClientError::MissingCredential {
        reason: "no credential source configured".to_string(),
        source: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn cloud_shell_env(home: &Path, content: &str) -> Environment {
        std::fs::create_dir_all(home.join(".ucloud")).unwrap();
        write_file(&home.join(".ucloud"), "credential.json", content);
        Environment {
            cloud_shell: true,
            acceptance_test: false,
            home_dir: Some(home.to_path_buf()),
        }
    }

    #[test]
    fn test_profile_loaded_from_shared_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "cred.json",
            r#"[
                {"profile": "default", "public_key": "pub-a", "private_key": "priv-a"},
                {"profile": "dev", "public_key": "pub-b", "private_key": "priv-b"}
            ]"#,
        );
        let config = Config {
            profile: "dev".to_string(),
            shared_credentials_file: Some(path),
            public_key: "ignored".to_string(),
            private_key: "ignored".to_string(),
            ..Default::default()
        };

        let resolved = resolve_credential(&config, &Environment::default()).unwrap();
        assert_eq!(resolved.source, CredentialStrategy::SharedFile);
        assert_eq!(resolved.credential, Credential::from_keys("pub-b", "priv-b"));
        assert!(resolved.handlers.is_empty());
    }

    #[test]
    fn test_missing_profile_is_credential_file_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "cred.json", "[]");
        let config = Config {
            profile: "prod".to_string(),
            shared_credentials_file: Some(path),
            ..Default::default()
        };

        let err = resolve_credential(&config, &Environment::default()).unwrap_err();
        assert!(matches!(
            err,
            ClientError::CredentialFile {
                source: CredentialFileError::ProfileNotFound(_),
                ..
            }
        ));
    }

    #[test]
    fn test_malformed_shared_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "cred.json", "{not json");
        let config = Config {
            profile: "dev".to_string(),
            shared_credentials_file: Some(path),
            ..Default::default()
        };

        let err = resolve_credential(&config, &Environment::default()).unwrap_err();
        assert!(matches!(
            err,
            ClientError::CredentialFile {
                source: CredentialFileError::Json(_),
                ..
            }
        ));
    }

    #[test]
    fn test_missing_shared_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            profile: "dev".to_string(),
            shared_credentials_file: Some(dir.path().join("absent.json")),
            ..Default::default()
        };

        let err = resolve_credential(&config, &Environment::default()).unwrap_err();
        assert!(matches!(
            err,
            ClientError::CredentialFile {
                source: CredentialFileError::Io(_),
                ..
            }
        ));
    }

    #[test]
    fn test_explicit_keys() {
        let config = Config {
            public_key: "pub".to_string(),
            private_key: "priv".to_string(),
            ..Default::default()
        };
        let env = Environment {
            cloud_shell: true,
            ..Default::default()
        };

        let resolved = resolve_credential(&config, &env).unwrap();
        assert_eq!(resolved.source, CredentialStrategy::ExplicitKeys);
        assert_eq!(resolved.credential, Credential::from_keys("pub", "priv"));
    }

    #[test]
    fn test_half_key_pair_is_not_enough() {
        let config = Config {
            public_key: "pub".to_string(),
            ..Default::default()
        };

        let err = resolve_credential(&config, &Environment::default()).unwrap_err();
        assert!(matches!(err, ClientError::MissingCredential { .. }));
    }

    #[test]
    fn test_cloud_shell_session() {
        let home = tempfile::tempdir().unwrap();
        let env = cloud_shell_env(
            home.path(),
            r#"[{"profile": "other", "cookie": "X", "csrf_token": "Y"},
                {"profile": "default", "cookie": "C", "csrf_token": "T"}]"#,
        );

        let resolved = resolve_credential(&Config::default(), &env).unwrap();
        assert_eq!(resolved.source, CredentialStrategy::CloudShell);
        assert!(!resolved.credential.has_keys());
        assert_eq!(resolved.handlers.len(), 1);

        let mut request = ApiRequest::new("DescribeUHostInstance");
        resolved.handlers[0].handle(&mut request).unwrap();
        assert_eq!(request.headers.get(COOKIE).unwrap(), "C");
        assert_eq!(request.headers.get(CSRF_TOKEN_HEADER).unwrap(), "T");
    }

    #[test]
    fn test_cloud_shell_without_default_entry() {
        let home = tempfile::tempdir().unwrap();
        let env = cloud_shell_env(
            home.path(),
            r#"[{"profile": "other", "cookie": "X", "csrf_token": "Y"}]"#,
        );

        let err = resolve_credential(&Config::default(), &env).unwrap_err();
        assert!(matches!(err, ClientError::MissingCredential { source: None, .. }));
    }

    #[test]
    fn test_cloud_shell_with_incomplete_default_entry() {
        let home = tempfile::tempdir().unwrap();
        let env = cloud_shell_env(home.path(), r#"[{"profile": "default", "cookie": "C"}]"#);

        let err = resolve_credential(&Config::default(), &env).unwrap_err();
        assert!(matches!(err, ClientError::MissingCredential { .. }));
    }

    #[test]
    fn test_cloud_shell_rejects_invalid_header_values() {
        let home = tempfile::tempdir().unwrap();
        let env = cloud_shell_env(
            home.path(),
            r#"[{"profile": "default", "cookie": "a\nb", "csrf_token": "T"}]"#,
        );

        let err = resolve_credential(&Config::default(), &env).unwrap_err();
        assert!(matches!(err, ClientError::MissingCredential { source: None, .. }));
        assert!(err.to_string().contains("Cookie"));
    }

    #[test]
    fn test_cloud_shell_file_missing() {
        let home = tempfile::tempdir().unwrap();
        let env = Environment {
            cloud_shell: true,
            acceptance_test: false,
            home_dir: Some(home.path().to_path_buf()),
        };

        let err = resolve_credential(&Config::default(), &env).unwrap_err();
        assert!(matches!(
            err,
            ClientError::MissingCredential {
                source: Some(CredentialFileError::Io(_)),
                ..
            }
        ));
    }

    #[test]
    fn test_nothing_configured() {
        let err = resolve_credential(&Config::default(), &Environment::default()).unwrap_err();
        assert!(matches!(err, ClientError::MissingCredential { .. }));
    }

    #[test]
    fn test_is_truthy() {
        assert!(is_truthy("true"));
        assert!(is_truthy("TRUE"));
        assert!(is_truthy("1"));
        assert!(!is_truthy("false"));
        assert!(!is_truthy(""));
    }

    #[test]
    fn test_credential_expiry() {
        let expires = DateTime::parse_from_rfc3339("2030-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let credential = Credential {
            can_expire: true,
            expires: Some(expires),
            ..Credential::from_keys("a", "b")
        };
        let before = DateTime::parse_from_rfc3339("2029-12-31T23:59:59Z")
            .unwrap()
            .with_timezone(&Utc);
        assert!(!credential.is_expired(before));
        assert!(credential.is_expired(expires));
        assert!(!Credential::from_keys("a", "b").is_expired(expires));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let credential = Credential {
            security_token: Some("token-secret".to_string()),
            ..Credential::from_keys("pub", "priv-secret")
        };
        let printed = format!("{:?}", credential);
        assert!(printed.contains("pub"));
        assert!(!printed.contains("priv-secret"));
        assert!(!printed.contains("token-secret"));
    }
}
