//! STS session exchange
//!
//! Swaps a long-lived key pair for short-lived session credentials through
//! the `AssumeRole` action.

use super::auth::Credential;
use super::http::ServiceClient;
use crate::config::AssumeRoleConfig;
use crate::error::{ApiError, ClientError};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Product name of the security token service
pub const STS_PRODUCT: &str = "sts";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AssumeRoleResponse {
    credentials: StsCredentials,
}

/// Session credentials returned by `AssumeRole`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StsCredentials {
    pub access_key_id: String,
    pub access_key_secret: String,
    pub security_token: String,
    /// RFC 3339 timestamp
    pub expiration: String,
}

impl StsCredentials {
    /// Convert into an expiring session credential
    pub fn into_credential(self) -> Result<Credential, ClientError> {
        let expires = DateTime::parse_from_rfc3339(&self.expiration)
            .map_err(|source| ClientError::TimeParse {
                value: self.expiration.clone(),
                source,
            })?
            .with_timezone(&Utc);

        Ok(Credential {
            public_key: self.access_key_id,
            private_key: self.access_key_secret,
            security_token: Some(self.security_token),
            can_expire: true,
            expires: Some(expires),
        })
    }
}

fn assume_role_params(assume_role: &AssumeRoleConfig) -> Map<String, Value> {
    let mut params = Map::new();
    params.insert("RoleUrn".to_string(), Value::String(assume_role.role_urn.clone()));
    params.insert(
        "RoleSessionName".to_string(),
        Value::String(assume_role.session_name.clone()),
    );
    params.insert("Policy".to_string(), Value::String(assume_role.policy.clone()));
    params.insert(
        "DurationSeconds".to_string(),
        Value::from(assume_role.duration.as_secs()),
    );
    params
}

/// Exchange the credential `sts` was built with for a session credential
pub async fn assume_role(
    sts: &ServiceClient,
    assume_role: &AssumeRoleConfig,
) -> Result<Credential, ClientError> {
    tracing::info!(
        "Assuming role {} as session {}",
        assume_role.role_urn,
        assume_role.session_name
    );

    let response = sts
        .invoke("AssumeRole", assume_role_params(assume_role))
        .await
        .map_err(ClientError::AssumeRole)?;

    let response: AssumeRoleResponse = serde_json::from_value(response)
        .map_err(|e| ClientError::AssumeRole(ApiError::Decode(e)))?;

    let credential = response.credentials.into_credential()?;
    tracing::info!("Obtained STS credential, expires at {:?}", credential.expires);
    Ok(credential)
}
