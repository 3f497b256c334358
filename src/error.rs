//! Error types
//!
//! Every failure while building a [`UCloudClient`](crate::UCloudClient) is
//! terminal: the caller gets a [`ClientError`] and no bundle.

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned while resolving credentials and assembling the client bundle
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("cannot load shared {profile:?} credential file {}, {source}", .path.display())]
    CredentialFile {
        profile: String,
        path: PathBuf,
        #[source]
        source: CredentialFileError,
    },

    #[error("must set credential about public_key and private_key, {reason}")]
    MissingCredential {
        reason: String,
        #[source]
        source: Option<CredentialFileError>,
    },

    #[error("fail to assume role, {0}")]
    AssumeRole(#[source] ApiError),

    #[error("fail to parse expiration time {value:?}, {source}")]
    TimeParse {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("invalid base url {value:?}, {source}")]
    InvalidBaseUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to create HTTP client, {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Problems reading a credential file
#[derive(Error, Debug)]
pub enum CredentialFileError {
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("profile {0:?} not found")]
    ProfileNotFound(String),

    #[error("profile {0:?} is incomplete")]
    IncompleteProfile(String),
}

/// Errors from a single API invocation
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API request failed: {0}")]
    Status(reqwest::StatusCode),

    #[error("failed to parse response JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("invalid value for header {0}")]
    InvalidHeader(&'static str),
}
