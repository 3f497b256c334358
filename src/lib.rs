//! Client assembly for the UCloud OpenAPI.
//!
//! Resolves credentials from a shared credentials file, explicit keys, or a
//! cloud shell session, optionally exchanges them for STS session
//! credentials, and builds one pre-configured client per product.

pub mod config;
pub mod error;
pub mod logging;
pub mod ucloud;

pub use config::{AssumeRoleConfig, ClientConfig, Config};
pub use error::{ApiError, ClientError, CredentialFileError};
pub use ucloud::auth::{Credential, CredentialStrategy, Environment};
pub use ucloud::client::{Service, UCloudClient};
pub use ucloud::http::{ApiRequest, RequestHandler, ServiceClient};
