//! UCloud API interaction module
//!
//! Credential resolution, the optional STS session exchange, and assembly of
//! the per-product clients.
//!
//! # Module Structure
//!
//! - [`auth`] - Credential sources and the cloud shell request hook
//! - [`client`] - Client bundle and its assembler
//! - [`http`] - Signed request transport shared by every product
//! - [`sts`] - `AssumeRole` session exchange
//!
//! # Example
//!
//! ```ignore
//! use ucloud_client::{Config, Service, UCloudClient};
//!
//! async fn example() -> Result<(), ucloud_client::ClientError> {
//!     let config = Config {
//!         public_key: "...".into(),
//!         private_key: "...".into(),
//!         region: "cn-bj2".into(),
//!         ..Default::default()
//!     };
//!     let client = UCloudClient::new(&config).await?;
//!     let hosts = client
//!         .service(Service::Uhost)
//!         .invoke("DescribeUHostInstance", Default::default())
//!         .await;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
pub mod sts;
