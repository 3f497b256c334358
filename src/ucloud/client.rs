//! UCloud Client
//!
//! Builds the client bundle: one [`ServiceClient`] per product, all sharing
//! the resolved configuration and credential.

use super::auth::{resolve_credential, Credential, CredentialStrategy, Environment};
use super::http::{build_http_client, RequestHandler, ServiceClient};
use super::sts::{self, STS_PRODUCT};
use crate::config::{ClientConfig, Config, LONG_TIMEOUT};
use crate::error::ClientError;
use std::sync::Arc;

/// Products the bundle holds a client for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Uhost,
    Unet,
    Ulb,
    Vpc,
    Uaccount,
    Udisk,
    Udpn,
    Udb,
    Umem,
    IpsecVpn,
    Ufs,
    Us3,
    Cube,
    Uk8s,
    Uads,
    Iam,
    Label,
    Uphost,
    /// Private UMem API
    PrivateUmem,
}

impl Service {
    pub const COUNT: usize = 19;

    /// Every service, in declaration order
    pub const ALL: [Service; Service::COUNT] = [
        Service::Uhost,
        Service::Unet,
        Service::Ulb,
        Service::Vpc,
        Service::Uaccount,
        Service::Udisk,
        Service::Udpn,
        Service::Udb,
        Service::Umem,
        Service::IpsecVpn,
        Service::Ufs,
        Service::Us3,
        Service::Cube,
        Service::Uk8s,
        Service::Uads,
        Service::Iam,
        Service::Label,
        Service::Uphost,
        Service::PrivateUmem,
    ];

    /// Product name as used by the API
    pub fn product(self) -> &'static str {
        match self {
            Service::Uhost => "uhost",
            Service::Unet => "unet",
            Service::Ulb => "ulb",
            Service::Vpc => "vpc",
            Service::Uaccount => "uaccount",
            Service::Udisk => "udisk",
            Service::Udpn => "udpn",
            Service::Udb => "udb",
            Service::Umem | Service::PrivateUmem => "umem",
            Service::IpsecVpn => "ipsecvpn",
            Service::Ufs => "ufs",
            Service::Us3 => "ufile",
            Service::Cube => "cube",
            Service::Uk8s => "uk8s",
            Service::Uads => "uads",
            Service::Iam => "iam",
            Service::Label => "label",
            Service::Uphost => "uphost",
        }
    }

    /// Slow services get the long request timeout
    pub fn is_long_running(self) -> bool {
        matches!(
            self,
            Service::Udb | Service::Uhost | Service::Udpn | Service::Uk8s | Service::Uphost
        )
    }
}

/// Creates sub-clients that all share one configuration, credential and set
/// of request handlers
pub struct ClientAssembler {
    config: ClientConfig,
    long_config: ClientConfig,
    credential: Arc<Credential>,
    http: reqwest::Client,
    handlers: Vec<Arc<dyn RequestHandler>>,
}

impl ClientAssembler {
    pub fn new(config: ClientConfig, credential: Credential, http: reqwest::Client) -> Self {
        let long_config = config.with_timeout(LONG_TIMEOUT);
        Self {
            config,
            long_config,
            credential: Arc::new(credential),
            http,
            handlers: Vec::new(),
        }
    }

    pub fn with_handlers(mut self, handlers: Vec<Arc<dyn RequestHandler>>) -> Self {
        self.handlers = handlers;
        self
    }

    fn client(&self, product: &'static str, config: &ClientConfig) -> ServiceClient {
        ServiceClient::new(product, config.clone(), self.credential.clone(), self.http.clone())
            .with_handlers(&self.handlers)
    }

    pub fn service_client(&self, service: Service) -> ServiceClient {
        let config = if service.is_long_running() {
            &self.long_config
        } else {
            &self.config
        };
        self.client(service.product(), config)
    }

    /// Client for arbitrary actions; uses the long timeout
    pub fn generic_client(&self) -> ServiceClient {
        self.client("generic", &self.long_config)
    }

    pub fn assemble(self, source: CredentialStrategy) -> UCloudClient {
        let services = Service::ALL.map(|service| self.service_client(service));
        let generic = self.generic_client();

        tracing::info!(
            "Assembled {} service clients for region {:?}, {} request handler(s)",
            services.len() + 1,
            self.config.region,
            self.handlers.len()
        );

        UCloudClient {
            region: self.config.region.clone(),
            project_id: self.config.project_id.clone(),
            config: self.config,
            credential: self.credential,
            credential_source: source,
            services,
            generic,
        }
    }
}

/// Pre-configured clients for every UCloud product
#[derive(Clone)]
pub struct UCloudClient {
    region: String,
    project_id: String,
    config: ClientConfig,
    credential: Arc<Credential>,
    credential_source: CredentialStrategy,
    services: [ServiceClient; Service::COUNT],
    generic: ServiceClient,
}

impl UCloudClient {
    /// Build a client bundle using the current process environment
    pub async fn new(config: &Config) -> Result<Self, ClientError> {
        Self::with_environment(config, &Environment::from_process()).await
    }

    /// Build a client bundle against an explicit environment snapshot.
    ///
    /// When `config.assume_role` is set, the resolved credential is exchanged
    /// once through STS `AssumeRole`; that call is never retried. Unlike a
    /// bare STS client, the exchange client also runs the cloud shell request
    /// hook when the credential came from the cloud shell, since that session
    /// carries no key material to sign with.
    pub async fn with_environment(config: &Config, env: &Environment) -> Result<Self, ClientError> {
        let client_config = ClientConfig::new(config, env.acceptance_test)?;
        let http = build_http_client(&client_config).map_err(ClientError::HttpClient)?;

        let resolved = resolve_credential(config, env)?;

        let credential = match &config.assume_role {
            Some(assume_role) => {
                let sts_config = ClientConfig {
                    max_retries: 0,
                    ..client_config.clone()
                };
                let sts_client = ServiceClient::new(
                    STS_PRODUCT,
                    sts_config,
                    Arc::new(resolved.credential.clone()),
                    http.clone(),
                )
                .with_handlers(&resolved.handlers);
                sts::assume_role(&sts_client, assume_role).await?
            }
            None => resolved.credential,
        };

        Ok(ClientAssembler::new(client_config, credential, http)
            .with_handlers(resolved.handlers)
            .assemble(resolved.source))
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Shared configuration (default timeout profile)
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Which source the credential was resolved from
    pub fn credential_source(&self) -> CredentialStrategy {
        self.credential_source
    }

    /// Client for one product
    pub fn service(&self, service: Service) -> &ServiceClient {
        &self.services[service as usize]
    }

    /// Client for generic invocation of any action
    pub fn generic(&self) -> &ServiceClient {
        &self.generic
    }

    /// Every sub-client, the generic one last
    pub fn all_clients(&self) -> impl Iterator<Item = &ServiceClient> {
        self.services.iter().chain(std::iter::once(&self.generic))
    }
}
