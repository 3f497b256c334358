//! HTTP utilities for UCloud OpenAPI calls
//!
//! Every service speaks the same protocol: a signed JSON POST to the API
//! endpoint naming an `Action`. [`ServiceClient`] is that transport, bound to
//! one product and one configuration.

use super::auth::Credential;
use crate::config::ClientConfig;
use crate::error::ApiError;
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde_json::{Map, Value};
use sha1::{Digest, Sha1};
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing::Level;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// An outgoing API call, open to mutation by [`RequestHandler`]s
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub action: String,
    pub params: Map<String, Value>,
    pub headers: HeaderMap,
}

impl ApiRequest {
    pub fn new(action: &str) -> Self {
        let mut params = Map::new();
        params.insert("Action".to_string(), Value::String(action.to_string()));
        Self {
            action: action.to_string(),
            params,
            headers: HeaderMap::new(),
        }
    }
}

/// Hook run on every request a client sends, after signing
pub trait RequestHandler: Send + Sync {
    fn handle(&self, request: &mut ApiRequest) -> Result<(), ApiError>;
}

/// Build the HTTP client shared by every sub-client of a bundle
pub fn build_http_client(config: &ClientConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .danger_accept_invalid_certs(config.insecure)
        .build()
}

/// Compute the request signature: SHA-1 over the key-sorted `key + value`
/// pairs followed by the private key
pub fn sign(params: &Map<String, Value>, private_key: &str) -> String {
    let mut keys: Vec<&String> = params.keys().collect();
    keys.sort();

    let mut hasher = Sha1::new();
    for key in keys {
        hasher.update(key.as_bytes());
        hasher.update(param_to_string(&params[key.as_str()]).as_bytes());
    }
    hasher.update(private_key.as_bytes());
    hex::encode(hasher.finalize())
}

fn param_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Client for one UCloud product
#[derive(Clone)]
pub struct ServiceClient {
    product: &'static str,
    config: ClientConfig,
    credential: Arc<Credential>,
    http: Client,
    handlers: Vec<Arc<dyn RequestHandler>>,
}

impl ServiceClient {
    pub fn new(
        product: &'static str,
        config: ClientConfig,
        credential: Arc<Credential>,
        http: Client,
    ) -> Self {
        Self {
            product,
            config,
            credential,
            http,
            handlers: Vec::new(),
        }
    }

    /// Attach request handlers, run in the given order
    pub fn with_handlers(mut self, handlers: &[Arc<dyn RequestHandler>]) -> Self {
        self.handlers.extend(handlers.iter().cloned());
        self
    }

    pub fn product(&self) -> &'static str {
        self.product
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Build the signed request for `action` and run the handlers over it
    pub fn prepare(&self, action: &str, params: Map<String, Value>) -> Result<ApiRequest, ApiError> {
        let mut request = ApiRequest::new(action);
        if !self.config.region.is_empty() {
            request
                .params
                .insert("Region".to_string(), Value::String(self.config.region.clone()));
        }
        if !self.config.project_id.is_empty() {
            request.params.insert(
                "ProjectId".to_string(),
                Value::String(self.config.project_id.clone()),
            );
        }
        // Caller params override the defaults above
        request.params.extend(params);

        if self.credential.has_keys() {
            request.params.insert(
                "PublicKey".to_string(),
                Value::String(self.credential.public_key.clone()),
            );
            if let Some(token) = &self.credential.security_token {
                request
                    .params
                    .insert("SecurityToken".to_string(), Value::String(token.clone()));
            }
            let signature = sign(&request.params, &self.credential.private_key);
            request
                .params
                .insert("Signature".to_string(), Value::String(signature));
        }

        for handler in &self.handlers {
            handler.handle(&mut request)?;
        }

        Ok(request)
    }

    /// Invoke an API action, retrying connection failures and 5xx responses
    pub async fn invoke(&self, action: &str, params: Map<String, Value>) -> Result<Value, ApiError> {
        let request = self.prepare(action, params)?;
        let level = self.config.action_level(action);

        let mut attempt = 0;
        loop {
            match self.send(&request, level).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.config.max_retries && is_retryable(&err) => {
                    attempt += 1;
                    if level >= Level::WARN {
                        tracing::warn!(
                            "{} {} failed ({}), retry {}/{}",
                            self.product,
                            action,
                            err,
                            attempt,
                            self.config.max_retries
                        );
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn send(&self, request: &ApiRequest, level: LevelFilter) -> Result<Value, ApiError> {
        if level >= Level::DEBUG {
            tracing::debug!("POST {} {} {}", self.config.base_url, self.product, request.action);
        }

        let response = self
            .http
            .post(self.config.base_url.clone())
            .headers(request.headers.clone())
            .timeout(self.config.timeout)
            .json(&request.params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            if level >= Level::ERROR {
                tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            }
            return Err(ApiError::Status(status));
        }

        if level >= Level::DEBUG {
            tracing::debug!("{} response: {}", request.action, sanitize_for_log(&body));
        }

        let value: Value = serde_json::from_str(&body)?;
        let code = value.get("RetCode").and_then(Value::as_i64).unwrap_or(0);
        if code != 0 {
            let message = value
                .get("Message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(ApiError::Api { code, message });
        }

        Ok(value)
    }
}

fn is_retryable(err: &ApiError) -> bool {
    match err {
        ApiError::Http(e) => e.is_connect() || e.is_timeout(),
        ApiError::Status(status) => status.is_server_error(),
        _ => false,
    }
}
