//! Injected HTTP client used to reach the provider and remote pact hosts.
//!
//! The verifier never builds network connections itself. Callers hand it an
//! [`HttpClient`], which lets them bring their own TLS configuration, proxies,
//! timeouts or instrumentation. [`ReqwestClient`] is the stock implementation.

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Method};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Failure to exchange a request with a remote host.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Network or protocol failure reported by reqwest
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The request could not be constructed
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Outbound request built from an interaction.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL including query string
    pub url: Url,
    /// Request headers in send order
    pub headers: Vec<(String, String)>,
    /// Serialized body
    pub body: Option<Vec<u8>>,
}

impl ProviderRequest {
    /// Create a body-less request with no headers.
    #[must_use]
    pub const fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
        }
    }
}

/// Response received from the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers as received
    pub headers: Vec<(String, String)>,
    /// Raw body bytes
    pub body: Vec<u8>,
}

impl ProviderResponse {
    /// Look up a header by case-insensitive name.
    ///
    /// Repeated headers are joined with `", "`.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<String> {
        let values: Vec<&str> = self
            .headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values.join(", "))
        }
    }

    /// Whether the status code is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Capability to send one request and return the full response.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send the request. Exactly one network exchange; no retries.
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, ClientError>;
}

/// Configuration for the stock reqwest-backed client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout (default: 30s)
    pub timeout: Duration,
    /// Connection timeout (default: 10s)
    pub connect_timeout: Duration,
    /// Pool idle timeout (default: 90s)
    pub pool_idle_timeout: Duration,
    /// Max idle connections per host (default: 10)
    pub pool_max_idle_per_host: usize,
    /// User agent string
    pub user_agent: String,
    /// Accept self-signed provider certificates (default: false)
    pub accept_invalid_certs: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 10,
            user_agent: concat!("pact-verifier/", env!("CARGO_PKG_VERSION")).to_string(),
            accept_invalid_certs: false,
        }
    }
}

impl ClientConfig {
    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the connection pool limits.
    #[must_use]
    pub const fn with_pool_config(mut self, idle_timeout: Duration, max_idle: usize) -> Self {
        self.pool_idle_timeout = idle_timeout;
        self.pool_max_idle_per_host = max_idle;
        self
    }

    /// Set the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Accept invalid TLS certificates, for providers on self-signed certs.
    #[must_use]
    pub const fn with_invalid_certs_accepted(mut self) -> Self {
        self.accept_invalid_certs = true;
        self
    }

    /// Build a reqwest client from this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built (e.g., TLS initialization fails).
    pub fn build(&self) -> Result<Client, ClientError> {
        ClientBuilder::new()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .pool_idle_timeout(self.pool_idle_timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .user_agent(&self.user_agent)
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .use_rustls_tls()
            .build()
            .map_err(ClientError::Http)
    }
}

/// [`HttpClient`] backed by a [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    inner: Client,
}

impl ReqwestClient {
    /// Wrap an existing reqwest client.
    #[must_use]
    pub const fn new(inner: Client) -> Self {
        Self { inner }
    }

    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        config.build().map(Self::new)
    }

    /// Build a client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying client cannot be built.
    pub fn with_defaults() -> Result<Self, ClientError> {
        Self::from_config(&ClientConfig::default())
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, ClientError> {
        let mut builder = self.inner.request(request.method, request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(ProviderResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.pool_idle_timeout, Duration::from_secs(90));
        assert_eq!(config.pool_max_idle_per_host, 10);
        assert!(config.user_agent.starts_with("pact-verifier/"));
        assert!(!config.accept_invalid_certs);
    }

    #[test]
    fn test_config_builder() {
        let config = ClientConfig::default()
            .with_timeout(Duration::from_secs(5))
            .with_pool_config(Duration::from_secs(15), 2)
            .with_user_agent("ci-verifier")
            .with_invalid_certs_accepted();

        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.pool_idle_timeout, Duration::from_secs(15));
        assert_eq!(config.pool_max_idle_per_host, 2);
        assert_eq!(config.user_agent, "ci-verifier");
        assert!(ReqwestClient::from_config(&config).is_ok());
        assert!(config.accept_invalid_certs);
    }

    #[test]
    fn test_build_client() {
        assert!(ReqwestClient::with_defaults().is_ok());
    }

    #[test]
    fn test_response_header_lookup() {
        let response = ProviderResponse {
            status: 200,
            headers: vec![
                ("content-type".to_string(), "application/json".to_string()),
                ("Vary".to_string(), "Accept".to_string()),
                ("vary".to_string(), "Origin".to_string()),
            ],
            body: Vec::new(),
        };
        assert_eq!(
            response.header("Content-Type").as_deref(),
            Some("application/json")
        );
        assert_eq!(response.header("VARY").as_deref(), Some("Accept, Origin"));
        assert_eq!(response.header("etag"), None);
        assert!(response.is_success());
    }
}
