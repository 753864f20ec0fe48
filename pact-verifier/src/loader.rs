//! Contract loading from local files or remote pact hosts.

use crate::client::{HttpClient, ProviderRequest};
use crate::contract::Contract;
use crate::directive::ResponseExpectation;
use crate::error::{VerifierError, VerifierResult};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, instrument};
use url::Url;

/// Request customisation for fetching a pact from a protected host.
#[derive(Debug, Clone, Default)]
pub struct SourceOptions {
    /// Extra request headers
    pub headers: Vec<(String, String)>,
    /// Basic auth username
    pub username: Option<String>,
    /// Basic auth password
    pub password: Option<SecretString>,
    /// Bearer token, takes precedence over basic auth
    pub token: Option<SecretString>,
}

impl SourceOptions {
    /// Options from `PACT_BROKER_TOKEN`, or `PACT_BROKER_USERNAME` and
    /// `PACT_BROKER_PASSWORD`.
    #[must_use]
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            headers: Vec::new(),
            username: var("PACT_BROKER_USERNAME"),
            password: var("PACT_BROKER_PASSWORD").map(SecretString::from),
            token: var("PACT_BROKER_TOKEN").map(SecretString::from),
        }
    }

    /// Add a request header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Authenticate with HTTP basic auth.
    #[must_use]
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(SecretString::from(password.into()));
        self
    }

    /// Authenticate with a bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecretString::from(token.into()));
        self
    }

    fn request_headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        headers.extend(self.headers.iter().cloned());
        if let Some(token) = &self.token {
            headers.push((
                "Authorization".to_string(),
                format!("Bearer {}", token.expose_secret()),
            ));
        } else if let Some(username) = &self.username {
            let password = self
                .password
                .as_ref()
                .map_or("", |p| p.expose_secret());
            let encoded = STANDARD.encode(format!("{username}:{password}"));
            headers.push(("Authorization".to_string(), format!("Basic {encoded}")));
        }
        headers
    }
}

/// Where a pact document comes from.
#[derive(Debug, Clone)]
pub struct PactSource {
    uri: String,
    options: SourceOptions,
}

/// Resolved location of a pact source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// Read from the local filesystem
    File(std::path::PathBuf),
    /// Fetched over HTTP(S)
    Remote(Url),
}

impl PactSource {
    /// Create a source from a path or URI.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            options: SourceOptions::default(),
        }
    }

    /// Attach fetch options.
    #[must_use]
    pub fn with_options(mut self, options: SourceOptions) -> Self {
        self.options = options;
        self
    }

    /// The source string exactly as supplied.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Fetch options.
    #[must_use]
    pub const fn options(&self) -> &SourceOptions {
        &self.options
    }

    /// Classify the source as a file path or a remote URL.
    ///
    /// # Errors
    ///
    /// Returns [`VerifierError::InvalidSource`] for empty sources and
    /// `file://` URIs that do not denote a local path.
    pub fn location(&self) -> VerifierResult<SourceLocation> {
        let uri = self.uri.trim();
        if uri.is_empty() {
            return Err(VerifierError::invalid_source(&self.uri, "source is empty"));
        }
        match Url::parse(uri) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(SourceLocation::Remote(url)),
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(SourceLocation::File)
                .map_err(|()| VerifierError::invalid_source(&self.uri, "not a local file URI")),
            _ => Ok(SourceLocation::File(uri.into())),
        }
    }
}

/// A contract plus the decoded response expectation of each interaction.
#[derive(Debug, Clone)]
pub struct PactDocument {
    /// Parsed contract
    pub contract: Contract,
    /// Response expectations, index-aligned with `contract.interactions`
    pub expectations: Vec<ResponseExpectation>,
}

impl PactDocument {
    /// Parse and decode a contract document.
    ///
    /// `location` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`VerifierError::Parse`] if the bytes are not a valid contract
    /// or contain invalid matching directives.
    pub fn from_slice(bytes: &[u8], location: &str) -> VerifierResult<Self> {
        let contract: Contract =
            serde_json::from_slice(bytes).map_err(|e| VerifierError::parse(location, e))?;
        let expectations = contract
            .interactions
            .iter()
            .map(|interaction| {
                ResponseExpectation::from_response(&interaction.response).map_err(|e| {
                    VerifierError::parse(
                        location,
                        format!("interaction {:?}: {e}", interaction.description),
                    )
                })
            })
            .collect::<VerifierResult<Vec<_>>>()?;
        Ok(Self {
            contract,
            expectations,
        })
    }
}

/// Fetch the bytes of a pact source. `client` is only used for remote sources.
///
/// # Errors
///
/// Returns [`VerifierError::InvalidSource`], carrying the source string, if
/// the source is malformed, unreadable, unreachable, or answers non-2xx.
#[instrument(skip(source, client), fields(source = %source.uri()))]
pub async fn fetch(source: &PactSource, client: &dyn HttpClient) -> VerifierResult<Vec<u8>> {
    match source.location()? {
        SourceLocation::File(path) => {
            debug!(path = %path.display(), "reading pact file");
            tokio::fs::read(&path)
                .await
                .map_err(|e| VerifierError::invalid_source(source.uri(), e))
        }
        SourceLocation::Remote(url) => {
            debug!(%url, "fetching remote pact");
            let mut request = ProviderRequest::new(Method::GET, url);
            request.headers = source.options().request_headers();
            let response = client
                .send(request)
                .await
                .map_err(|e| VerifierError::invalid_source(source.uri(), e))?;
            if !response.is_success() {
                return Err(VerifierError::invalid_source(
                    source.uri(),
                    format!("server responded with status {}", response.status),
                ));
            }
            Ok(response.body)
        }
    }
}

/// Fetch and parse a pact document.
///
/// # Errors
///
/// Returns [`VerifierError::InvalidSource`] or [`VerifierError::Parse`].
pub async fn load(source: &PactSource, client: &dyn HttpClient) -> VerifierResult<PactDocument> {
    let bytes = fetch(source, client).await?;
    let document = PactDocument::from_slice(&bytes, source.uri())?;
    info!(
        source = %source.uri(),
        consumer = %document.contract.consumer.name,
        provider = %document.contract.provider.name,
        interactions = document.contract.interactions.len(),
        version = %document.contract.specification_version(),
        "loaded pact"
    );
    Ok(document)
}
