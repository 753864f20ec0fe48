//! Verifier builder and orchestration.
//!
//! A [`Verifier`] accumulates configuration through chained setters. A verify
//! call validates it into an immutable [`ValidatedConfig`] and drives the
//! load, filter, state setup, replay, match and teardown pipeline over the
//! selected interactions, one at a time, in document order.

use crate::client::HttpClient;
use crate::contract::{Contract, Interaction};
use crate::directive::ResponseExpectation;
use crate::error::{VerifierError, VerifierResult};
use crate::filter::InteractionFilter;
use crate::loader::{self, PactSource, SourceOptions};
use crate::matcher::match_response;
use crate::outcome::{InteractionResult, VerificationOutcome};
use crate::replay::replay;
use crate::state::{ProviderStateRegistration, ProviderStates, StateHook};
use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Where a [`Verifier`] is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Nothing configured yet
    #[default]
    Unconfigured,
    /// At least one setter called since the last validation
    Configuring,
    /// Configuration validated, no run in progress
    Validated,
    /// A verify call is running
    Verifying,
    /// The last verify call finished
    Completed,
}

#[derive(Clone)]
struct ProviderEndpoint {
    name: String,
    client: Arc<dyn HttpClient>,
    base_url: Url,
}

/// Builder and driver for provider-side pact verification.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use pact_verifier::{ReqwestClient, Verifier};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Arc::new(ReqwestClient::with_defaults()?);
/// let mut verifier = Verifier::new()
///     .honours_pact_with("chrome browser")
///     .pact_uri("./pacts/chrome_browser-go_api.json", None)
///     .service_provider("go api", client, "http://localhost:8080".parse()?);
/// verifier.verify().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct Verifier {
    consumer: String,
    provider: Option<ProviderEndpoint>,
    source: Option<PactSource>,
    pact_client: Option<Arc<dyn HttpClient>>,
    states: ProviderStates,
    filter: InteractionFilter,
    lifecycle: Lifecycle,
    outcome: Option<VerificationOutcome>,
}

impl Verifier {
    /// Create an unconfigured verifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn configuring(mut self) -> Self {
        self.lifecycle = Lifecycle::Configuring;
        self
    }

    /// Name the consumer whose pact is being honoured.
    #[must_use]
    pub fn honours_pact_with(mut self, consumer: impl Into<String>) -> Self {
        self.consumer = consumer.into();
        self.configuring()
    }

    /// Set the pact source: a file path, `file://` URI or `http(s)://` URL.
    #[must_use]
    pub fn pact_uri(mut self, uri: impl Into<String>, options: Option<SourceOptions>) -> Self {
        self.source = Some(PactSource::new(uri).with_options(options.unwrap_or_default()));
        self.configuring()
    }

    /// Name the provider and the endpoint its interactions are replayed on.
    #[must_use]
    pub fn service_provider(
        mut self,
        name: impl Into<String>,
        client: Arc<dyn HttpClient>,
        base_url: Url,
    ) -> Self {
        self.provider = Some(ProviderEndpoint {
            name: name.into(),
            client,
            base_url,
        });
        self.configuring()
    }

    /// Register setup and teardown hooks for a provider-state label.
    ///
    /// Registering the same label again replaces the earlier hooks.
    #[must_use]
    pub fn provider_state(
        self,
        label: impl Into<String>,
        setup: Option<Arc<dyn StateHook>>,
        teardown: Option<Arc<dyn StateHook>>,
    ) -> Self {
        self.with_state(ProviderStateRegistration::new(label).with_hooks(setup, teardown))
    }

    /// Add a prepared provider-state registration.
    #[must_use]
    pub fn with_state(mut self, registration: ProviderStateRegistration) -> Self {
        self.states.register(registration);
        self.configuring()
    }

    /// Fetch remote pacts with a dedicated client instead of the provider's.
    #[must_use]
    pub fn with_pact_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.pact_client = Some(client);
        self.configuring()
    }

    /// Restrict [`verify`](Self::verify) to matching interactions.
    #[must_use]
    pub fn filter(mut self, description: impl Into<String>, state: impl Into<String>) -> Self {
        self.filter = InteractionFilter::new(description, state);
        self.configuring()
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Outcome of the last verify call that reached the provider.
    #[must_use]
    pub const fn outcome(&self) -> Option<&VerificationOutcome> {
        self.outcome.as_ref()
    }

    /// Registered provider states.
    #[must_use]
    pub const fn states(&self) -> &ProviderStates {
        &self.states
    }

    /// Check the configuration and take an immutable snapshot of it.
    ///
    /// # Errors
    ///
    /// Returns [`VerifierError::EmptyConsumer`], [`VerifierError::EmptyProvider`]
    /// or [`VerifierError::MissingPactSource`], checked in that order.
    pub fn snapshot(&self) -> VerifierResult<ValidatedConfig> {
        if self.consumer.trim().is_empty() {
            return Err(VerifierError::EmptyConsumer);
        }
        let provider = self
            .provider
            .as_ref()
            .filter(|p| !p.name.trim().is_empty())
            .ok_or(VerifierError::EmptyProvider)?;
        let source = self
            .source
            .as_ref()
            .filter(|s| !s.uri().trim().is_empty())
            .ok_or(VerifierError::MissingPactSource)?;

        Ok(ValidatedConfig {
            consumer: self.consumer.clone(),
            provider: provider.name.clone(),
            source: source.clone(),
            client: Arc::clone(&provider.client),
            base_url: provider.base_url.clone(),
            pact_client: self
                .pact_client
                .as_ref()
                .map_or_else(|| Arc::clone(&provider.client), Arc::clone),
            states: self.states.clone(),
        })
    }

    /// Validate the configuration, moving the verifier to
    /// [`Lifecycle::Validated`].
    ///
    /// # Errors
    ///
    /// See [`snapshot`](Self::snapshot).
    pub fn validate(&mut self) -> VerifierResult<ValidatedConfig> {
        let config = self.snapshot()?;
        self.lifecycle = Lifecycle::Validated;
        Ok(config)
    }

    /// Run the pipeline for `filter` and return the outcome, whether or not
    /// every interaction passed. Does not touch stored state.
    ///
    /// # Errors
    ///
    /// Returns the pipeline-fatal errors of [`VerifierError`]; never
    /// [`VerifierError::VerificationFailed`].
    pub async fn run(&self, filter: &InteractionFilter) -> VerifierResult<VerificationOutcome> {
        self.snapshot()?.execute(filter).await
    }

    /// Verify the interactions selected by the configured filter.
    ///
    /// # Errors
    ///
    /// Pipeline-fatal errors abort the call. If any interaction fails, returns
    /// [`VerifierError::VerificationFailed`] and [`outcome`](Self::outcome)
    /// holds the details.
    pub async fn verify(&mut self) -> VerifierResult<()> {
        let filter = self.filter.clone();
        self.verify_with(&filter).await
    }

    /// Verify only interactions matching `description` and `state`; either
    /// may be empty. The configured filter is left untouched.
    ///
    /// # Errors
    ///
    /// Same as [`verify`](Self::verify).
    pub async fn verify_state(&mut self, description: &str, state: &str) -> VerifierResult<()> {
        self.verify_with(&InteractionFilter::new(description, state))
            .await
    }

    async fn verify_with(&mut self, filter: &InteractionFilter) -> VerifierResult<()> {
        self.outcome = None;
        let config = self.validate()?;
        self.lifecycle = Lifecycle::Verifying;
        let result = config.execute(filter).await;
        self.lifecycle = Lifecycle::Completed;

        let outcome = result?;
        info!("{}", outcome.summary());
        let failed = outcome.failed();
        let total = outcome.executed();
        self.outcome = Some(outcome);
        if failed > 0 {
            return Err(VerifierError::VerificationFailed { failed, total });
        }
        Ok(())
    }
}

impl fmt::Debug for Verifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Verifier")
            .field("consumer", &self.consumer)
            .field("provider", &self.provider.as_ref().map(|p| &p.name))
            .field("base_url", &self.provider.as_ref().map(|p| p.base_url.as_str()))
            .field("source", &self.source.as_ref().map(PactSource::uri))
            .field("states", &self.states)
            .field("filter", &self.filter)
            .field("lifecycle", &self.lifecycle)
            .finish_non_exhaustive()
    }
}

/// Immutable configuration a verify call runs against.
#[derive(Clone)]
pub struct ValidatedConfig {
    consumer: String,
    provider: String,
    source: PactSource,
    client: Arc<dyn HttpClient>,
    base_url: Url,
    pact_client: Arc<dyn HttpClient>,
    states: ProviderStates,
}

impl ValidatedConfig {
    /// Consumer name.
    #[must_use]
    pub fn consumer(&self) -> &str {
        &self.consumer
    }

    /// Provider name.
    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Pact source.
    #[must_use]
    pub const fn source(&self) -> &PactSource {
        &self.source
    }

    /// Provider base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Load the pact and verify every interaction `filter` selects.
    ///
    /// # Errors
    ///
    /// Returns [`VerifierError::InvalidSource`], [`VerifierError::Parse`] or
    /// [`VerifierError::NoInteractionsSelected`]. Per-interaction failures
    /// are recorded in the outcome.
    #[instrument(skip_all, fields(consumer = %self.consumer, provider = %self.provider, source = %self.source.uri()))]
    pub async fn execute(&self, filter: &InteractionFilter) -> VerifierResult<VerificationOutcome> {
        let started_at = Utc::now();
        let document = loader::load(&self.source, &*self.pact_client).await?;
        self.check_names(&document.contract);

        let selected = filter.select(&document.contract)?;
        info!(
            selected = selected.len(),
            total = document.contract.interactions.len(),
            base_url = %self.base_url,
            "verifying interactions"
        );

        let mut interactions = Vec::with_capacity(document.contract.interactions.len());
        for (index, (interaction, expectation)) in document
            .contract
            .interactions
            .iter()
            .zip(&document.expectations)
            .enumerate()
        {
            if filter.matches(interaction) {
                interactions.push(self.verify_interaction(index, interaction, expectation).await);
            } else {
                debug!(description = %interaction.description, "skipped by filter");
                interactions.push(InteractionResult::skipped(index, interaction));
            }
        }

        Ok(VerificationOutcome {
            consumer: self.consumer.clone(),
            provider: self.provider.clone(),
            source: self.source.uri().to_string(),
            started_at,
            finished_at: Utc::now(),
            interactions,
        })
    }

    async fn verify_interaction(
        &self,
        index: usize,
        interaction: &Interaction,
        expectation: &ResponseExpectation,
    ) -> InteractionResult {
        let mut result = InteractionResult::running(index, interaction);

        match self.states.set_up(interaction).await {
            Ok(()) => match replay(&*self.client, &self.base_url, &interaction.request).await {
                Ok(response) => result.mismatches = match_response(expectation, &response),
                Err(e) => result.error = Some(e),
            },
            Err(e) => result.error = Some(e),
        }
        result.warnings = self.states.tear_down(interaction).await;
        result.finish();

        if let Some(error) = &result.error {
            warn!(description = %interaction.description, %error, "interaction failed");
        } else if result.failed() {
            warn!(
                description = %interaction.description,
                mismatches = result.mismatches.len(),
                "interaction failed"
            );
            for mismatch in &result.mismatches {
                debug!(%mismatch);
            }
        } else {
            info!(description = %interaction.description, "interaction passed");
        }
        result
    }

    fn check_names(&self, contract: &Contract) {
        if contract.consumer.name != self.consumer {
            warn!(
                configured = %self.consumer,
                document = %contract.consumer.name,
                "consumer name differs from pact"
            );
        }
        if contract.provider.name != self.provider {
            warn!(
                configured = %self.provider,
                document = %contract.provider.name,
                "provider name differs from pact"
            );
        }
    }
}

impl fmt::Debug for ValidatedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatedConfig")
            .field("consumer", &self.consumer)
            .field("provider", &self.provider)
            .field("source", &self.source.uri())
            .field("base_url", &self.base_url.as_str())
            .field("states", &self.states)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientError, ProviderRequest, ProviderResponse};
    use async_trait::async_trait;
    use std::sync::Mutex;

    const PACT: &str = r#"{
        "consumer": {"name": "chrome browser"},
        "provider": {"name": "go api"},
        "interactions": [
            {
                "description": "get request for user with id {23}",
                "providerState": "there is a user with id {23}",
                "request": {"method": "GET", "path": "/user", "query": "id=23"},
                "response": {"status": 200, "body": {"id": 23, "firstName": "John"}}
            },
            {
                "description": "get request for user with id {200}",
                "providerState": "there is no user with id {200}",
                "request": {"method": "GET", "path": "/user", "query": "id=200"},
                "response": {"status": 404}
            }
        ]
    }"#;

    /// Serves the pact at `/pact` and answers `/user` from a fixed table.
    struct UserApi {
        calls: Mutex<Vec<String>>,
        john: &'static str,
    }

    impl UserApi {
        fn new(john: &'static str) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                john,
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpClient for UserApi {
        async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, ClientError> {
            let target = match request.url.query() {
                Some(q) => format!("{}?{q}", request.url.path()),
                None => request.url.path().to_string(),
            };
            self.calls.lock().unwrap().push(target.clone());
            let (status, body) = match target.as_str() {
                "/pact" => (200, PACT.to_string()),
                "/user?id=23" => (200, format!(r#"{{"id":23,"firstName":"{}"}}"#, self.john)),
                _ => (404, String::new()),
            };
            Ok(ProviderResponse {
                status,
                headers: vec![("Content-Type".to_string(), "application/json".to_string())],
                body: body.into_bytes(),
            })
        }
    }

    fn verifier(api: &Arc<UserApi>) -> Verifier {
        Verifier::new()
            .honours_pact_with("chrome browser")
            .pact_uri("http://localhost/pact", None)
            .service_provider("go api", api.clone(), Url::parse("http://localhost").unwrap())
    }

    #[tokio::test]
    async fn test_validation_order() {
        let api = UserApi::new("John");
        let err = Verifier::new()
            .service_provider("go api", api.clone(), Url::parse("http://localhost").unwrap())
            .verify()
            .await
            .unwrap_err();
        assert!(matches!(err, VerifierError::EmptyConsumer));

        let mut v = Verifier::new().honours_pact_with("chrome browser");
        assert!(matches!(v.verify().await.unwrap_err(), VerifierError::EmptyProvider));
        assert_eq!(v.lifecycle(), Lifecycle::Configuring);

        let mut v = Verifier::new()
            .honours_pact_with("chrome browser")
            .service_provider("go api", api.clone(), Url::parse("http://localhost").unwrap());
        assert!(matches!(v.verify().await.unwrap_err(), VerifierError::MissingPactSource));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_full_run_passes() {
        let api = UserApi::new("John");
        let mut v = verifier(&api);
        assert_eq!(v.lifecycle(), Lifecycle::Configuring);

        v.verify().await.unwrap();
        assert_eq!(v.lifecycle(), Lifecycle::Completed);
        let outcome = v.outcome().unwrap();
        assert!(outcome.success());
        assert_eq!(outcome.executed(), 2);
        assert_eq!(api.calls(), vec!["/pact", "/user?id=23", "/user?id=200"]);
    }

    #[tokio::test]
    async fn test_mismatch_fails_with_summary_error() {
        let api = UserApi::new("Jane");
        let mut v = verifier(&api);

        let err = v.verify().await.unwrap_err();
        assert!(matches!(err, VerifierError::VerificationFailed { failed: 1, total: 2 }));
        let paths: Vec<_> = v.outcome().unwrap().mismatches().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, vec!["$.body.firstName"]);
    }

    #[tokio::test]
    async fn test_scoped_verify_leaves_filter_untouched() {
        let api = UserApi::new("John");
        let mut v = verifier(&api);

        v.verify_state("", "there is no user with id {200}").await.unwrap();
        let outcome = v.outcome().unwrap();
        assert_eq!(outcome.executed(), 1);
        assert_eq!(outcome.skipped(), 1);

        v.verify().await.unwrap();
        assert_eq!(v.outcome().unwrap().executed(), 2);
    }

    #[tokio::test]
    async fn test_setup_failure_is_scoped_to_interaction() {
        let api = UserApi::new("John");
        let teardowns = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&teardowns);
        let mut v = verifier(&api).provider_state(
            "there is a user with id {23}",
            Some(Arc::new(|_: &str| -> anyhow::Result<()> { anyhow::bail!("seed failed") })),
            Some(Arc::new(move |_: &str| -> anyhow::Result<()> {
                *counter.lock().unwrap() += 1;
                Ok(())
            })),
        );

        let err = v.verify().await.unwrap_err();
        assert!(matches!(err, VerifierError::VerificationFailed { failed: 1, total: 2 }));
        assert_eq!(*teardowns.lock().unwrap(), 1);
        // The failed interaction never reached the provider.
        assert_eq!(api.calls(), vec!["/pact", "/user?id=200"]);
    }

    #[tokio::test]
    async fn test_run_returns_outcome_without_failing() {
        let api = UserApi::new("Jane");
        let v = verifier(&api);
        let outcome = v.run(&InteractionFilter::all()).await.unwrap();
        assert!(!outcome.success());
        assert!(v.outcome().is_none());
    }

    #[test]
    fn test_reregistration_through_builder() {
        let api = UserApi::new("John");
        let v = verifier(&api)
            .provider_state("s", None, None)
            .provider_state("s", Some(Arc::new(|_: &str| -> anyhow::Result<()> { Ok(()) })), None);
        assert_eq!(v.states().len(), 1);
        assert!(v.states().get("s").unwrap().has_setup());
    }
}
