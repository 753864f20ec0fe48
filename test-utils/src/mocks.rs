//! Mock collaborators for verifier tests.
//!
//! [`ScriptedClient`] stands in for the provider's HTTP endpoint and
//! [`RecordingHook`] for provider-state setup and teardown callbacks.

use async_trait::async_trait;
use pact_verifier::{ClientError, HttpClient, ProviderRequest, ProviderResponse, StateHook};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared, ordered log of hook invocations, e.g. `setup:<state>`.
pub type HookLog = Arc<RwLock<Vec<String>>>;

/// Provider-state hook that records each call and optionally fails.
#[derive(Debug, Clone)]
pub struct RecordingHook {
    log: HookLog,
    tag: String,
    failure: Option<String>,
}

impl RecordingHook {
    /// Hook appending `"{tag}:{state}"` to `log`.
    #[must_use]
    pub fn new(log: &HookLog, tag: impl Into<String>) -> Self {
        Self {
            log: Arc::clone(log),
            tag: tag.into(),
            failure: None,
        }
    }

    /// Record the call, then fail with `message`.
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Shared handle for registration.
    #[must_use]
    pub fn shared(self) -> Arc<dyn StateHook> {
        Arc::new(self)
    }
}

#[async_trait]
impl StateHook for RecordingHook {
    async fn run(&self, state: &str) -> anyhow::Result<()> {
        self.log.write().await.push(format!("{}:{state}", self.tag));
        match &self.failure {
            Some(message) => Err(anyhow::anyhow!("{message}")),
            None => Ok(()),
        }
    }
}

/// Create an empty hook log.
#[must_use]
pub fn hook_log() -> HookLog {
    Arc::new(RwLock::new(Vec::new()))
}

/// HTTP client answering from a fixed route table.
///
/// Routes are keyed by method and path plus query (`GET /user?id=23`).
/// Unknown routes get a 404. Every request is recorded.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    routes: HashMap<String, ProviderResponse>,
    requests: RwLock<Vec<ProviderRequest>>,
    unreachable: bool,
}

impl ScriptedClient {
    /// Create a client with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `method target` with `response`.
    #[must_use]
    pub fn with_route(mut self, method: &str, target: &str, response: ProviderResponse) -> Self {
        self.routes
            .insert(format!("{} {target}", method.to_ascii_uppercase()), response);
        self
    }

    /// Answer `method target` with a JSON body.
    #[must_use]
    pub fn with_json(self, method: &str, target: &str, status: u16, body: &serde_json::Value) -> Self {
        self.with_route(method, target, json_response(status, body))
    }

    /// Fail every request as if the provider were down.
    #[must_use]
    pub const fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Requests received so far.
    pub async fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.read().await.clone()
    }

    /// Targets (`METHOD /path?query`) received so far.
    pub async fn targets(&self) -> Vec<String> {
        self.requests.read().await.iter().map(target_of).collect()
    }
}

fn target_of(request: &ProviderRequest) -> String {
    match request.url.query() {
        Some(query) => format!("{} {}?{query}", request.method, request.url.path()),
        None => format!("{} {}", request.method, request.url.path()),
    }
}

#[async_trait]
impl HttpClient for ScriptedClient {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, ClientError> {
        let target = target_of(&request);
        self.requests.write().await.push(request);
        if self.unreachable {
            return Err(ClientError::InvalidRequest(format!("connection refused: {target}")));
        }
        Ok(self.routes.get(&target).cloned().unwrap_or_else(|| ProviderResponse {
            status: 404,
            ..ProviderResponse::default()
        }))
    }
}

/// A JSON response with a matching `Content-Type`.
#[must_use]
pub fn json_response(status: u16, body: &serde_json::Value) -> ProviderResponse {
    ProviderResponse {
        status,
        headers: vec![("Content-Type".to_string(), "application/json".to_string())],
        body: body.to_string().into_bytes(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;
    use url::Url;

    #[tokio::test]
    async fn test_scripted_routes_and_recording() {
        let client = ScriptedClient::new().with_json("get", "/user?id=23", 200, &serde_json::json!({"id": 23}));

        let url = Url::parse("http://localhost/user?id=23").unwrap();
        let response = client
            .send(ProviderRequest::new(Method::GET, url))
            .await
            .unwrap();
        assert_eq!(response.status, 200);

        let url = Url::parse("http://localhost/missing").unwrap();
        let response = client
            .send(ProviderRequest::new(Method::GET, url))
            .await
            .unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(client.targets().await, vec!["GET /user?id=23", "GET /missing"]);
    }

    #[tokio::test]
    async fn test_recording_hook() {
        let log = hook_log();
        let ok = RecordingHook::new(&log, "setup");
        let bad = RecordingHook::new(&log, "teardown").failing("boom");

        ok.run("a").await.unwrap();
        assert!(bad.run("a").await.is_err());
        assert_eq!(*log.read().await, vec!["setup:a", "teardown:a"]);
    }
}
