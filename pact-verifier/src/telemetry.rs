//! Tracing subscriber setup for verification runs.

use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt};

/// Tracing configuration.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    /// Log level filter, used when `RUST_LOG` is unset
    pub log_level: String,
    /// Whether to output JSON format
    pub json_output: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: "pact-verifier".to_string(),
            log_level: std::env::var("PACT_VERIFIER_LOG").unwrap_or_else(|_| "info".to_string()),
            json_output: std::env::var("PACT_VERIFIER_LOG_JSON").is_ok_and(|v| v == "true" || v == "1"),
        }
    }
}

impl TracingConfig {
    /// Set the service name.
    #[must_use]
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Set the log level filter.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Enable JSON output.
    #[must_use]
    pub const fn with_json_output(mut self) -> Self {
        self.json_output = true;
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.log_level))
    }
}

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(config: &TracingConfig) -> Result<(), TryInitError> {
    if config.json_output {
        tracing_subscriber::registry()
            .with(config.filter())
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(config.filter())
            .with(tracing_subscriber::fmt::layer())
            .try_init()?;
    }
    tracing::info!(service = %config.service_name, "tracing initialized");
    Ok(())
}
