//! Verifier error types using thiserror 2.0.
//!
//! Errors are split by scope: [`VerifierError`] aborts a whole verify call,
//! while [`InteractionError`] is recorded against a single interaction and
//! never stops the remaining ones from running.

use serde::Serialize;
use thiserror::Error;

/// Errors that make an entire verification run meaningless, plus the
/// summary error raised when any interaction failed.
#[derive(Error, Debug)]
pub enum VerifierError {
    /// Consumer name was never configured
    #[error("consumer name is empty; call honours_pact_with before verifying")]
    EmptyConsumer,

    /// Provider name was never configured
    #[error("provider name is empty; call service_provider before verifying")]
    EmptyProvider,

    /// No pact source was configured
    #[error("no pact source configured; call pact_uri before verifying")]
    MissingPactSource,

    /// The pact source is malformed or unreachable
    #[error("invalid pact source {location}: {reason}")]
    InvalidSource {
        /// The source string exactly as supplied
        location: String,
        /// Underlying cause
        reason: String,
    },

    /// The pact bytes are not a well-formed contract document
    #[error("failed to parse pact from {location}: {reason}")]
    Parse {
        /// The source string exactly as supplied
        location: String,
        /// Underlying cause
        reason: String,
    },

    /// The interaction filter selected nothing
    #[error("no interactions found matching description {description:?} and state {state:?}")]
    NoInteractionsSelected {
        /// Description filter in effect
        description: String,
        /// State filter in effect
        state: String,
    },

    /// One or more interactions failed; details live in the outcome
    #[error("pact verification failed: {failed} of {total} interactions failed")]
    VerificationFailed {
        /// Number of failed interactions
        failed: usize,
        /// Number of interactions that ran
        total: usize,
    },
}

/// Result type for verifier operations.
pub type VerifierResult<T> = Result<T, VerifierError>;

impl VerifierError {
    /// Create an invalid source error.
    #[must_use]
    pub fn invalid_source(location: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidSource {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a parse error.
    #[must_use]
    pub fn parse(location: impl Into<String>, reason: impl ToString) -> Self {
        Self::Parse {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error is a configuration problem detected before any I/O.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::EmptyConsumer
                | Self::EmptyProvider
                | Self::MissingPactSource
                | Self::NoInteractionsSelected { .. }
        )
    }
}

/// Failures scoped to a single interaction.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InteractionError {
    /// A provider-state setup hook failed
    #[error("provider state setup failed for {state:?}: {message}")]
    ProviderStateSetup {
        /// State label whose hook failed
        state: String,
        /// Hook error message
        message: String,
    },

    /// The replayed request could not be sent or its response read
    #[error("transport error: {message}")]
    Transport {
        /// Underlying network failure
        message: String,
    },
}
