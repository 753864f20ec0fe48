//! Provider-side pact verification.
//!
//! Loads a consumer-driven contract, puts the provider into each
//! interaction's provider state, replays the recorded request against the
//! live provider and structurally matches the response against the
//! expectation.
//!
//! - [`Verifier`] is the chained-builder entry point
//! - [`HttpClient`] is the injected transport, [`ReqwestClient`] the stock one
//! - [`StateHook`] is implemented by provider-state setup and teardown hooks
//! - [`VerificationOutcome`] carries per-interaction mismatch detail

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod contract;
pub mod directive;
pub mod error;
pub mod filter;
pub mod loader;
pub mod matcher;
pub mod outcome;
pub mod replay;
pub mod state;
pub mod telemetry;
pub mod verifier;

pub use client::{ClientConfig, ClientError, HttpClient, ProviderRequest, ProviderResponse, ReqwestClient};
pub use contract::{Contract, ContractMetadata, Interaction, PactSpecification, Participant, Query, Request, Response};
pub use directive::{Expectation, MatcherError, MatchingDirective, ResponseExpectation};
pub use error::{InteractionError, VerifierError, VerifierResult};
pub use filter::{InteractionFilter, filter_interactions};
pub use loader::{PactDocument, PactSource, SourceOptions};
pub use matcher::{match_response, match_value};
pub use outcome::{InteractionResult, InteractionStatus, Mismatch, MismatchKind, VerificationOutcome};
pub use state::{ProviderStateRegistration, ProviderStates, StateHook};
pub use telemetry::{TracingConfig, init_tracing};
pub use verifier::{Lifecycle, ValidatedConfig, Verifier};
