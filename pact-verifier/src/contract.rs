//! Pact contract document types.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A Pact contract between consumer and provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contract {
    /// Consumer participant
    pub consumer: Participant,
    /// Provider participant
    pub provider: Participant,
    /// Contract interactions, in document order
    #[serde(default)]
    pub interactions: Vec<Interaction>,
    /// Contract metadata
    #[serde(default)]
    pub metadata: ContractMetadata,
}

impl Contract {
    /// Pact specification version declared by the document.
    #[must_use]
    pub fn specification_version(&self) -> &str {
        &self.metadata.pact_specification.version
    }
}

/// A participant in a contract (consumer or provider).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    /// Participant name
    pub name: String,
}

impl Participant {
    /// Create a new participant.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// An interaction in a contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    /// Interaction description
    pub description: String,
    /// Provider state (v1/v2 single precondition)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_state: Option<String>,
    /// Provider states (v3+ list of preconditions)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provider_states: Vec<ProviderStateRef>,
    /// Expected request
    pub request: Request,
    /// Expected response
    pub response: Response,
}

impl Interaction {
    /// All provider-state labels attached to this interaction, in order.
    ///
    /// The v2 `providerState` label comes first, followed by any v3
    /// `providerStates` entries not already listed. Empty labels are skipped.
    #[must_use]
    pub fn states(&self) -> Vec<&str> {
        let mut states: Vec<&str> = Vec::new();
        let listed = self
            .provider_state
            .iter()
            .map(String::as_str)
            .chain(self.provider_states.iter().map(|s| s.name.as_str()));
        for state in listed {
            if !state.is_empty() && !states.contains(&state) {
                states.push(state);
            }
        }
        states
    }

    /// Whether any provider state is attached.
    #[must_use]
    pub fn has_state(&self) -> bool {
        !self.states().is_empty()
    }
}

/// A v3 provider state reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderStateRef {
    /// State label
    pub name: String,
    /// Optional state parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

/// HTTP request in an interaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    /// HTTP method
    pub method: String,
    /// Request path
    pub path: String,
    /// Query parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Query>,
    /// Request headers
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Request body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl Request {
    /// Look up a request header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Query parameters, either a raw query string (v2) or a parameter map (v3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Query {
    /// Raw query string, e.g. `id=23&page=1`
    Raw(String),
    /// Parameter map, each name with one or more values
    Params(BTreeMap<String, QueryValues>),
}

/// One or more values of a query parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum QueryValues {
    /// Single value
    One(String),
    /// Repeated parameter
    Many(Vec<String>),
}

impl Query {
    /// Flatten into ordered name/value pairs.
    #[must_use]
    pub fn pairs(&self) -> Vec<(String, String)> {
        match self {
            Self::Raw(raw) => url::form_urlencoded::parse(raw.trim_start_matches('?').as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
            Self::Params(params) => params
                .iter()
                .flat_map(|(name, values)| {
                    let values = match values {
                        QueryValues::One(v) => vec![v.clone()],
                        QueryValues::Many(vs) => vs.clone(),
                    };
                    values.into_iter().map(move |v| (name.clone(), v))
                })
                .collect(),
        }
    }
}

/// HTTP response in an interaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response headers; values may be literal strings or embedded matchers
    #[serde(default)]
    pub headers: HashMap<String, serde_json::Value>,
    /// Response body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    /// Path-keyed matching rules (v2 flat or v3 categorised form)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching_rules: Option<serde_json::Value>,
}

/// Contract metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContractMetadata {
    /// Pact specification version
    #[serde(rename = "pactSpecification", alias = "pact-specification", default)]
    pub pact_specification: PactSpecification,
}

/// Pact specification version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PactSpecification {
    /// Version string
    pub version: String,
}

impl Default for PactSpecification {
    fn default() -> Self {
        Self {
            version: "2.0.0".to_string(),
        }
    }
}
