//! Interaction filtering by description and provider state.

use crate::contract::{Contract, Interaction};
use crate::error::{VerifierError, VerifierResult};

/// Narrows a contract to the interactions a verify call should run.
///
/// An empty description or state acts as a wildcard. A description matches
/// when the interaction's description equals or contains it; a state matches
/// when it equals any of the interaction's provider-state labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InteractionFilter {
    description: String,
    state: String,
}

impl InteractionFilter {
    /// Create a filter. Pass `""` for either part to leave it open.
    #[must_use]
    pub fn new(description: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            state: state.into(),
        }
    }

    /// Filter that selects every interaction.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Description filter, empty when open.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// State filter, empty when open.
    #[must_use]
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Whether the filter selects everything.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.description.is_empty() && self.state.is_empty()
    }

    /// Whether an interaction passes the filter.
    #[must_use]
    pub fn matches(&self, interaction: &Interaction) -> bool {
        let description_ok =
            self.description.is_empty() || interaction.description.contains(&self.description);
        let state_ok = self.state.is_empty() || interaction.states().contains(&self.state.as_str());
        description_ok && state_ok
    }

    /// Document indexes of the selected interactions, in document order.
    ///
    /// # Errors
    ///
    /// Returns [`VerifierError::NoInteractionsSelected`] if nothing matches.
    pub fn select(&self, contract: &Contract) -> VerifierResult<Vec<usize>> {
        let selected: Vec<usize> = contract
            .interactions
            .iter()
            .enumerate()
            .filter(|(_, interaction)| self.matches(interaction))
            .map(|(index, _)| index)
            .collect();

        if selected.is_empty() {
            return Err(VerifierError::NoInteractionsSelected {
                description: self.description.clone(),
                state: self.state.clone(),
            });
        }
        Ok(selected)
    }
}

/// Select the interactions of `contract` matching `description` and `state`.
///
/// # Errors
///
/// Returns [`VerifierError::NoInteractionsSelected`] if nothing matches.
pub fn filter_interactions<'a>(
    contract: &'a Contract,
    description: &str,
    state: &str,
) -> VerifierResult<Vec<&'a Interaction>> {
    let filter = InteractionFilter::new(description, state);
    Ok(filter
        .select(contract)?
        .into_iter()
        .map(|index| &contract.interactions[index])
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_contract() -> Contract {
        serde_json::from_value(json!({
            "consumer": {"name": "chrome browser"},
            "provider": {"name": "go api"},
            "interactions": [
                {
                    "description": "get request for user with id {23}",
                    "providerState": "there is a user with id {23}",
                    "request": {"method": "GET", "path": "/user", "query": "id=23"},
                    "response": {"status": 200}
                },
                {
                    "description": "get request for user with id {200}",
                    "providerState": "there is no user with id {200}",
                    "request": {"method": "GET", "path": "/user", "query": "id=200"},
                    "response": {"status": 404}
                },
                {
                    "description": "health check",
                    "request": {"method": "GET", "path": "/health"},
                    "response": {"status": 200}
                }
            ]
        }))
        .unwrap()
    }

    fn descriptions<'a>(interactions: &[&'a Interaction]) -> Vec<&'a str> {
        interactions.iter().map(|i| i.description.as_str()).collect()
    }

    #[test]
    fn test_open_filter_selects_everything() {
        let contract = user_contract();
        assert!(InteractionFilter::all().is_open());
        assert_eq!(filter_interactions(&contract, "", "").unwrap().len(), 3);
    }

    #[test]
    fn test_filter_by_state() {
        let contract = user_contract();
        let selected = filter_interactions(&contract, "", "there is no user with id {200}").unwrap();
        assert_eq!(descriptions(&selected), vec!["get request for user with id {200}"]);
    }

    #[test]
    fn test_filter_by_description_equals_or_contains() {
        let contract = user_contract();
        let selected =
            filter_interactions(&contract, "get request for user with id {23}", "").unwrap();
        assert_eq!(descriptions(&selected), vec!["get request for user with id {23}"]);

        let selected = filter_interactions(&contract, "get request", "").unwrap();
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_filter_requires_both_parts() {
        let contract = user_contract();
        let err = filter_interactions(
            &contract,
            "get request for user with id {23}",
            "there is no user with id {200}",
        )
        .unwrap_err();
        assert!(matches!(err, VerifierError::NoInteractionsSelected { .. }));
    }

    #[test]
    fn test_state_must_match_exactly() {
        let contract = user_contract();
        let err = InteractionFilter::new("", "there is a user with id {0}")
            .select(&contract)
            .unwrap_err();
        assert!(matches!(
            err,
            VerifierError::NoInteractionsSelected { ref state, .. } if state == "there is a user with id {0}"
        ));
        assert!(
            InteractionFilter::new("", "there is a user")
                .select(&contract)
                .is_err()
        );
    }

    #[test]
    fn test_select_returns_document_indexes() {
        let contract = user_contract();
        assert_eq!(
            InteractionFilter::new("user", "").select(&contract).unwrap(),
            vec![0, 1]
        );
    }
}
