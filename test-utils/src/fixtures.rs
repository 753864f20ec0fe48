//! Pact documents and provider data shared by the verifier tests.

use serde_json::{Value, json};
use std::path::PathBuf;

/// Consumer name used by the user pact.
pub const CONSUMER: &str = "chrome browser";

/// Provider name used by the user pact.
pub const PROVIDER: &str = "go api";

/// State label of the existing-user interaction.
pub const STATE_USER_23: &str = "there is a user with id {23}";

/// State label of the missing-user interaction.
pub const STATE_NO_USER_200: &str = "there is no user with id {200}";

/// Description of the existing-user interaction.
pub const GET_USER_23: &str = "get request for user with id {23}";

/// Description of the missing-user interaction.
pub const GET_USER_200: &str = "get request for user with id {200}";

/// A user known to the sample provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleUser {
    /// User id
    pub id: u32,
    /// First name
    pub first_name: &'static str,
    /// Last name
    pub last_name: &'static str,
}

impl SampleUser {
    /// User 23.
    pub const JOHN: Self = Self {
        id: 23,
        first_name: "John",
        last_name: "Doe",
    };

    /// User 24.
    pub const JANE: Self = Self {
        id: 24,
        first_name: "Jane",
        last_name: "Dame",
    };

    /// The JSON body the provider returns for this user.
    #[must_use]
    pub fn body(&self) -> Value {
        json!({
            "id": self.id,
            "firstName": self.first_name,
            "lastName": self.last_name,
        })
    }

    /// Same id, names taken from `other`.
    #[must_use]
    pub const fn with_names_of(self, other: Self) -> Self {
        Self {
            id: self.id,
            first_name: other.first_name,
            last_name: other.last_name,
        }
    }
}

/// Two-interaction pact: user 23 exists and is returned, user 200 is a 404.
#[must_use]
pub fn user_pact() -> Value {
    json!({
        "consumer": {"name": CONSUMER},
        "provider": {"name": PROVIDER},
        "interactions": [
            {
                "description": GET_USER_23,
                "providerState": STATE_USER_23,
                "request": {"method": "GET", "path": "/user", "query": "id=23"},
                "response": {
                    "status": 200,
                    "headers": {"Content-Type": "application/json"},
                    "body": SampleUser::JOHN.body()
                }
            },
            {
                "description": GET_USER_200,
                "providerState": STATE_NO_USER_200,
                "request": {"method": "GET", "path": "/user", "query": "id=200"},
                "response": {"status": 404}
            }
        ],
        "metadata": {"pactSpecification": {"version": "2.0.0"}}
    })
}

/// v3 pact exercising embedded matchers and `matchingRules`.
#[must_use]
pub fn user_list_pact() -> Value {
    json!({
        "consumer": {"name": CONSUMER},
        "provider": {"name": PROVIDER},
        "interactions": [{
            "description": "list users",
            "providerStates": [{"name": "users exist"}],
            "request": {"method": "GET", "path": "/users", "query": {"page": ["1"]}},
            "response": {
                "status": 200,
                "headers": {"Content-Type": "application/json; charset=utf-8"},
                "body": {
                    "users": {
                        "pact:matcher:type": "type",
                        "min": 1,
                        "value": [{"id": 1, "firstName": "John", "lastName": "Doe"}]
                    },
                    "generatedAt": "2024-01-01T00:00:00Z"
                },
                "matchingRules": {
                    "body": {
                        "$.generatedAt": {
                            "matchers": [{"match": "regex", "regex": "\\d{4}-\\d{2}-\\d{2}T.*"}]
                        }
                    }
                }
            }
        }],
        "metadata": {"pactSpecification": {"version": "3.0.0"}}
    })
}

/// Write `pact` to a uniquely named file in the system temp directory.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_pact_file(pact: &Value) -> anyhow::Result<PathBuf> {
    let path = std::env::temp_dir().join(format!("pact-{}.json", uuid::Uuid::new_v4()));
    std::fs::write(&path, serde_json::to_vec_pretty(pact)?)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pact_verifier::Contract;

    #[test]
    fn test_user_pact_parses() {
        let contract: Contract = serde_json::from_value(user_pact()).unwrap();
        assert_eq!(contract.consumer.name, CONSUMER);
        assert_eq!(contract.interactions.len(), 2);
        assert_eq!(contract.interactions[0].states(), vec![STATE_USER_23]);
    }

    #[test]
    fn test_swapped_names() {
        let swapped = SampleUser::JOHN.with_names_of(SampleUser::JANE);
        assert_eq!(swapped.id, 23);
        assert_eq!(swapped.body()["firstName"], "Jane");
    }

    #[test]
    fn test_write_pact_file() {
        let path = write_pact_file(&user_pact()).unwrap();
        let written: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written, user_pact());
        std::fs::remove_file(path).unwrap();
    }
}
