//! Proptest generators for JSON values and pact fragments.

use proptest::prelude::*;
use serde_json::{Map, Value, json};

/// JSON type of a generated value, mirroring the matcher's type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonKind {
    /// `null`
    Null,
    /// `true` / `false`
    Boolean,
    /// Any number
    Number,
    /// Any string
    String,
    /// Any array
    Array,
    /// Any object
    Object,
}

impl JsonKind {
    /// Kind of `value`.
    #[must_use]
    pub const fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }
}

/// Generate JSON object keys.
pub fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-zA-Z0-9_]{0,11}"
}

/// Generate scalar JSON values: null, booleans, integers, floats and strings.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        (-1.0e6f64..1.0e6).prop_map(|n| json!(n)),
        "[ -~]{0,16}".prop_map(Value::String),
    ]
}

/// Generate a scalar of the given kind. Only scalar kinds are supported;
/// compound kinds yield an empty array or object.
pub fn scalar_of_kind(kind: JsonKind) -> BoxedStrategy<Value> {
    match kind {
        JsonKind::Null => Just(Value::Null).boxed(),
        JsonKind::Boolean => any::<bool>().prop_map(Value::Bool).boxed(),
        JsonKind::Number => any::<i32>().prop_map(|n| json!(n)).boxed(),
        JsonKind::String => "[ -~]{0,16}".prop_map(Value::String).boxed(),
        JsonKind::Array => Just(json!([])).boxed(),
        JsonKind::Object => Just(json!({})).boxed(),
    }
}

/// Generate arbitrary JSON values up to a small depth.
pub fn json_strategy() -> impl Strategy<Value = Value> {
    scalar_strategy().prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map(key_strategy(), inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

/// Generate flat JSON objects with scalar fields.
pub fn flat_object_strategy() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map(key_strategy(), scalar_strategy(), 1..6)
        .prop_map(|m| m.into_iter().collect())
}

/// Generate user records shaped like the sample provider's responses.
pub fn user_strategy() -> impl Strategy<Value = Value> {
    (1u32..100_000, "[A-Z][a-z]{1,10}", "[A-Z][a-z]{1,12}").prop_map(|(id, first, last)| {
        json!({"id": id, "firstName": first, "lastName": last})
    })
}

/// Generate provider-state labels.
pub fn state_label_strategy() -> impl Strategy<Value = String> {
    (
        prop_oneof![Just("there is a user with id"), Just("there is no user with id")],
        0u32..1000,
    )
        .prop_map(|(prefix, id)| format!("{prefix} {{{id}}}"))
}
