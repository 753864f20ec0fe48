//! Response matching.
//!
//! Compares an actual provider response against a decoded
//! [`ResponseExpectation`]. Matching never stops at the first problem: every
//! discrepancy is recorded with its JSON path so one run reports them all.
//!
//! Expected objects are a subset of the actual ones. Keys present only in the
//! actual response are ignored, as are headers the expectation does not list.

use crate::client::ProviderResponse;
use crate::directive::{Expectation, MatchingDirective, ResponseExpectation, field_path, index_path};
use crate::outcome::{Mismatch, MismatchKind};
use serde_json::{Number, Value};

const BODY_ROOT: &str = "$.body";

/// Compare a response against its expectation, returning every mismatch.
#[must_use]
pub fn match_response(expected: &ResponseExpectation, actual: &ProviderResponse) -> Vec<Mismatch> {
    let mut mismatches = Vec::new();
    match_status(expected.status, actual.status, &mut mismatches);
    for header in &expected.headers {
        match_header(&header.name, &header.directive, actual, &mut mismatches);
    }
    if let Some(body) = &expected.body {
        match_body(body, &actual.body, &mut mismatches);
    }
    mismatches
}

fn match_status(expected: u16, actual: u16, out: &mut Vec<Mismatch>) {
    if expected != actual {
        out.push(Mismatch::new(
            MismatchKind::Status,
            "$.status",
            expected.to_string(),
            actual.to_string(),
            "status code differs",
        ));
    }
}

fn match_header(
    name: &str,
    directive: &MatchingDirective,
    actual: &ProviderResponse,
    out: &mut Vec<Mismatch>,
) {
    let path = format!("$.headers.{name}");
    let Some(value) = actual.header(name) else {
        out.push(Mismatch::new(
            MismatchKind::Header,
            path,
            render(&directive.example()),
            "<missing>",
            "header is missing",
        ));
        return;
    };

    let problem = match directive {
        MatchingDirective::Equality(expected) => {
            let expected = expected
                .as_str()
                .map_or_else(|| expected.to_string(), str::to_string);
            (normalize_header(&expected) != normalize_header(&value))
                .then(|| (render_str(&expected), "header value differs".to_string()))
        }
        MatchingDirective::TypeOnly(_) => None,
        MatchingDirective::Regex { pattern, .. } => (!pattern.is_full_match(&value)).then(|| {
            (
                format!("/{}/", pattern.as_str()),
                "header does not match pattern".to_string(),
            )
        }),
        MatchingDirective::EachLike { .. } => Some((
            "an array".to_string(),
            "array matcher cannot apply to a header".to_string(),
        )),
    };

    if let Some((expected, message)) = problem {
        out.push(Mismatch::new(
            MismatchKind::Header,
            path,
            expected,
            render_str(&value),
            message,
        ));
    }
}

/// Collapse whitespace around `,` and `;` separators in a header value.
fn normalize_header(value: &str) -> String {
    value
        .split(',')
        .map(|part| part.split(';').map(str::trim).collect::<Vec<_>>().join(";"))
        .collect::<Vec<_>>()
        .join(",")
}

fn match_body(expected: &Expectation, body: &[u8], out: &mut Vec<Mismatch>) {
    if body.iter().all(u8::is_ascii_whitespace) {
        if matches!(expected, Expectation::Directive(MatchingDirective::Equality(Value::String(s))) if s.is_empty()) {
            return;
        }
        out.push(Mismatch::new(
            MismatchKind::Body,
            BODY_ROOT,
            render(&expected.example()),
            "<empty>",
            "expected a body but the response had none",
        ));
        return;
    }
    let actual = serde_json::from_slice::<Value>(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()));
    match_value(expected, &actual, BODY_ROOT, out);
}

/// Recursively match a value against an expectation, collecting mismatches.
pub fn match_value(expected: &Expectation, actual: &Value, path: &str, out: &mut Vec<Mismatch>) {
    match expected {
        Expectation::Object(fields) => {
            let Some(object) = actual.as_object() else {
                out.push(type_mismatch(path, "object", actual));
                return;
            };
            for (key, child) in fields {
                let child_path = field_path(path, key);
                match object.get(key) {
                    Some(value) => match_value(child, value, &child_path, out),
                    None => out.push(missing(&child_path, &child.example())),
                }
            }
        }
        Expectation::Array(items) => {
            let Some(array) = actual.as_array() else {
                out.push(type_mismatch(path, "array", actual));
                return;
            };
            for (i, child) in items.iter().enumerate() {
                let child_path = index_path(path, i);
                match array.get(i) {
                    Some(value) => match_value(child, value, &child_path, out),
                    None => out.push(missing(&child_path, &child.example())),
                }
            }
            if array.len() > items.len() {
                out.push(Mismatch::new(
                    MismatchKind::Body,
                    path,
                    format!("{} elements", items.len()),
                    format!("{} elements", array.len()),
                    "array has unexpected extra elements",
                ));
            }
        }
        Expectation::Directive(directive) => match_directive(directive, actual, path, out),
    }
}

fn match_directive(directive: &MatchingDirective, actual: &Value, path: &str, out: &mut Vec<Mismatch>) {
    match directive {
        MatchingDirective::Equality(expected) => {
            if !values_equal(expected, actual) {
                out.push(Mismatch::new(
                    MismatchKind::Body,
                    path,
                    render(expected),
                    render(actual),
                    "value differs",
                ));
            }
        }
        MatchingDirective::TypeOnly(example) => match_type(example, actual, path, out),
        MatchingDirective::Regex { pattern, .. } => match actual.as_str() {
            Some(s) if pattern.is_full_match(s) => {}
            Some(_) => out.push(Mismatch::new(
                MismatchKind::Body,
                path,
                format!("/{}/", pattern.as_str()),
                render(actual),
                "value does not match pattern",
            )),
            None => out.push(type_mismatch(path, "string", actual)),
        },
        MatchingDirective::EachLike { template, min } => {
            let Some(array) = actual.as_array() else {
                out.push(type_mismatch(path, "array", actual));
                return;
            };
            if array.len() < *min {
                out.push(Mismatch::new(
                    MismatchKind::Body,
                    path,
                    format!("at least {min} elements"),
                    format!("{} elements", array.len()),
                    "array is shorter than the minimum",
                ));
            }
            for (i, element) in array.iter().enumerate() {
                match_value(template, element, &index_path(path, i), out);
            }
        }
    }
}

/// Type-only comparison. Objects and arrays cascade into their contents.
fn match_type(example: &Value, actual: &Value, path: &str, out: &mut Vec<Mismatch>) {
    if json_type(example) != json_type(actual) {
        out.push(type_mismatch(path, json_type(example), actual));
        return;
    }
    match (example, actual) {
        (Value::Object(expected), Value::Object(object)) => {
            for (key, child) in expected {
                let child_path = field_path(path, key);
                match object.get(key) {
                    Some(value) => match_type(child, value, &child_path, out),
                    None => out.push(missing(&child_path, child)),
                }
            }
        }
        (Value::Array(expected), Value::Array(array)) => {
            if let Some(first) = expected.first() {
                for (i, element) in array.iter().enumerate() {
                    match_type(first, element, &index_path(path, i), out);
                }
            }
        }
        _ => {}
    }
}

/// Deep equality where numbers compare by value regardless of representation.
#[must_use]
pub fn values_equal(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Number(a), Value::Number(b)) => numbers_equal(a, b),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|other| values_equal(v, other)))
        }
        _ => expected == actual,
    }
}

#[allow(clippy::float_cmp)]
fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// JSON type name of a value.
#[must_use]
pub const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_mismatch(path: &str, expected_type: &str, actual: &Value) -> Mismatch {
    Mismatch::new(
        MismatchKind::Body,
        path,
        format!("a value of type {expected_type}"),
        render(actual),
        format!("expected {expected_type} but found {}", json_type(actual)),
    )
}

fn missing(path: &str, expected: &Value) -> Mismatch {
    Mismatch::new(
        MismatchKind::Body,
        path,
        render(expected),
        "<missing>",
        "expected value is missing",
    )
}

fn render(value: &Value) -> String {
    value.to_string()
}

fn render_str(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}
