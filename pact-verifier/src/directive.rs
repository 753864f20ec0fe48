//! Matching directives and their decoding from pact documents.
//!
//! Expected bodies and headers are decoded once, at load time, into an
//! [`Expectation`] tree whose leaves are [`MatchingDirective`]s. Three wire
//! conventions are understood:
//!
//! - embedded `pact:matcher:type` marker objects,
//! - embedded Ruby-style `json_class` marker objects (`Pact::SomethingLike`,
//!   `Pact::Term`, `Pact::ArrayLike`),
//! - response-level `matchingRules`, in the v2 flat form (`"$.body.a[*].b"`)
//!   or the v3 categorised form (`{"body": {"$.a": {"matchers": [..]}}}`).
//!
//! Any leaf without a directive matches by equality against its literal value.

use crate::contract::Response;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

const V3_MARKER: &str = "pact:matcher:type";
const RUBY_MARKER: &str = "json_class";

/// Upper bound on elements generated for a request array template.
const MAX_GENERATED_ITEMS: usize = 100;

/// Errors raised while decoding matching directives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatcherError {
    /// Matcher kind this verifier does not understand
    #[error("unsupported matcher {kind:?} at {path}")]
    Unsupported {
        /// Matcher kind as written in the document
        kind: String,
        /// Location of the matcher
        path: String,
    },

    /// Regular expression failed to compile
    #[error("invalid regex {pattern:?} at {path}: {reason}")]
    InvalidRegex {
        /// Pattern as written in the document
        pattern: String,
        /// Location of the matcher
        path: String,
        /// Compiler message
        reason: String,
    },

    /// Matcher object is missing required fields or has the wrong shape
    #[error("malformed matcher at {path}: {reason}")]
    Malformed {
        /// Location of the matcher
        path: String,
        /// What is wrong with it
        reason: String,
    },
}

impl MatcherError {
    fn malformed(path: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// A compiled regular expression that must match the whole value.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compile a pattern, anchoring it at both ends.
    ///
    /// # Errors
    ///
    /// Returns the regex compiler error if the pattern is invalid.
    pub fn new(source: impl Into<String>) -> Result<Self, regex::Error> {
        let source = source.into();
        let regex = Regex::new(&format!("^(?:{source})$"))?;
        Ok(Self { source, regex })
    }

    /// The pattern as written in the document.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `value` matches the pattern in full.
    #[must_use]
    pub fn is_full_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    fn compile(source: &str, path: &str) -> Result<Self, MatcherError> {
        Self::new(source).map_err(|e| MatcherError::InvalidRegex {
            pattern: source.to_string(),
            path: path.to_string(),
            reason: e.to_string(),
        })
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

/// How strictly an actual value must conform to an expected one.
#[derive(Debug, Clone)]
pub enum MatchingDirective {
    /// Deep equality with the literal value
    Equality(Value),
    /// Same JSON type as the example; the literal is ignored
    TypeOnly(Value),
    /// A string fully matching the pattern
    Regex {
        /// Compiled pattern
        pattern: Pattern,
        /// Example value from the document
        example: Value,
    },
    /// An array of at least `min` elements, each matching `template`
    EachLike {
        /// Shape every element must satisfy
        template: Box<Expectation>,
        /// Minimum element count
        min: usize,
    },
}

/// A decoded expected value: structural nodes with directives at the leaves.
#[derive(Debug, Clone)]
pub enum Expectation {
    /// Object whose listed keys must be present; extra actual keys are allowed
    Object(BTreeMap<String, Expectation>),
    /// Positional array
    Array(Vec<Expectation>),
    /// Leaf directive
    Directive(MatchingDirective),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Literal,
    Type,
}

impl Expectation {
    /// Decode an expected value, honouring embedded matcher markers.
    ///
    /// # Errors
    ///
    /// Returns [`MatcherError`] for unknown or malformed markers.
    pub fn decode(value: &Value) -> Result<Self, MatcherError> {
        decode(value, "$.body", Mode::Literal)
    }

    /// Example value this expectation was decoded from.
    #[must_use]
    pub fn example(&self) -> Value {
        match self {
            Self::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.example()))
                    .collect(),
            ),
            Self::Array(items) => Value::Array(items.iter().map(Self::example).collect()),
            Self::Directive(directive) => directive.example(),
        }
    }
}

impl MatchingDirective {
    /// Example value carried by the directive.
    #[must_use]
    pub fn example(&self) -> Value {
        match self {
            Self::Equality(v) | Self::TypeOnly(v) => v.clone(),
            Self::Regex { example, .. } => example.clone(),
            Self::EachLike { template, .. } => Value::Array(vec![template.example()]),
        }
    }
}

fn decode(value: &Value, path: &str, mode: Mode) -> Result<Expectation, MatcherError> {
    match value {
        Value::Object(map) => {
            if let Some(kind) = map.get(V3_MARKER) {
                return decode_v3_marker(map, kind, path);
            }
            if let Some(class) = map
                .get(RUBY_MARKER)
                .and_then(Value::as_str)
                .filter(|class| class.starts_with("Pact::"))
            {
                return decode_ruby_marker(map, class, path);
            }
            let fields = map
                .iter()
                .map(|(k, v)| Ok((k.clone(), decode(v, &field_path(path, k), mode)?)))
                .collect::<Result<BTreeMap<_, _>, MatcherError>>()?;
            Ok(Expectation::Object(fields))
        }
        Value::Array(items) => match mode {
            Mode::Literal => items
                .iter()
                .enumerate()
                .map(|(i, v)| decode(v, &index_path(path, i), mode))
                .collect::<Result<Vec<_>, _>>()
                .map(Expectation::Array),
            Mode::Type => match items.first() {
                Some(first) => Ok(Expectation::Directive(MatchingDirective::EachLike {
                    template: Box::new(decode(first, &index_path(path, 0), mode)?),
                    min: 0,
                })),
                None => Ok(Expectation::Directive(MatchingDirective::TypeOnly(
                    Value::Array(Vec::new()),
                ))),
            },
        },
        scalar => Ok(Expectation::Directive(match mode {
            Mode::Literal => MatchingDirective::Equality(scalar.clone()),
            Mode::Type => MatchingDirective::TypeOnly(scalar.clone()),
        })),
    }
}

fn decode_v3_marker(
    map: &Map<String, Value>,
    kind: &Value,
    path: &str,
) -> Result<Expectation, MatcherError> {
    let kind = kind
        .as_str()
        .ok_or_else(|| MatcherError::malformed(path, "matcher type must be a string"))?;
    let value = map.get("value").unwrap_or(&Value::Null);

    match kind {
        "type" => match read_min(map, path)? {
            Some(min) => each_like(value, min, path),
            None => decode(value, path, Mode::Type),
        },
        "regex" => {
            let source = map
                .get("regex")
                .and_then(Value::as_str)
                .ok_or_else(|| MatcherError::malformed(path, "regex matcher without a pattern"))?;
            Ok(Expectation::Directive(MatchingDirective::Regex {
                pattern: Pattern::compile(source, path)?,
                example: example_value(value),
            }))
        }
        "equality" => Ok(Expectation::Directive(MatchingDirective::Equality(
            example_value(value),
        ))),
        "integer" | "decimal" | "number" | "boolean" => Ok(Expectation::Directive(
            MatchingDirective::TypeOnly(typed_example(kind, value)),
        )),
        other => Err(MatcherError::Unsupported {
            kind: other.to_string(),
            path: path.to_string(),
        }),
    }
}

/// Example for a JSON-type matcher, falling back to a value of that type.
fn typed_example(kind: &str, value: &Value) -> Value {
    match kind {
        "boolean" if value.is_boolean() => value.clone(),
        "boolean" => Value::Bool(true),
        "decimal" if value.is_number() => value.clone(),
        "decimal" => serde_json::json!(0.0),
        _ if value.is_number() => value.clone(),
        _ => serde_json::json!(0),
    }
}

fn decode_ruby_marker(
    map: &Map<String, Value>,
    class: &str,
    path: &str,
) -> Result<Expectation, MatcherError> {
    match class {
        "Pact::SomethingLike" => {
            decode(map.get("contents").unwrap_or(&Value::Null), path, Mode::Type)
        }
        "Pact::Term" => {
            let data = map
                .get("data")
                .ok_or_else(|| MatcherError::malformed(path, "Pact::Term without data"))?;
            let source = data
                .pointer("/matcher/s")
                .and_then(Value::as_str)
                .ok_or_else(|| MatcherError::malformed(path, "Pact::Term without a pattern"))?;
            Ok(Expectation::Directive(MatchingDirective::Regex {
                pattern: Pattern::compile(source, path)?,
                example: data.get("generate").cloned().unwrap_or(Value::Null),
            }))
        }
        "Pact::ArrayLike" => {
            let contents = map.get("contents").unwrap_or(&Value::Null);
            let min = read_min(map, path)?.unwrap_or(1);
            Ok(Expectation::Directive(MatchingDirective::EachLike {
                template: Box::new(decode(contents, &index_path(path, 0), Mode::Type)?),
                min,
            }))
        }
        other => Err(MatcherError::Unsupported {
            kind: other.to_string(),
            path: path.to_string(),
        }),
    }
}

fn each_like(value: &Value, min: usize, path: &str) -> Result<Expectation, MatcherError> {
    let template = match value {
        Value::Array(items) => items
            .first()
            .ok_or_else(|| MatcherError::malformed(path, "array matcher without a template"))?,
        other => other,
    };
    Ok(Expectation::Directive(MatchingDirective::EachLike {
        template: Box::new(decode(template, &index_path(path, 0), Mode::Type)?),
        min,
    }))
}

fn read_min(map: &Map<String, Value>, path: &str) -> Result<Option<usize>, MatcherError> {
    match map.get("min") {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| MatcherError::malformed(path, "min must be a non-negative integer")),
    }
}

/// Replace embedded matcher markers with their example values.
///
/// Used for expected requests, which are sent as concrete values.
#[must_use]
pub fn example_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            if map.contains_key(V3_MARKER) {
                let inner = map.get("value").unwrap_or(&Value::Null);
                let min = map.get("min").and_then(Value::as_u64).unwrap_or(0);
                return match inner {
                    Value::Array(items) if min > 0 => repeat_to_min(items, min),
                    other => example_value(other),
                };
            }
            match map.get(RUBY_MARKER).and_then(Value::as_str) {
                Some("Pact::SomethingLike") => {
                    example_value(map.get("contents").unwrap_or(&Value::Null))
                }
                Some("Pact::Term") => map
                    .get("data")
                    .and_then(|d| d.get("generate"))
                    .cloned()
                    .unwrap_or(Value::Null),
                Some("Pact::ArrayLike") => {
                    let contents = example_value(map.get("contents").unwrap_or(&Value::Null));
                    let min = map.get("min").and_then(Value::as_u64).unwrap_or(1);
                    repeat_to_min(&[contents], min)
                }
                _ => Value::Object(
                    map.iter()
                        .map(|(k, v)| (k.clone(), example_value(v)))
                        .collect(),
                ),
            }
        }
        Value::Array(items) => Value::Array(items.iter().map(example_value).collect()),
        scalar => scalar.clone(),
    }
}

fn repeat_to_min(items: &[Value], min: u64) -> Value {
    let mut out: Vec<Value> = items.iter().map(example_value).collect();
    let wanted = usize::try_from(min).map_or(MAX_GENERATED_ITEMS, |n| n.min(MAX_GENERATED_ITEMS));
    if let Some(first) = out.first().cloned() {
        while out.len() < wanted {
            out.push(first.clone());
        }
    }
    Value::Array(out)
}

/// Expected header with the directive its value must satisfy.
#[derive(Debug, Clone)]
pub struct HeaderExpectation {
    /// Header name as written in the document
    pub name: String,
    /// Directive applied to the actual header value
    pub directive: MatchingDirective,
}

/// Fully decoded expectation for one interaction's response.
#[derive(Debug, Clone)]
pub struct ResponseExpectation {
    /// Expected status code
    pub status: u16,
    /// Expected headers, sorted by name
    pub headers: Vec<HeaderExpectation>,
    /// Expected body, if the document declares one
    pub body: Option<Expectation>,
}

impl ResponseExpectation {
    /// Decode the response of an interaction, applying its matching rules.
    ///
    /// # Errors
    ///
    /// Returns [`MatcherError`] if any embedded marker or rule is invalid.
    pub fn from_response(response: &Response) -> Result<Self, MatcherError> {
        let mut headers = response
            .headers
            .iter()
            .map(|(name, value)| decode_header(name, value))
            .collect::<Result<Vec<_>, _>>()?;
        headers.sort_by(|a, b| a.name.cmp(&b.name));

        let mut body = response.body.as_ref().map(Expectation::decode).transpose()?;

        if let Some(rules) = &response.matching_rules {
            let rules = RuleSet::parse(rules)?;
            if let Some(body) = body.as_mut() {
                for (tokens, rule, path) in &rules.body {
                    apply_body_rule(body, tokens, rule, path)?;
                }
            }
            for (name, rule) in &rules.headers {
                let path = format!("$.headers.{name}");
                match headers.iter_mut().find(|h| h.name.eq_ignore_ascii_case(name)) {
                    Some(header) => {
                        let current = Expectation::Directive(header.directive.clone());
                        header.directive = header_directive(rule.rebuild(&current, &path)?, &path)?;
                    }
                    None => debug!(header = %name, "matching rule for undeclared header ignored"),
                }
            }
        }

        Ok(Self {
            status: response.status,
            headers,
            body,
        })
    }
}

fn decode_header(name: &str, value: &Value) -> Result<HeaderExpectation, MatcherError> {
    let path = format!("$.headers.{name}");
    let directive = match value {
        Value::String(s) => MatchingDirective::Equality(Value::String(s.clone())),
        Value::Array(values) => MatchingDirective::Equality(Value::String(
            values
                .iter()
                .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string))
                .collect::<Vec<_>>()
                .join(", "),
        )),
        other => header_directive(decode(other, &path, Mode::Literal)?, &path)?,
    };
    Ok(HeaderExpectation {
        name: name.to_string(),
        directive,
    })
}

fn header_directive(expectation: Expectation, path: &str) -> Result<MatchingDirective, MatcherError> {
    match expectation {
        Expectation::Directive(MatchingDirective::EachLike { .. }) => Err(MatcherError::malformed(
            path,
            "array matchers cannot apply to a header",
        )),
        Expectation::Directive(directive) => Ok(directive),
        Expectation::Object(_) | Expectation::Array(_) => Err(MatcherError::malformed(
            path,
            "header value must be a string or a matcher",
        )),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathToken {
    Field(String),
    Index(usize),
    Wildcard,
}

#[derive(Debug, Clone)]
enum RuleKind {
    Type,
    Regex(Pattern),
    Equality,
}

#[derive(Debug, Clone)]
struct Rule {
    kind: RuleKind,
    min: Option<usize>,
}

impl Rule {
    fn parse(value: &Value, path: &str) -> Result<Self, MatcherError> {
        let map = value
            .as_object()
            .ok_or_else(|| MatcherError::malformed(path, "matching rule must be an object"))?;
        let min = read_min(map, path)?;
        let regex = map.get("regex").and_then(Value::as_str);
        let kind = match map.get("match").and_then(Value::as_str) {
            Some("type" | "integer" | "decimal" | "number" | "boolean") => RuleKind::Type,
            Some("equality") => RuleKind::Equality,
            Some("regex") | None if regex.is_some() => {
                RuleKind::Regex(Pattern::compile(regex.unwrap_or_default(), path)?)
            }
            None if min.is_some() => RuleKind::Type,
            Some("regex") => {
                return Err(MatcherError::malformed(path, "regex rule without a pattern"));
            }
            Some(other) => {
                return Err(MatcherError::Unsupported {
                    kind: other.to_string(),
                    path: path.to_string(),
                });
            }
            None => return Err(MatcherError::malformed(path, "matching rule has no kind")),
        };
        Ok(Self { kind, min })
    }

    /// Parse a v3 `{"matchers": [...], "combine": ..}` entry.
    fn parse_v3(value: &Value, path: &str) -> Result<Self, MatcherError> {
        let matchers = value
            .get("matchers")
            .and_then(Value::as_array)
            .ok_or_else(|| MatcherError::malformed(path, "expected a matchers list"))?;
        let first = matchers
            .first()
            .ok_or_else(|| MatcherError::malformed(path, "empty matchers list"))?;
        if matchers.len() > 1 {
            debug!(path, count = matchers.len(), "only the first of several matchers is applied");
        }
        Self::parse(first, path)
    }

    fn rebuild(&self, node: &Expectation, path: &str) -> Result<Expectation, MatcherError> {
        let example = node.example();
        Ok(match (&self.kind, self.min) {
            (RuleKind::Type, Some(min)) => match &example {
                Value::Array(items) if !items.is_empty() => {
                    Expectation::Directive(MatchingDirective::EachLike {
                        template: Box::new(decode(&items[0], &index_path(path, 0), Mode::Type)?),
                        min,
                    })
                }
                _ => decode(&example, path, Mode::Type)?,
            },
            (RuleKind::Type, None) => decode(&example, path, Mode::Type)?,
            (RuleKind::Regex(pattern), _) => Expectation::Directive(MatchingDirective::Regex {
                pattern: pattern.clone(),
                example,
            }),
            (RuleKind::Equality, _) => Expectation::Directive(MatchingDirective::Equality(example)),
        })
    }
}

#[derive(Default)]
struct RuleSet {
    body: Vec<(Vec<PathToken>, Rule, String)>,
    headers: Vec<(String, Rule)>,
}

impl RuleSet {
    fn parse(rules: &Value) -> Result<Self, MatcherError> {
        let map = rules
            .as_object()
            .ok_or_else(|| MatcherError::malformed("$.matchingRules", "expected an object"))?;
        let mut set = Self::default();

        if map.keys().any(|k| k.starts_with('$')) {
            for (key, rule) in map {
                if let Some(rest) = key.strip_prefix("$.body") {
                    let path = format!("$.body{rest}");
                    let tokens = parse_path(&format!("${rest}"), &path)?;
                    set.body.push((tokens, Rule::parse(rule, &path)?, path));
                } else if let Some(name) = key.strip_prefix("$.headers.") {
                    set.headers.push((name.to_string(), Rule::parse(rule, key)?));
                } else {
                    debug!(rule = %key, "matching rule outside body and headers ignored");
                }
            }
        } else {
            if let Some(body) = map.get("body").and_then(Value::as_object) {
                for (key, rule) in body {
                    let path = format!("$.body{}", key.trim_start_matches('$'));
                    let tokens = parse_path(key, &path)?;
                    set.body.push((tokens, Rule::parse_v3(rule, &path)?, path));
                }
            }
            let headers = map.get("header").or_else(|| map.get("headers"));
            if let Some(headers) = headers.and_then(Value::as_object) {
                for (name, rule) in headers {
                    let path = format!("$.headers.{name}");
                    set.headers.push((name.clone(), Rule::parse_v3(rule, &path)?));
                }
            }
        }

        // Parents first, so rules on descendants refine what a parent rule built.
        set.body.sort_by_key(|(tokens, _, _)| tokens.len());
        Ok(set)
    }
}

fn parse_path(raw: &str, display: &str) -> Result<Vec<PathToken>, MatcherError> {
    let rest = raw
        .strip_prefix('$')
        .ok_or_else(|| MatcherError::malformed(display, "path must start with $"))?;
    let chars: Vec<char> = rest.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '.' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != '.' && chars[end] != '[' {
                    end += 1;
                }
                let name: String = chars[start..end].iter().collect();
                if name.is_empty() {
                    return Err(MatcherError::malformed(display, "empty path segment"));
                }
                tokens.push(if name == "*" {
                    PathToken::Wildcard
                } else {
                    PathToken::Field(name)
                });
                i = end;
            }
            '[' => {
                let close = chars[i..]
                    .iter()
                    .position(|c| *c == ']')
                    .map(|p| p + i)
                    .ok_or_else(|| MatcherError::malformed(display, "unclosed bracket"))?;
                let inner: String = chars[i + 1..close].iter().collect();
                let inner = inner.trim();
                tokens.push(if inner == "*" {
                    PathToken::Wildcard
                } else if let Ok(index) = inner.parse::<usize>() {
                    PathToken::Index(index)
                } else {
                    PathToken::Field(inner.trim_matches(|c| c == '\'' || c == '"').to_string())
                });
                i = close + 1;
            }
            _ => return Err(MatcherError::malformed(display, "unexpected character in path")),
        }
    }
    Ok(tokens)
}

fn apply_body_rule(
    node: &mut Expectation,
    tokens: &[PathToken],
    rule: &Rule,
    path: &str,
) -> Result<(), MatcherError> {
    let Some((token, rest)) = tokens.split_first() else {
        *node = rule.rebuild(node, path)?;
        return Ok(());
    };

    match (token, node) {
        (PathToken::Field(key), Expectation::Object(fields)) => {
            if let Some(child) = fields.get_mut(key) {
                apply_body_rule(child, rest, rule, path)?;
            }
        }
        (PathToken::Wildcard, Expectation::Object(fields)) => {
            for child in fields.values_mut() {
                apply_body_rule(child, rest, rule, path)?;
            }
        }
        (PathToken::Index(index), Expectation::Array(items)) => {
            if let Some(child) = items.get_mut(*index) {
                apply_body_rule(child, rest, rule, path)?;
            }
        }
        (PathToken::Wildcard, Expectation::Array(items)) => {
            for child in items {
                apply_body_rule(child, rest, rule, path)?;
            }
        }
        (
            PathToken::Index(_) | PathToken::Wildcard,
            Expectation::Directive(MatchingDirective::EachLike { template, .. }),
        ) => apply_body_rule(template, rest, rule, path)?,
        _ => debug!(path, "matching rule does not address any expected value"),
    }
    Ok(())
}

/// Append an object key to a JSON path.
pub(crate) fn field_path(parent: &str, key: &str) -> String {
    let plain = key
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if plain {
        format!("{parent}.{key}")
    } else {
        format!("{parent}['{key}']")
    }
}

/// Append an array index to a JSON path.
pub(crate) fn index_path(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}
