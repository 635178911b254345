//! Type definitions for expectations.
//!
//! An expectation pairs a request matcher (`httpRequest`) with a response
//! template (`httpResponse`), an optional priority and an optional bound on
//! how many times it may fire (`times`).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Expectation
// ============================================================================

/// A stored rule pairing a request matcher with a response template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expectation {
    /// Unique identifier. Assigned on registration when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Higher priority is matched first; equal priorities keep registration order.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub priority: i32,
    #[serde(default)]
    pub http_request: RequestMatcher,
    pub http_response: ResponseTemplate,
    /// Absent means unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub times: Option<Times>,
}

fn is_zero(value: &i32) -> bool {
    *value == 0
}

impl Expectation {
    /// Convenience constructor for a catch-all expectation returning `response`.
    pub fn new(http_request: RequestMatcher, http_response: ResponseTemplate) -> Self {
        Self {
            id: None,
            priority: 0,
            http_request,
            http_response,
            times: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_times(mut self, remaining: u64) -> Self {
        self.times = Some(Times::exactly(remaining));
        self
    }

    /// Resolve the remaining-times bound: `None` for unlimited.
    pub fn limit(&self) -> Result<Option<u64>, ExpectationError> {
        match &self.times {
            None => Ok(None),
            Some(times) => times.limit(),
        }
    }
}

// ============================================================================
// Request Matcher
// ============================================================================

/// Predicate over an incoming request. Every field is optional and an
/// absent field matches anything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMatcher {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathPattern>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, FieldValues>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub query_string_parameters: IndexMap<String, FieldValues>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<BodyPattern>,
}

impl RequestMatcher {
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(PathPattern::Literal(path.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into(), FieldValues::One(value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_string_parameters
            .insert(name.into(), FieldValues::One(value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(BodyPattern::Text(body.into()));
        self
    }

    /// True when no field is constrained (the matcher accepts every request).
    pub fn is_catch_all(&self) -> bool {
        self.method.is_none()
            && self.path.is_none()
            && self.headers.is_empty()
            && self.query_string_parameters.is_empty()
            && self.body.is_none()
    }
}

/// A single value or a list of values for a header or query parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValues {
    One(String),
    Many(Vec<String>),
}

impl FieldValues {
    pub fn as_slice(&self) -> &[String] {
        match self {
            FieldValues::One(value) => std::slice::from_ref(value),
            FieldValues::Many(values) => values,
        }
    }
}

/// Path pattern: a plain string is an exact match; the object form picks the
/// first non-empty of `exact`, `glob`, `regex`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathPattern {
    Literal(String),
    Pattern {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exact: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        glob: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        regex: Option<String>,
    },
}

impl PathPattern {
    pub fn glob(pattern: impl Into<String>) -> Self {
        PathPattern::Pattern {
            exact: None,
            glob: Some(pattern.into()),
            regex: None,
        }
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        PathPattern::Pattern {
            exact: None,
            glob: None,
            regex: Some(pattern.into()),
        }
    }
}

/// Body pattern: a plain string is an exact match, the object form is typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BodyPattern {
    Text(String),
    Typed(TypedBody),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypedBody {
    String {
        string: String,
        #[serde(rename = "subString", default, skip_serializing_if = "std::ops::Not::not")]
        sub_string: bool,
    },
    Regex {
        regex: String,
    },
    Json {
        json: serde_json::Value,
        #[serde(rename = "matchType", default)]
        match_type: JsonMatchType,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JsonMatchType {
    Strict,
    /// Every expected field must be present and equal; extra fields are ignored.
    #[default]
    OnlyMatchingFields,
}

// ============================================================================
// Response Template
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseTemplate {
    #[serde(
        default = "default_status_code",
        deserialize_with = "deserialize_status_code"
    )]
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_phrase: Option<String>,
    /// Response headers, emitted in insertion order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, FieldValues>,
    /// String bodies are sent as-is; any other JSON value is serialized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<Delay>,
}

impl Default for ResponseTemplate {
    fn default() -> Self {
        Self {
            status_code: default_status_code(),
            reason_phrase: None,
            headers: IndexMap::new(),
            body: None,
            delay: None,
        }
    }
}

impl ResponseTemplate {
    pub fn status(status_code: u16) -> Self {
        Self {
            status_code,
            ..Default::default()
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into(), FieldValues::One(value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(serde_json::Value::String(body.into()));
        self
    }

    pub fn json_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn delay_millis(mut self, millis: u64) -> Self {
        self.delay = Some(Delay::Millis(millis));
        self
    }
}

pub(crate) fn default_status_code() -> u16 {
    200
}

/// Deserialize statusCode from either a number or a string
pub(crate) fn deserialize_status_code<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .and_then(|n| u16::try_from(n).ok())
            .ok_or_else(|| D::Error::custom("invalid status code number")),
        serde_json::Value::String(s) => s
            .parse::<u16>()
            .map_err(|_| D::Error::custom(format!("invalid status code string: {s}"))),
        _ => Err(D::Error::custom("statusCode must be a number or string")),
    }
}

/// Response delay: plain milliseconds or `{ "timeUnit": ..., "value": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Delay {
    Millis(u64),
    Timed {
        #[serde(rename = "timeUnit", default)]
        time_unit: TimeUnit,
        value: u64,
    },
}

impl Delay {
    pub fn duration(&self) -> Duration {
        match self {
            Delay::Millis(ms) => Duration::from_millis(*ms),
            Delay::Timed { time_unit, value } => match time_unit {
                TimeUnit::Milliseconds => Duration::from_millis(*value),
                TimeUnit::Seconds => Duration::from_secs(*value),
                TimeUnit::Minutes => Duration::from_secs(value.saturating_mul(60)),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeUnit {
    #[default]
    Milliseconds,
    Seconds,
    Minutes,
}

// ============================================================================
// Times
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Times {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_times: Option<u64>,
    #[serde(default)]
    pub unlimited: bool,
}

impl Times {
    pub fn exactly(remaining: u64) -> Self {
        Self {
            remaining_times: Some(remaining),
            unlimited: false,
        }
    }

    pub fn unlimited() -> Self {
        Self {
            remaining_times: None,
            unlimited: true,
        }
    }

    pub fn limit(&self) -> Result<Option<u64>, ExpectationError> {
        if self.unlimited {
            return Ok(None);
        }
        self.remaining_times.map(Some).ok_or_else(|| {
            ExpectationError::Validation(
                "times.remainingTimes is required unless times.unlimited is true".to_string(),
            )
        })
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Error types for expectation management
#[derive(Debug, thiserror::Error)]
pub enum ExpectationError {
    #[error("invalid expectation: {0}")]
    Validation(String),
    #[error("no expectation with id {0}")]
    NotFound(String),
}

impl From<crate::predicate::PredicateError> for ExpectationError {
    fn from(err: crate::predicate::PredicateError) -> Self {
        ExpectationError::Validation(err.to_string())
    }
}

impl From<serde_json::Error> for ExpectationError {
    fn from(err: serde_json::Error) -> Self {
        ExpectationError::Validation(err.to_string())
    }
}
