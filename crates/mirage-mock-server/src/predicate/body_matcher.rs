//! Body matching compilation.

use super::{anchored_regex, PredicateError};
use crate::expectation::{BodyPattern, JsonMatchType, TypedBody};
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;

/// Compiled body matcher for efficient runtime evaluation.
#[derive(Debug, Clone)]
pub enum CompiledBodyMatcher {
    Exact(String),
    Substring(String),
    Regex(Arc<Regex>),
    Json { expected: Value, strict: bool },
}

impl CompiledBodyMatcher {
    pub fn compile(pattern: &BodyPattern) -> Result<Self, PredicateError> {
        Ok(match pattern {
            BodyPattern::Text(text) => CompiledBodyMatcher::Exact(text.clone()),
            BodyPattern::Typed(TypedBody::String { string, sub_string }) => {
                if *sub_string {
                    CompiledBodyMatcher::Substring(string.clone())
                } else {
                    CompiledBodyMatcher::Exact(string.clone())
                }
            }
            BodyPattern::Typed(TypedBody::Regex { regex }) => {
                CompiledBodyMatcher::Regex(Arc::new(anchored_regex(regex)?))
            }
            BodyPattern::Typed(TypedBody::Json { json, match_type }) => CompiledBodyMatcher::Json {
                expected: json.clone(),
                strict: *match_type == JsonMatchType::Strict,
            },
        })
    }

    pub fn matches(&self, body: &str) -> bool {
        match self {
            CompiledBodyMatcher::Exact(expected) => body == expected,
            CompiledBodyMatcher::Substring(needle) => body.contains(needle.as_str()),
            CompiledBodyMatcher::Regex(regex) => regex.is_match(body),
            CompiledBodyMatcher::Json { expected, strict } => {
                match serde_json::from_str::<Value>(body) {
                    Ok(actual) if *strict => actual == *expected,
                    Ok(actual) => json_contains(&actual, expected),
                    Err(_) => false,
                }
            }
        }
    }
}

/// True when every field of `expected` is present and equal in `actual`.
/// Objects may carry extra keys; arrays must have equal length and match
/// element-wise.
pub fn json_contains(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(a), Value::Object(b)) => b.iter().all(|(key, expected_val)| {
            a.get(key)
                .is_some_and(|actual_val| json_contains(actual_val, expected_val))
        }),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| json_contains(x, y))
        }
        (a, b) => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn typed(body: TypedBody) -> CompiledBodyMatcher {
        CompiledBodyMatcher::compile(&BodyPattern::Typed(body)).unwrap()
    }

    #[test]
    fn test_exact_text() {
        let matcher = CompiledBodyMatcher::compile(&BodyPattern::Text("ping".into())).unwrap();
        assert!(matcher.matches("ping"));
        assert!(!matcher.matches("ping "));
    }

    #[test]
    fn test_substring() {
        let matcher = typed(TypedBody::String {
            string: "stop".into(),
            sub_string: true,
        });
        assert!(matcher.matches("nearest stop please"));
        assert!(!matcher.matches("nearest route"));
    }

    #[test]
    fn test_regex_body() {
        let matcher = typed(TypedBody::Regex {
            regex: r#"\{"route":"\d+"\}"#.into(),
        });
        assert!(matcher.matches(r#"{"route":"46"}"#));
        assert!(!matcher.matches(r#"{"route":"46A"}"#));
    }

    #[test]
    fn test_json_only_matching_fields() {
        let matcher = typed(TypedBody::Json {
            json: json!({"route": "46A", "stops": [1, 2]}),
            match_type: JsonMatchType::OnlyMatchingFields,
        });
        assert!(matcher.matches(r#"{"route":"46A","stops":[1,2],"extra":true}"#));
        assert!(!matcher.matches(r#"{"route":"46A","stops":[1]}"#));
        assert!(!matcher.matches("not json"));
    }

    #[test]
    fn test_json_strict() {
        let matcher = typed(TypedBody::Json {
            json: json!({"route": "46A"}),
            match_type: JsonMatchType::Strict,
        });
        assert!(matcher.matches(r#"{ "route": "46A" }"#));
        assert!(!matcher.matches(r#"{"route":"46A","extra":true}"#));
    }

    #[test]
    fn test_json_contains_nested() {
        let actual = json!({"a": {"b": 1, "c": [ {"d": 2, "e": 3} ]}});
        assert!(json_contains(&actual, &json!({"a": {"c": [{"d": 2}]}})));
        assert!(!json_contains(&actual, &json!({"a": {"b": 2}})));
    }
}
