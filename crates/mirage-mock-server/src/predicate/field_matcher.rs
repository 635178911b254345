//! Subset matching for headers and query parameters.
//!
//! Every expected name must be present in the request and every expected
//! value must appear among the request's values for that name. Extra request
//! fields are ignored.

use crate::expectation::FieldValues;
use indexmap::IndexMap;
use std::collections::HashMap;

/// Compiled matcher for one named field.
#[derive(Debug, Clone)]
pub struct CompiledFieldMatcher {
    /// Field name (lowercased for headers)
    pub name: String,
    pub values: Vec<String>,
}

/// Compiled set of field matchers, all of which must match.
#[derive(Debug, Clone, Default)]
pub struct CompiledFields {
    fields: Vec<CompiledFieldMatcher>,
}

impl CompiledFields {
    /// Compile header matchers; names are compared case-insensitively.
    pub fn headers(expected: &IndexMap<String, FieldValues>) -> Self {
        Self::compile(expected, true)
    }

    /// Compile query parameter matchers; names are case-sensitive.
    pub fn query(expected: &IndexMap<String, FieldValues>) -> Self {
        Self::compile(expected, false)
    }

    fn compile(expected: &IndexMap<String, FieldValues>, lowercase_name: bool) -> Self {
        let fields = expected
            .iter()
            .map(|(name, values)| CompiledFieldMatcher {
                name: if lowercase_name {
                    name.to_ascii_lowercase()
                } else {
                    name.clone()
                },
                values: values.as_slice().to_vec(),
            })
            .collect();
        Self { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn matches(&self, actual: &HashMap<String, Vec<String>>) -> bool {
        self.fields.iter().all(|field| match actual.get(&field.name) {
            Some(present) => field
                .values
                .iter()
                .all(|expected| present.iter().any(|value| value == expected)),
            None => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actual(pairs: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_header_names_case_insensitive() {
        let mut expected = IndexMap::new();
        expected.insert("X-Api-Key".to_string(), FieldValues::One("secret".into()));
        let fields = CompiledFields::headers(&expected);

        assert!(fields.matches(&actual(&[("x-api-key", &["secret"])])));
        assert!(!fields.matches(&actual(&[("x-api-key", &["other"])])));
        assert!(!fields.matches(&actual(&[])));
    }

    #[test]
    fn test_extra_fields_ignored() {
        let mut expected = IndexMap::new();
        expected.insert("route".to_string(), FieldValues::One("46A".into()));
        let fields = CompiledFields::query(&expected);

        assert!(fields.matches(&actual(&[
            ("route", &["46A"]),
            ("direction", &["inbound"])
        ])));
    }

    #[test]
    fn test_query_names_case_sensitive() {
        let mut expected = IndexMap::new();
        expected.insert("Route".to_string(), FieldValues::One("46A".into()));
        let fields = CompiledFields::query(&expected);

        assert!(!fields.matches(&actual(&[("route", &["46A"])])));
    }

    #[test]
    fn test_every_listed_value_required() {
        let mut expected = IndexMap::new();
        expected.insert(
            "tag".to_string(),
            FieldValues::Many(vec!["a".into(), "b".into()]),
        );
        let fields = CompiledFields::query(&expected);

        assert!(fields.matches(&actual(&[("tag", &["b", "c", "a"])])));
        assert!(!fields.matches(&actual(&[("tag", &["a"])])));
    }

    #[test]
    fn test_empty_matches_anything() {
        let fields = CompiledFields::headers(&IndexMap::new());
        assert!(fields.is_empty());
        assert!(fields.matches(&actual(&[])));
    }
}
