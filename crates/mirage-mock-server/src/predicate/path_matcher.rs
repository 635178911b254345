//! Path matching compilation.

use super::{anchored_regex, PredicateError};
use crate::expectation::PathPattern;
use globset::{GlobBuilder, GlobMatcher};
use regex::Regex;
use std::sync::Arc;

/// Compiled path matcher for efficient runtime evaluation.
#[derive(Debug, Clone)]
pub enum CompiledPathMatcher {
    Exact(String),
    Glob(Arc<GlobMatcher>),
    Regex(Arc<Regex>),
}

impl CompiledPathMatcher {
    /// Compile a path pattern. In the object form the first non-empty of
    /// `exact`, `glob`, `regex` wins.
    pub fn compile(pattern: &PathPattern) -> Result<Self, PredicateError> {
        match pattern {
            PathPattern::Literal(path) => Ok(CompiledPathMatcher::Exact(path.clone())),
            PathPattern::Pattern { exact, glob, regex } => {
                let non_empty = |field: &Option<String>| field.clone().filter(|s| !s.is_empty());

                if let Some(exact) = non_empty(exact) {
                    Ok(CompiledPathMatcher::Exact(exact))
                } else if let Some(glob) = non_empty(glob) {
                    let matcher = GlobBuilder::new(&glob)
                        .literal_separator(true)
                        .build()
                        .map_err(|source| PredicateError::Glob {
                            pattern: glob.clone(),
                            source,
                        })?
                        .compile_matcher();
                    Ok(CompiledPathMatcher::Glob(Arc::new(matcher)))
                } else if let Some(regex) = non_empty(regex) {
                    Ok(CompiledPathMatcher::Regex(Arc::new(anchored_regex(&regex)?)))
                } else {
                    Err(PredicateError::EmptyPath)
                }
            }
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            CompiledPathMatcher::Exact(expected) => expected == path,
            CompiledPathMatcher::Glob(glob) => glob.is_match(path),
            CompiledPathMatcher::Regex(regex) => regex.is_match(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(pattern: PathPattern) -> CompiledPathMatcher {
        CompiledPathMatcher::compile(&pattern).unwrap()
    }

    #[test]
    fn test_literal_is_exact() {
        let matcher = compile(PathPattern::Literal("/buses".to_string()));
        assert!(matcher.matches("/buses"));
        assert!(!matcher.matches("/buses/1"));
        assert!(!matcher.matches("/BUSES"));
    }

    #[test]
    fn test_glob_does_not_cross_separator() {
        let matcher = compile(PathPattern::glob("/stops/*"));
        assert!(matcher.matches("/stops/123"));
        assert!(!matcher.matches("/stops/123/arrivals"));

        let deep = compile(PathPattern::glob("/stops/**"));
        assert!(deep.matches("/stops/123/arrivals"));
    }

    #[test]
    fn test_regex_is_anchored() {
        let matcher = compile(PathPattern::regex(r"/routes/\d+"));
        assert!(matcher.matches("/routes/46"));
        assert!(!matcher.matches("/routes/46a"));
        assert!(!matcher.matches("/api/routes/46"));
    }

    #[test]
    fn test_first_non_empty_field_wins() {
        let pattern = PathPattern::Pattern {
            exact: Some(String::new()),
            glob: Some("/a/*".to_string()),
            regex: Some("/b/.*".to_string()),
        };
        let matcher = compile(pattern);
        assert!(matcher.matches("/a/x"));
        assert!(!matcher.matches("/b/x"));
    }

    #[test]
    fn test_invalid_patterns_rejected() {
        assert!(matches!(
            CompiledPathMatcher::compile(&PathPattern::regex("/(unclosed")),
            Err(PredicateError::Regex { .. })
        ));
        assert!(matches!(
            CompiledPathMatcher::compile(&PathPattern::glob("/[unclosed")),
            Err(PredicateError::Glob { .. })
        ));
        assert!(matches!(
            CompiledPathMatcher::compile(&PathPattern::Pattern {
                exact: None,
                glob: None,
                regex: None
            }),
            Err(PredicateError::EmptyPath)
        ));
    }
}
