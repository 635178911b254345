//! Compiled request predicates.
//!
//! Expectation matchers are compiled once, when the expectation is
//! registered, so that regexes and globs are never rebuilt per request and
//! malformed patterns are rejected up front.
//!
//! # Module Structure
//!
//! - `path_matcher` - exact, glob and regex path matching
//! - `field_matcher` - subset matching for headers and query parameters
//! - `body_matcher` - exact, substring, regex and JSON body matching
//! - `request` - the combined matcher for a whole request

mod body_matcher;
mod field_matcher;
mod path_matcher;
mod request;

pub use body_matcher::{json_contains, CompiledBodyMatcher};
pub use field_matcher::{CompiledFieldMatcher, CompiledFields};
pub use path_matcher::CompiledPathMatcher;
pub use request::CompiledRequestMatcher;

/// Errors raised while compiling a request matcher.
#[derive(Debug, thiserror::Error)]
pub enum PredicateError {
    #[error("invalid regex '{pattern}': {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid glob '{pattern}': {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },
    #[error("path pattern must set one of exact, glob or regex")]
    EmptyPath,
}

/// Compile a regex that must match the whole input.
pub(crate) fn anchored_regex(pattern: &str) -> Result<regex::Regex, PredicateError> {
    regex::Regex::new(&format!("^(?:{pattern})$")).map_err(|source| PredicateError::Regex {
        pattern: pattern.to_string(),
        source,
    })
}
