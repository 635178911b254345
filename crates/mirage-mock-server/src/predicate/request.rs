//! Combined request matcher.

use super::body_matcher::CompiledBodyMatcher;
use super::field_matcher::CompiledFields;
use super::path_matcher::CompiledPathMatcher;
use super::PredicateError;
use crate::expectation::RequestMatcher;
use crate::request::RequestDescriptor;

/// Compiled request matcher for efficient runtime evaluation.
#[derive(Debug, Clone, Default)]
pub struct CompiledRequestMatcher {
    pub method: Option<String>,
    pub path: Option<CompiledPathMatcher>,
    pub headers: CompiledFields,
    pub query: CompiledFields,
    pub body: Option<CompiledBodyMatcher>,
}

impl CompiledRequestMatcher {
    /// Compile a RequestMatcher configuration.
    pub fn compile(matcher: &RequestMatcher) -> Result<Self, PredicateError> {
        Ok(Self {
            method: matcher.method.clone(),
            path: matcher
                .path
                .as_ref()
                .map(CompiledPathMatcher::compile)
                .transpose()?,
            headers: CompiledFields::headers(&matcher.headers),
            query: CompiledFields::query(&matcher.query_string_parameters),
            body: matcher
                .body
                .as_ref()
                .map(CompiledBodyMatcher::compile)
                .transpose()?,
        })
    }

    /// Every specified field must accept the request.
    pub fn matches(&self, request: &RequestDescriptor) -> bool {
        if let Some(method) = &self.method {
            if method != &request.method {
                return false;
            }
        }

        if let Some(path) = &self.path {
            if !path.matches(&request.path) {
                return false;
            }
        }

        if !self.headers.matches(&request.headers) || !self.query.matches(&request.query) {
            return false;
        }

        match &self.body {
            Some(body) => body.matches(&request.body),
            None => true,
        }
    }
}
