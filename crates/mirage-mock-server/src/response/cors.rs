//! CORS response headers.

use crate::config::CorsConfig;
use hyper::header::{
    InvalidHeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS,
    ACCESS_CONTROL_MAX_AGE,
};
use hyper::http::{HeaderName, HeaderValue};

/// Precomputed CORS header set added to every response.
#[derive(Debug, Clone)]
pub struct CorsHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl CorsHeaders {
    pub fn new(config: &CorsConfig) -> Result<Self, InvalidHeaderValue> {
        let mut headers = vec![
            (
                ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_str(&config.allow_origin)?,
            ),
            (
                ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_str(&config.allow_methods)?,
            ),
            (
                ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_str(&config.allow_headers)?,
            ),
            (
                ACCESS_CONTROL_EXPOSE_HEADERS,
                HeaderValue::from_str(&config.allow_headers)?,
            ),
            (
                ACCESS_CONTROL_MAX_AGE,
                HeaderValue::from(config.max_age_secs),
            ),
        ];

        if config.allow_credentials() {
            headers.push((
                ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            ));
        }

        Ok(Self { headers })
    }

    /// Add every CORS header not already present.
    pub fn apply(&self, headers: &mut Vec<(HeaderName, HeaderValue)>) {
        for (name, value) in &self.headers {
            if !headers.iter().any(|(existing, _)| existing == name) {
                headers.push((name.clone(), value.clone()));
            }
        }
    }
}
