//! CORS configuration.

use serde::{Deserialize, Serialize};

/// Methods advertised in `Access-Control-Allow-Methods`
pub const DEFAULT_ALLOW_METHODS: &str = "CONNECT, DELETE, GET, HEAD, OPTIONS, POST, PUT, PATCH, TRACE";

/// Headers advertised in `Access-Control-Allow-Headers` and `-Expose-Headers`
pub const DEFAULT_ALLOW_HEADERS: &str = "Allow, Content-Encoding, Content-Length, Content-Type, ETag, Expires, Last-Modified, Location, Server, Vary, Authorization";

/// Default max age for preflight cache (5 minutes)
pub const DEFAULT_MAX_AGE_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CorsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_allow_origin")]
    pub allow_origin: String,
    #[serde(default = "default_allow_methods")]
    pub allow_methods: String,
    #[serde(default = "default_allow_headers")]
    pub allow_headers: String,
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
}

fn default_allow_origin() -> String {
    "*".to_string()
}

fn default_allow_methods() -> String {
    DEFAULT_ALLOW_METHODS.to_string()
}

fn default_allow_headers() -> String {
    DEFAULT_ALLOW_HEADERS.to_string()
}

fn default_max_age_secs() -> u64 {
    DEFAULT_MAX_AGE_SECS
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allow_origin: default_allow_origin(),
            allow_methods: default_allow_methods(),
            allow_headers: default_allow_headers(),
            max_age_secs: default_max_age_secs(),
        }
    }
}

impl CorsConfig {
    /// CORS enabled for the given origin, other settings default.
    pub fn allow(origin: impl Into<String>) -> Self {
        Self {
            enabled: true,
            allow_origin: origin.into(),
            ..Default::default()
        }
    }

    /// Credentials may only be allowed for a specific origin.
    pub fn allow_credentials(&self) -> bool {
        self.allow_origin != "*"
    }
}
