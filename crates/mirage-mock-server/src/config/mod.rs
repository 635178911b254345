//! Configuration types for the Mirage mock server.

mod cors;
mod listen;
mod persistence;

use std::path::{Path, PathBuf};

use anyhow::Context;
use hyper::header::HeaderValue;
use serde::{Deserialize, Serialize};

pub use cors::{CorsConfig, DEFAULT_ALLOW_HEADERS, DEFAULT_ALLOW_METHODS, DEFAULT_MAX_AGE_SECS};
pub use listen::ListenConfig;
pub use persistence::PersistenceConfig;

/// Server configuration. Built once at startup and shared read-only.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Expectations loaded once at startup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initialization_path: Option<PathBuf>,
    #[serde(default)]
    pub fallback: FallbackConfig,
}

/// Response sent when no expectation matches.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FallbackConfig {
    #[serde(default = "default_fallback_status")]
    pub status_code: u16,
    /// Fixed body; when absent the body names the unmatched method and path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

fn default_fallback_status() -> u16 {
    404
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            status_code: default_fallback_status(),
            body: None,
        }
    }
}

impl ServerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: ServerConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.persistence.enabled && self.persistence.path.as_os_str().is_empty() {
            anyhow::bail!("persistence.path must be set when persistence is enabled");
        }

        if self.cors.enabled {
            if self.cors.allow_origin.trim().is_empty() {
                anyhow::bail!("cors.allow_origin must not be empty when CORS is enabled");
            }
            for (field, value) in [
                ("cors.allow_origin", &self.cors.allow_origin),
                ("cors.allow_methods", &self.cors.allow_methods),
                ("cors.allow_headers", &self.cors.allow_headers),
            ] {
                HeaderValue::from_str(value)
                    .map_err(|_| anyhow::anyhow!("{field} is not a valid header value"))?;
            }
        }

        if !(100..=999).contains(&self.fallback.status_code) {
            anyhow::bail!(
                "fallback.status_code {} is out of range (100-999)",
                self.fallback.status_code
            );
        }

        Ok(())
    }

    /// Address string for binding the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listen.host, self.listen.port)
    }
}
