//! Client configuration.
//!
//! The base host is injected at construction; nothing in the crate looks it
//! up from process-wide state. `from_env` is a convenience for binaries.

use serde::Deserialize;
use thiserror::Error;

/// Path prefix of the API version this client speaks.
pub const API_VERSION: &str = "/v2";

const BASE_URL_VAR: &str = "TODOS_BASE_URL";
const API_VERSION_VAR: &str = "TODOS_API_VERSION";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    MissingVar(&'static str),

    #[error("base url must not be empty")]
    EmptyBaseUrl,
}

/// Where the todos API lives.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    /// Scheme and host, e.g. `http://localhost:3000`.
    pub base_url: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

fn default_api_version() -> String {
    API_VERSION.to_string()
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_version: default_api_version(),
        }
    }

    /// Read `TODOS_BASE_URL` and, optionally, `TODOS_API_VERSION`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url =
            std::env::var(BASE_URL_VAR).map_err(|_| ConfigError::MissingVar(BASE_URL_VAR))?;
        let api_version = std::env::var(API_VERSION_VAR).unwrap_or_else(|_| default_api_version());
        Self {
            base_url,
            api_version,
        }
        .validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }
        Ok(self)
    }

    /// Base URL with the version prefix appended and no trailing slash.
    pub fn api_root(&self) -> String {
        let host = self.base_url.trim_end_matches('/');
        let version = self.api_version.trim_matches('/');
        if version.is_empty() {
            host.to_string()
        } else {
            format!("{host}/{version}")
        }
    }
}
