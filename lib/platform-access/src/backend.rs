//! Connection settings for the hosted authentication/database backend.

use befree_core::Result;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::BackendConfigError;

/// Configuration for the hosted backend.
///
/// The URL is the project base URL (e.g. "https://abcd1234.supabase.co");
/// the anon key is the public API key sent with every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    url: String,
    anon_key: String,
}

impl BackendConfig {
    /// Creates a validated backend configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not an absolute http(s) URL with a
    /// host, or if the anon key is empty.
    pub fn new(url: &str, anon_key: &str) -> Result<Self, BackendConfigError> {
        let parsed = Url::parse(url).map_err(|e| BackendConfigError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(BackendConfigError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            }
            .into());
        }

        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(BackendConfigError::InvalidUrl {
                url: url.to_string(),
                reason: "missing host".to_string(),
            }
            .into());
        }

        if anon_key.trim().is_empty() {
            return Err(BackendConfigError::MissingAnonKey.into());
        }

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        })
    }

    /// Returns the backend base URL without a trailing slash.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the public API key.
    #[must_use]
    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    /// Returns the project reference: the first DNS label of the host.
    #[must_use]
    pub fn project_ref(&self) -> String {
        Url::parse(&self.url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .and_then(|host| host.split('.').next().map(str::to_string))
            .unwrap_or_default()
    }

    /// Returns the cookie name the session is stored under.
    #[must_use]
    pub fn storage_key(&self) -> String {
        format!("sb-{}-auth-token", self.project_ref())
    }

    /// Returns the URL of an auth API endpoint.
    #[must_use]
    pub fn auth_endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.url, path.trim_start_matches('/'))
    }

    /// Returns the URL of a REST table endpoint.
    #[must_use]
    pub fn rest_endpoint(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.url, table.trim_start_matches('/'))
    }
}
