//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables. Nested keys use
//! `__` as the separator, e.g. `SUPABASE__URL` or `SESSION__SECURE_COOKIES`.
//!
//! Loading never fails on a missing required value. [`ServerConfig::validate`]
//! checks everything at once so startup reports every problem together.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use befree_platform_access::{BackendConfig, RuntimeEnvironment};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// Length in bytes of the decoded field encryption key.
pub const ENCRYPTION_KEY_LEN: usize = 32;

/// Server configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Deployment environment.
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// Hosted backend connection settings.
    #[serde(default)]
    pub supabase: SupabaseConfig,

    /// Base64-encoded 32-byte key for field encryption.
    #[serde(default)]
    pub encryption_key: Option<String>,

    /// Directory served under `/static`.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    /// Session cookie configuration.
    #[serde(default)]
    pub session: SessionConfig,
}

/// Hosted backend settings as read from the environment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SupabaseConfig {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub service_role_key: Option<String>,
}

/// Session-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Defaults to true; set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_secure_cookies() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secure_cookies: default_secure_cookies(),
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// The environment could not be read or deserialized.
    Load(config::ConfigError),
    /// Required variables are unset or blank.
    Missing { names: Vec<&'static str> },
    /// The encryption key is not base64 for exactly 32 bytes.
    InvalidEncryptionKey { reason: String },
    /// The backend URL or key is unusable.
    InvalidBackend { reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load(e) => write!(f, "failed to load configuration: {e}"),
            Self::Missing { names } => {
                write!(f, "missing required environment variables: {}", names.join(", "))
            }
            Self::InvalidEncryptionKey { reason } => {
                write!(f, "invalid ENCRYPTION_KEY: {reason}")
            }
            Self::InvalidBackend { reason } => write!(f, "invalid SUPABASE__URL: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(e: config::ConfigError) -> Self {
        Self::Load(e)
    }
}

fn is_blank(value: Option<&String>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a present value cannot be deserialized.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_environment(config::Environment::default())
    }

    /// Loads configuration from the given environment source.
    ///
    /// # Errors
    ///
    /// Returns an error if a present value cannot be deserialized.
    pub fn from_environment(environment: config::Environment) -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(environment.separator("__").try_parsing(true))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Checks required values and returns the validated backend settings.
    ///
    /// # Errors
    ///
    /// Returns `Missing` listing every unset required value, then checks
    /// the encryption key and the backend URL.
    pub fn validate(&self) -> Result<BackendConfig, ConfigError> {
        let required = [
            ("SUPABASE__URL", self.supabase.url.as_ref()),
            ("SUPABASE__ANON_KEY", self.supabase.anon_key.as_ref()),
            ("SUPABASE__SERVICE_ROLE_KEY", self.supabase.service_role_key.as_ref()),
            ("ENCRYPTION_KEY", self.encryption_key.as_ref()),
        ];
        let names: Vec<&'static str> = required
            .iter()
            .filter(|(_, value)| is_blank(*value))
            .map(|(name, _)| *name)
            .collect();
        if !names.is_empty() {
            return Err(ConfigError::Missing { names });
        }

        let key = self.encryption_key.as_deref().unwrap_or_default();
        let decoded = STANDARD
            .decode(key.trim())
            .map_err(|e| ConfigError::InvalidEncryptionKey {
                reason: e.to_string(),
            })?;
        if decoded.len() != ENCRYPTION_KEY_LEN {
            return Err(ConfigError::InvalidEncryptionKey {
                reason: format!(
                    "decodes to {} bytes, expected {ENCRYPTION_KEY_LEN}",
                    decoded.len()
                ),
            });
        }

        let backend = BackendConfig::new(
            self.supabase.url.as_deref().unwrap_or_default(),
            self.supabase.anon_key.as_deref().unwrap_or_default(),
        )
        .map_err(|report| ConfigError::InvalidBackend {
            reason: report.to_string(),
        })?;

        tracing::info!(environment = ?self.environment, "environment variables validated");
        Ok(backend)
    }
}
