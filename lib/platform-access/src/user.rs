//! The identity resolved for a request.
//!
//! Users are owned by the hosted identity service. The gate only cares
//! whether one is present; handlers downstream read the profile fields.

use befree_core::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An authenticated user as reported by the identity service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Identity-service user ID.
    id: UserId,
    /// Audience the user's tokens were issued for.
    #[serde(default)]
    aud: Option<String>,
    /// Database role the user's tokens carry (e.g. "authenticated").
    #[serde(default)]
    role: Option<String>,
    /// User's email address, if one is registered.
    #[serde(default)]
    email: Option<String>,
    /// When the user signed up.
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    /// When the user last signed in.
    #[serde(default)]
    last_sign_in_at: Option<DateTime<Utc>>,
    /// Free-form profile data supplied at sign-up or by an OAuth provider.
    #[serde(default)]
    user_metadata: serde_json::Value,
}

impl User {
    /// Creates a user with only an ID and optional email.
    #[must_use]
    pub fn new(id: UserId, email: Option<String>) -> Self {
        Self {
            id,
            aud: None,
            role: None,
            email,
            created_at: None,
            last_sign_in_at: None,
            user_metadata: serde_json::Value::Null,
        }
    }

    /// Sets the user metadata.
    #[must_use]
    pub fn with_metadata(mut self, user_metadata: serde_json::Value) -> Self {
        self.user_metadata = user_metadata;
        self
    }

    /// Returns the user's ID.
    #[must_use]
    pub fn id(&self) -> &UserId {
        &self.id
    }

    /// Returns the token audience, if reported.
    #[must_use]
    pub fn aud(&self) -> Option<&str> {
        self.aud.as_deref()
    }

    /// Returns the database role, if reported.
    #[must_use]
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    /// Returns the user's email address, if available.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    #[must_use]
    pub fn last_sign_in_at(&self) -> Option<DateTime<Utc>> {
        self.last_sign_in_at
    }

    /// Returns the raw user metadata.
    #[must_use]
    pub fn user_metadata(&self) -> &serde_json::Value {
        &self.user_metadata
    }

    /// Returns a display name from `full_name` or `name` metadata.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        ["full_name", "name"]
            .iter()
            .find_map(|key| self.user_metadata.get(key).and_then(|v| v.as_str()))
            .filter(|name| !name.trim().is_empty())
    }
}
