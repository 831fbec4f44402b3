//! Repository for user profiles.

use befree_core::UserId;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::{DbError, RestClient, fetch};
use crate::types::ProfileUpdate;

const TABLE: &str = "profiles";

/// A profile row. One exists per user, keyed by the user ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Body of a profile update: the changed fields plus the update timestamp.
#[derive(Debug, Serialize)]
struct ProfilePatch<'a> {
    #[serde(flatten)]
    update: &'a ProfileUpdate,
    updated_at: DateTime<Utc>,
}

/// Repository for profile operations.
pub struct ProfileRepository {
    client: RestClient,
}

impl ProfileRepository {
    /// Creates a new profile repository.
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    /// Fetches the profile of `user_id`.
    pub async fn find(&self, user_id: &UserId) -> Result<Profile, DbError> {
        let request = self
            .client
            .single(Method::GET, TABLE)
            .query(&[("select", "*".to_string()), ("id", format!("eq.{user_id}"))]);
        fetch(request).await
    }

    /// Applies `update` to the profile of `user_id` and returns the new row.
    pub async fn update(
        &self,
        user_id: &UserId,
        update: &ProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<Profile, DbError> {
        let request = self
            .client
            .single(Method::PATCH, TABLE)
            .query(&[("id", format!("eq.{user_id}"))])
            .json(&ProfilePatch {
                update,
                updated_at: now,
            });
        fetch(request).await
    }
}
