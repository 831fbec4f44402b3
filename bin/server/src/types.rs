//! Request and response bodies shared by the API handlers.

use serde::{Deserialize, Serialize};

/// Minimum length of a non-empty full name, after trimming.
pub const MIN_FULL_NAME_LEN: usize = 2;

/// The signed-in user, as returned by `/api/me`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// Fields a user may change on their own profile.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl ProfileUpdate {
    /// Checks field constraints, returning the message to show on failure.
    ///
    /// An empty `full_name` is not checked and is sent as given.
    pub fn validate(&self) -> Result<(), &'static str> {
        match self.full_name.as_deref() {
            Some(name) if !name.is_empty() && name.trim().chars().count() < MIN_FULL_NAME_LEN => {
                Err("Full name must be at least 2 characters.")
            }
            _ => Ok(()),
        }
    }
}

/// Request body for creating an organization.
#[derive(Clone, Debug, Deserialize)]
pub struct CreateOrganization {
    pub name: String,
    pub slug: String,
}

impl CreateOrganization {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() || self.slug.trim().is_empty() {
            return Err("Name and slug are required.");
        }
        Ok(())
    }
}

/// Request body for creating a project.
#[derive(Clone, Debug, Deserialize)]
pub struct CreateProject {
    pub name: String,
}
