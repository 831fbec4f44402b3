//! Profile and organization actions exposed under `/api`.
//!
//! Every action runs as the signed-in user against the backend REST layer
//! and answers with the [`ApiResponse`](crate::error::ApiResponse) envelope.

pub mod organization;
pub mod profile;

pub use organization::{create_organization, create_project, list_organizations};
pub use profile::{get_profile, update_profile};

use crate::auth::{AppState, AuthenticatedUser};
use crate::db::RestClient;
use crate::error::ActionError;

/// A REST client for the caller, or `Unauthorized` when the gate resolved
/// an identity without a usable access token.
fn caller_client(state: &AppState, auth: &AuthenticatedUser) -> Result<RestClient, ActionError> {
    auth.access_token
        .as_deref()
        .map(|token| state.rest_client(token))
        .ok_or(ActionError::Unauthorized)
}
