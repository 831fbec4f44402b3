//! Profile actions.

use axum::{Json, extract::State};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

use super::caller_client;
use crate::auth::{AppState, AuthenticatedUser, RequireAuth};
use crate::db::{Profile, ProfileRepository};
use crate::error::{ActionError, ApiResponse, with_error_handling};
use crate::types::ProfileUpdate;

/// Fetches the caller's profile.
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    RequireAuth(auth): RequireAuth,
) -> ApiResponse<Profile> {
    with_error_handling("getMyProfile", json!({}), my_profile(&state, &auth)).await
}

/// Updates the caller's profile.
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    RequireAuth(auth): RequireAuth,
    Json(update): Json<ProfileUpdate>,
) -> ApiResponse<Profile> {
    let context = json!({ "updates": &update });
    with_error_handling(
        "updateMyProfile",
        context,
        update_my_profile(&state, &auth, &update),
    )
    .await
}

async fn my_profile(state: &AppState, auth: &AuthenticatedUser) -> Result<Profile, ActionError> {
    let repo = ProfileRepository::new(caller_client(state, auth)?);
    Ok(repo.find(auth.user.id()).await?)
}

async fn update_my_profile(
    state: &AppState,
    auth: &AuthenticatedUser,
    update: &ProfileUpdate,
) -> Result<Profile, ActionError> {
    let client = caller_client(state, auth)?;
    update.validate().map_err(ActionError::validation)?;

    let repo = ProfileRepository::new(client);
    Ok(repo.update(auth.user.id(), update, Utc::now()).await?)
}
