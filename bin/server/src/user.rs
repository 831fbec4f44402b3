//! Handlers for the signed-in user's identity.

use axum::Json;

use crate::auth::RequireAuth;
use crate::types::UserInfo;

/// Returns the identity the gate resolved for this request.
pub async fn me(RequireAuth(auth): RequireAuth) -> Json<UserInfo> {
    let user = auth.user;
    Json(UserInfo {
        id: user.id().to_string(),
        email: user.email().map(str::to_string),
        display_name: user.display_name().map(str::to_string),
    })
}
