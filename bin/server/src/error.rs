//! Domain error types for server actions.
//!
//! Action errors carry full technical detail for the log and convert to a
//! user-safe [`ApiResponse`] at the request boundary.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt;
use std::future::Future;

use crate::db::DbError;

/// Fallback message when nothing more specific can be shown.
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred. Please try again.";

/// Errors raised by profile and organization actions.
#[derive(Debug)]
pub enum ActionError {
    /// No usable session for the backend call.
    Unauthorized,
    /// Input rejected before reaching the backend.
    Validation { message: String },
    /// The data layer failed.
    Db(DbError),
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "Unauthorized"),
            Self::Validation { message } => write!(f, "validation failed: {message}"),
            Self::Db(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ActionError {}

impl From<DbError> for ActionError {
    fn from(e: DbError) -> Self {
        Self::Db(e)
    }
}

impl ActionError {
    /// Creates a validation error with a user-facing message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// The backend error code, when the backend reported one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Db(DbError::Backend(e)) => e.code.as_deref(),
            _ => None,
        }
    }

    /// HTTP status for the failure envelope.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Db(DbError::Backend(e)) => StatusCode::from_u16(e.status)
                .ok()
                .filter(StatusCode::is_client_error)
                .unwrap_or(StatusCode::BAD_GATEWAY),
            Self::Db(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// The message safe to show the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthorized => "Unauthorized".to_string(),
            Self::Validation { message } => message.clone(),
            Self::Db(DbError::Backend(e)) => match e.code.as_deref() {
                Some("23505") => "This record already exists.".to_string(),
                Some("23503") => "The referenced information could not be found.".to_string(),
                Some("42501") => "You do not have permission to perform this action.".to_string(),
                Some("PGRST116") => "The requested record was not found.".to_string(),
                Some("23502") => "Required field is missing.".to_string(),
                _ if !e.message.trim().is_empty() => e.message.clone(),
                _ => GENERIC_ERROR_MESSAGE.to_string(),
            },
            Self::Db(_) => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }
}

/// Standard API response envelope.
#[derive(Debug)]
pub enum ApiResponse<T> {
    Success(T),
    Failure {
        status: StatusCode,
        error: String,
        code: Option<String>,
    },
}

#[derive(Serialize)]
struct SuccessBody<'a, T> {
    success: bool,
    data: &'a T,
}

#[derive(Serialize)]
struct FailureBody<'a> {
    success: bool,
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a str>,
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        match &self {
            Self::Success(data) => Json(SuccessBody {
                success: true,
                data,
            })
            .into_response(),
            Self::Failure {
                status,
                error,
                code,
            } => (
                *status,
                Json(FailureBody {
                    success: false,
                    error,
                    code: code.as_deref(),
                }),
            )
                .into_response(),
        }
    }
}

/// Runs an action, logging failures in full and converting them to the
/// user-safe envelope.
pub async fn with_error_handling<T, F>(
    action: &'static str,
    context: serde_json::Value,
    operation: F,
) -> ApiResponse<T>
where
    F: Future<Output = Result<T, ActionError>>,
{
    match operation.await {
        Ok(data) => ApiResponse::Success(data),
        Err(error) => {
            log_action_error(action, &context, &error);
            ApiResponse::Failure {
                status: error.status(),
                error: error.user_message(),
                code: error.code().map(str::to_string),
            }
        }
    }
}

fn log_action_error(action: &str, context: &serde_json::Value, error: &ActionError) {
    match error {
        ActionError::Db(DbError::Backend(e)) => tracing::error!(
            action,
            context = %context,
            status = e.status,
            code = ?e.code,
            message = %e.message,
            details = ?e.details,
            hint = ?e.hint,
            "backend error in action"
        ),
        other => tracing::error!(action, context = %context, error = %other, "action failed"),
    }
}
