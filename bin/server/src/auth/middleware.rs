//! The session gate as axum middleware, and authentication extractors.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderValue, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use befree_platform_access::{
    CookieToSet, GateDecision, GateRequest, RequestCookies, User, gate, gate::LOGIN_PATH,
};
use std::sync::Arc;

use super::{AppState, request_cookies, response_cookie};

/// The identity resolved by the gate for the current request.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    /// Access token for backend calls made on the user's behalf.
    pub access_token: Option<String>,
}

/// Gates every request that the route matcher selects.
///
/// Anonymous requests for protected paths are redirected to the login page.
/// Everything else continues with the refreshed cookie state: downstream
/// handlers see the rotated cookies and the browser receives them.
pub async fn session_gate(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if !state.route_matcher.matches(&path) {
        return next.run(request).await;
    }

    let query = request.uri().query().map(str::to_string);
    let cookies = request_cookies(request.headers());
    let decision = gate(
        state.identity.as_ref(),
        &state.allow_list,
        GateRequest::new(path, query, cookies),
    )
    .await;

    match decision {
        GateDecision::Redirect { location } => Redirect::temporary(&location).into_response(),
        GateDecision::Continue { response, identity } => {
            let (cookies, set_cookies) = response.into_parts();
            // Without a rotation the inbound header is passed on byte for byte.
            if !set_cookies.is_empty() {
                rewrite_cookie_header(&mut request, &cookies);
            }

            if let Some(user) = identity {
                let access_token = state
                    .session_storage()
                    .read(&cookies.get_all())
                    .ok()
                    .flatten()
                    .map(|session| session.access_token().to_string());
                request.extensions_mut().insert(AuthenticatedUser { user, access_token });
            }

            let mut response = next.run(request).await;
            append_set_cookies(&mut response, &set_cookies);
            response
        }
    }
}

fn rewrite_cookie_header(request: &mut Request, cookies: &RequestCookies) {
    let headers = request.headers_mut();
    headers.remove(header::COOKIE);
    if cookies.is_empty() {
        return;
    }
    match HeaderValue::from_str(&cookies.header_value()) {
        Ok(value) => {
            headers.insert(header::COOKIE, value);
        }
        Err(e) => tracing::warn!(error = %e, "refreshed cookies are not a valid header value"),
    }
}

/// Appends a `Set-Cookie` header for every cookie in `cookies`.
pub fn append_set_cookies(response: &mut Response, cookies: &[CookieToSet]) {
    for cookie in cookies {
        match HeaderValue::from_str(&response_cookie(cookie).to_string()) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::warn!(cookie = %cookie.name, error = %e, "dropping invalid cookie"),
        }
    }
}

/// Extractor for requiring an authenticated user.
///
/// If the gate resolved no identity, the user is redirected to the login page.
pub struct RequireAuth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .map(RequireAuth)
            .ok_or(AuthRejection::NotAuthenticated)
    }
}

/// Rejection type for authentication extractors.
#[derive(Debug)]
pub enum AuthRejection {
    NotAuthenticated,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::NotAuthenticated => Redirect::to(LOGIN_PATH).into_response(),
        }
    }
}
