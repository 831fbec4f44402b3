//! Authentication routes for OAuth sign-in, the code callback, and sign-out.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode, Uri, header},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use befree_platform_access::{
    CallbackRequest, CookieToSet, callback::AUTH_CODE_ERROR_PATH, callback::redirect_origin,
    create_middleware_client, exchange_callback, gate::LOGIN_PATH,
};
use oauth2::PkceCodeChallenge;
use std::sync::Arc;
use url::Url;

use super::{
    AppState, request_cookies, response_cookie,
    supabase::{OAuthProvider, UnknownProvider, authorize_url},
};

/// Path the identity provider redirects back to.
pub const CALLBACK_PATH: &str = "/auth/callback";

const FORWARDED_HOST: &str = "x-forwarded-host";

/// The origin the request was addressed to.
fn request_origin(headers: &HeaderMap, uri: &Uri) -> String {
    if let (Some(scheme), Some(authority)) = (uri.scheme_str(), uri.authority()) {
        return format!("{scheme}://{authority}");
    }
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{host}")
}

fn forwarded_host(headers: &HeaderMap) -> Option<String> {
    headers
        .get(FORWARDED_HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn with_cookies(jar: CookieJar, cookies: &[CookieToSet]) -> CookieJar {
    cookies
        .iter()
        .fold(jar, |jar, cookie| jar.add(response_cookie(cookie)))
}

/// Starts an OAuth sign-in by redirecting to the identity provider.
///
/// A fresh PKCE verifier is stored in a cookie for the callback's code
/// exchange.
pub async fn oauth_start(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    uri: Uri,
    jar: CookieJar,
) -> Result<impl IntoResponse, AuthError> {
    let provider: OAuthProvider = provider
        .parse()
        .map_err(|UnknownProvider(provider)| AuthError::UnknownProvider { provider })?;

    let origin = redirect_origin(
        &request_origin(&headers, &uri),
        forwarded_host(&headers).as_deref(),
        state.environment,
    );
    let redirect_to = format!("{origin}{CALLBACK_PATH}");

    let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
    let verifier_cookie = state
        .session_storage()
        .write_code_verifier(verifier.secret());
    let location = authorize_url(&state.backend, provider, &redirect_to, challenge.as_str());

    tracing::debug!(%provider, %redirect_to, "starting OAuth sign-in");
    Ok((jar.add(response_cookie(&verifier_cookie)), Redirect::to(&location)))
}

/// Handles the identity provider's redirect back with an authorization code.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
    jar: CookieJar,
) -> Response {
    let origin = request_origin(&headers, &uri);
    let path_and_query = uri.path_and_query().map_or(CALLBACK_PATH, |pq| pq.as_str());
    let url = match Url::parse(&format!("{origin}{path_and_query}")) {
        Ok(url) => url,
        Err(e) => {
            tracing::error!(error = %e, "OAuth callback error");
            return Redirect::temporary(AUTH_CODE_ERROR_PATH).into_response();
        }
    };

    let request = CallbackRequest::new(url, forwarded_host(&headers), request_cookies(&headers));
    let outcome = exchange_callback(state.identity.as_ref(), request, state.environment).await;

    (
        with_cookies(jar, &outcome.set_cookies),
        Redirect::temporary(&outcome.location),
    )
        .into_response()
}

/// Signs the user out and returns them to the login page.
pub async fn signout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
) -> impl IntoResponse {
    let mut client = create_middleware_client(state.identity.as_ref(), request_cookies(&headers));
    if let Err(report) = client.sign_out().await {
        tracing::warn!(error = %report, "sign-out failed");
    }
    let (_, set_cookies) = client.into_response().into_parts();

    (with_cookies(jar, &set_cookies), Redirect::to(LOGIN_PATH))
}

/// Explains that sign-in could not be completed.
pub async fn auth_code_error() -> impl IntoResponse {
    (
        StatusCode::OK,
        "Sign-in could not be completed. The link may have expired or already been used. \
         Please return to the login page and try again.",
    )
}

/// Authentication errors.
#[derive(Debug)]
pub enum AuthError {
    UnknownProvider { provider: String },
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::UnknownProvider { provider } => {
                tracing::debug!(%provider, "unknown OAuth provider requested");
                (StatusCode::NOT_FOUND, "Unknown sign-in provider").into_response()
            }
        }
    }
}
