//! Authentication module for the befree server.
//!
//! This module provides:
//! - The hosted identity client (`SupabaseIdentity`)
//! - The session gate as axum middleware, and the `RequireAuth` extractor
//! - OAuth start, callback, and sign-out routes
//!
//! Sessions are held entirely in browser cookies; the server keeps no
//! session state of its own.

pub mod middleware;
pub mod routes;
pub mod supabase;

pub use middleware::{AuthRejection, AuthenticatedUser, RequireAuth, session_gate};
pub use routes::{auth_code_error, callback, oauth_start, signout};
pub use supabase::{OAuthProvider, SupabaseIdentity};

use axum::http::{HeaderMap, header};
use axum_extra::extract::cookie::{Cookie, SameSite};
use befree_platform_access::{
    AllowList, BackendConfig, CookieToSet, IdentityService, RequestCookies, RouteMatcher,
    RuntimeEnvironment, SessionStorage,
};
use std::sync::Arc;
use time::Duration as TimeDuration;

use crate::db::RestClient;

/// Shared application state.
pub struct AppState {
    /// Identity service used by the gate and the auth routes.
    pub identity: Arc<dyn IdentityService>,
    /// Hosted backend connection settings.
    pub backend: BackendConfig,
    /// HTTP client for backend REST calls.
    pub http: reqwest::Client,
    /// Deployment environment.
    pub environment: RuntimeEnvironment,
    /// Whether cookies get the Secure flag.
    pub secure_cookies: bool,
    /// Paths reachable without a session.
    pub allow_list: AllowList,
    /// Paths the gate runs on.
    pub route_matcher: RouteMatcher,
}

impl AppState {
    /// Creates a new application state with the default gate rules.
    pub fn new(
        identity: Arc<dyn IdentityService>,
        backend: BackendConfig,
        http: reqwest::Client,
        environment: RuntimeEnvironment,
        secure_cookies: bool,
    ) -> Self {
        Self {
            identity,
            backend,
            http,
            environment,
            secure_cookies,
            allow_list: AllowList::default(),
            route_matcher: RouteMatcher::default(),
        }
    }

    /// Cookie storage for the backend's session key.
    pub fn session_storage(&self) -> SessionStorage {
        SessionStorage::new(self.backend.storage_key()).with_secure(self.secure_cookies)
    }

    /// A REST client acting as the holder of `access_token`.
    pub fn rest_client(&self, access_token: &str) -> RestClient {
        RestClient::new(
            self.http.clone(),
            self.backend.clone(),
            access_token.to_string(),
        )
    }
}

/// Collects every `Cookie` header of a request into one cookie set.
pub fn request_cookies(headers: &HeaderMap) -> RequestCookies {
    let joined = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect::<Vec<_>>()
        .join("; ");
    RequestCookies::parse(&joined)
}

/// Converts a cookie written by the identity service into a response cookie.
pub fn response_cookie(cookie: &CookieToSet) -> Cookie<'static> {
    let options = &cookie.options;
    let mut builder = Cookie::build((cookie.name.clone(), cookie.value.clone()))
        .http_only(options.http_only)
        .secure(options.secure);
    if let Some(path) = &options.path {
        builder = builder.path(path.clone());
    }
    if let Some(domain) = &options.domain {
        builder = builder.domain(domain.clone());
    }
    if let Some(max_age) = options.max_age {
        builder = builder.max_age(TimeDuration::seconds(max_age));
    }
    if let Some(same_site) = options.same_site {
        builder = builder.same_site(match same_site {
            befree_platform_access::SameSite::Lax => SameSite::Lax,
            befree_platform_access::SameSite::Strict => SameSite::Strict,
            befree_platform_access::SameSite::None => SameSite::None,
        });
    }
    builder.build()
}
