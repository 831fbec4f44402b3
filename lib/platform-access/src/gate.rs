//! The per-request gate.
//!
//! Every request that reaches the gate resolves its identity exactly once
//! and is then either passed through (carrying any rotated cookies) or
//! redirected to the login entry point.

use crate::adapter::{Passthrough, create_middleware_client};
use crate::cookie::RequestCookies;
use crate::identity::IdentityService;
use crate::user::User;

/// Path unauthenticated requests are sent to.
pub const LOGIN_PATH: &str = "/login";

/// Paths reachable without an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    prefixes: Vec<String>,
    exact: Vec<String>,
}

impl Default for AllowList {
    fn default() -> Self {
        Self {
            prefixes: ["/login", "/signup", "/forgot-password", "/auth"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            exact: vec!["/".to_string()],
        }
    }
}

impl AllowList {
    /// Creates an allow-list from explicit prefixes and exact paths.
    #[must_use]
    pub fn new(prefixes: Vec<String>, exact: Vec<String>) -> Self {
        Self { prefixes, exact }
    }

    /// Returns true if `path` bypasses the identity requirement.
    ///
    /// Prefixes match as plain string prefixes, so `/authors` is allowed
    /// because it starts with `/auth`.
    #[must_use]
    pub fn is_allowed(&self, path: &str) -> bool {
        self.exact.iter().any(|exact| exact == path)
            || self.prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }
}

/// Decides which paths run through the gate at all.
///
/// Static assets and image optimization never reach the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatcher {
    excluded_prefixes: Vec<String>,
    excluded_extensions: Vec<String>,
}

impl Default for RouteMatcher {
    fn default() -> Self {
        Self {
            excluded_prefixes: ["/static/", "/image/", "/favicon.ico"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            excluded_extensions: ["svg", "png", "jpg", "jpeg", "gif", "webp"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

impl RouteMatcher {
    /// Returns true if requests for `path` must pass through the gate.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        if self
            .excluded_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
        {
            return false;
        }

        let last_segment = path.rsplit('/').next().unwrap_or(path);
        let has_excluded_extension = last_segment
            .rsplit_once('.')
            .is_some_and(|(_, ext)| self.excluded_extensions.iter().any(|e| e == ext));
        !has_excluded_extension
    }
}

/// An inbound request as the gate sees it.
#[derive(Debug, Clone)]
pub struct GateRequest {
    path: String,
    query: Option<String>,
    cookies: RequestCookies,
}

impl GateRequest {
    #[must_use]
    pub fn new(path: impl Into<String>, query: Option<String>, cookies: RequestCookies) -> Self {
        Self {
            path: path.into(),
            query: query.filter(|q| !q.is_empty()),
            cookies,
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// The login location for this request.
    #[must_use]
    pub fn login_location(&self) -> String {
        login_location(self.query())
    }
}

/// The login path with the original query string kept.
#[must_use]
pub fn login_location(query: Option<&str>) -> String {
    match query.filter(|q| !q.is_empty()) {
        Some(query) => format!("{LOGIN_PATH}?{query}"),
        None => LOGIN_PATH.to_string(),
    }
}

/// The outcome of gating one request.
#[derive(Debug, Clone)]
pub enum GateDecision {
    /// Let the request proceed with the (possibly refreshed) cookie state.
    Continue {
        response: Passthrough,
        identity: Option<User>,
    },
    /// Send the browser to the login entry point.
    ///
    /// Cookies rotated during identity resolution are not attached.
    Redirect { location: String },
}

impl GateDecision {
    #[must_use]
    pub fn is_redirect(&self) -> bool {
        matches!(self, Self::Redirect { .. })
    }
}

/// Gates one request.
///
/// Identity resolution is the first and only identity service call made
/// between building the client and deciding. A failed resolution counts as
/// anonymous.
pub async fn gate<S>(service: &S, allow_list: &AllowList, request: GateRequest) -> GateDecision
where
    S: IdentityService + ?Sized,
{
    let GateRequest {
        path,
        query,
        cookies,
    } = request;
    let mut client = create_middleware_client(service, cookies);

    let identity = match client.get_user().await {
        Ok(user) => user,
        Err(report) => {
            tracing::warn!(
                error = %report,
                path = %path,
                "identity resolution failed, treating request as anonymous"
            );
            None
        }
    };

    if identity.is_none() && !allow_list.is_allowed(&path) {
        let location = login_location(query.as_deref());
        tracing::debug!(
            path = %path,
            location = %location,
            "redirecting anonymous request to login"
        );
        return GateDecision::Redirect { location };
    }

    GateDecision::Continue {
        response: client.into_response(),
        identity,
    }
}
