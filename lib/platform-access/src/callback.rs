//! OAuth exchange endpoint logic.
//!
//! The identity provider redirects back with `?code=…&next=…`. The code is
//! exchanged once; success sends the browser on to `next`, anything else to
//! a fixed error page. Nothing is retried.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::adapter::create_middleware_client;
use crate::cookie::{CookieToSet, RequestCookies};
use crate::identity::IdentityService;

/// Destination after a successful exchange when `next` is absent.
pub const DEFAULT_NEXT_PATH: &str = "/dashboard";

/// Page explaining that sign-in could not be completed.
pub const AUTH_CODE_ERROR_PATH: &str = "/auth/auth-code-error";

/// The deployment the server is running in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    Development,
    #[default]
    Production,
    Test,
}

impl RuntimeEnvironment {
    /// Returns true for local development, where the request origin is
    /// trusted for redirects.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Development)
    }
}

/// An inbound callback request.
#[derive(Debug, Clone)]
pub struct CallbackRequest {
    url: Url,
    forwarded_host: Option<String>,
    cookies: RequestCookies,
}

impl CallbackRequest {
    #[must_use]
    pub fn new(url: Url, forwarded_host: Option<String>, cookies: RequestCookies) -> Self {
        Self {
            url,
            forwarded_host: forwarded_host.filter(|host| !host.is_empty()),
            cookies,
        }
    }

    /// The request's own origin, e.g. `http://localhost:3000`.
    #[must_use]
    pub fn origin(&self) -> String {
        self.url.origin().ascii_serialization()
    }

    fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// The authorization code; an empty value counts as absent.
    #[must_use]
    pub fn code(&self) -> Option<String> {
        self.query_param("code").filter(|code| !code.is_empty())
    }

    /// The post-login destination path.
    ///
    /// Only an absent parameter falls back to the default; the value is
    /// otherwise used as given and is not checked against an allow-list.
    #[must_use]
    pub fn next(&self) -> String {
        self.query_param("next")
            .unwrap_or_else(|| DEFAULT_NEXT_PATH.to_string())
    }
}

/// Where to send the browser and which cookies to set on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackOutcome {
    pub location: String,
    pub set_cookies: Vec<CookieToSet>,
}

/// Chooses the origin for the post-login redirect.
///
/// Local development uses the request origin. Elsewhere a forwarded host
/// set by the reverse proxy wins, served over https.
#[must_use]
pub fn redirect_origin(
    request_origin: &str,
    forwarded_host: Option<&str>,
    environment: RuntimeEnvironment,
) -> String {
    if environment.is_local() {
        return request_origin.to_string();
    }
    match forwarded_host {
        Some(host) => format!("https://{host}"),
        None => request_origin.to_string(),
    }
}

/// Runs the code exchange for one callback request.
pub async fn exchange_callback<S>(
    service: &S,
    request: CallbackRequest,
    environment: RuntimeEnvironment,
) -> CallbackOutcome
where
    S: IdentityService + ?Sized,
{
    let origin = request.origin();
    let error_location = format!("{origin}{AUTH_CODE_ERROR_PATH}");

    let Some(code) = request.code() else {
        return CallbackOutcome {
            location: error_location,
            set_cookies: Vec::new(),
        };
    };
    let next = request.next();

    let mut client = create_middleware_client(service, request.cookies.clone());
    let result = client.exchange_code_for_session(&code).await;
    let (_, set_cookies) = client.into_response().into_parts();

    match result {
        Ok(_) => {
            let origin = redirect_origin(&origin, request.forwarded_host.as_deref(), environment);
            CallbackOutcome {
                location: format!("{origin}{next}"),
                set_cookies,
            }
        }
        Err(report) => {
            tracing::error!(error = %report, "OAuth callback error");
            CallbackOutcome {
                location: error_location,
                set_cookies,
            }
        }
    }
}
