//! Identity client for the hosted auth API (GoTrue).
//!
//! Tokens never touch server-side storage: the session is read from and
//! written back to cookies through [`CookieMethods`], and the access token
//! is refreshed shortly before it expires.

use async_trait::async_trait;
use befree_platform_access::{
    BackendConfig, CookieMethods, IdentityError, IdentityService, Session, SessionStorage, User,
    session::EXPIRY_MARGIN_SECONDS,
};
use chrono::Utc;
use reqwest::{RequestBuilder, Response, StatusCode};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, instrument, warn};

/// OAuth providers enabled for sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Facebook,
    Twitter,
}

impl OAuthProvider {
    /// Returns the provider name as the auth API expects it.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Facebook => "facebook",
            Self::Twitter => "twitter",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unsupported provider name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownProvider(pub String);

impl fmt::Display for UnknownProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown OAuth provider '{}'", self.0)
    }
}

impl std::error::Error for UnknownProvider {}

impl FromStr for OAuthProvider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(Self::Google),
            "facebook" => Ok(Self::Facebook),
            "twitter" => Ok(Self::Twitter),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// Builds the URL that starts a PKCE sign-in with `provider`.
#[must_use]
pub fn authorize_url(
    backend: &BackendConfig,
    provider: OAuthProvider,
    redirect_to: &str,
    code_challenge: &str,
) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("provider", provider.as_str())
        .append_pair("redirect_to", redirect_to)
        .append_pair("code_challenge", code_challenge)
        .append_pair("code_challenge_method", "s256")
        .finish();
    format!("{}?{query}", backend.auth_endpoint("authorize"))
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct PkceRequest<'a> {
    auth_code: &'a str,
    code_verifier: &'a str,
}

/// Error body shapes the auth API uses.
#[derive(Default, Deserialize)]
struct ApiErrorBody {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

fn error_message(body: &str) -> String {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
    parsed
        .msg
        .or(parsed.message)
        .or(parsed.error_description)
        .or(parsed.error)
        .unwrap_or_else(|| body.trim().to_string())
}

async fn rejection(response: Response) -> IdentityError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    IdentityError::Rejected {
        status,
        message: error_message(&body),
    }
}

fn transport_error(e: reqwest::Error) -> IdentityError {
    IdentityError::Unreachable {
        reason: e.to_string(),
    }
}

fn decode_error(e: reqwest::Error) -> IdentityError {
    IdentityError::UnexpectedResponse {
        reason: e.to_string(),
    }
}

/// Identity service backed by the hosted auth REST API.
#[derive(Debug, Clone)]
pub struct SupabaseIdentity {
    http: reqwest::Client,
    backend: BackendConfig,
    storage: SessionStorage,
}

impl SupabaseIdentity {
    /// Creates a client for `backend`, writing cookies with the given
    /// `Secure` flag.
    #[must_use]
    pub fn new(http: reqwest::Client, backend: BackendConfig, secure_cookies: bool) -> Self {
        let storage = SessionStorage::new(backend.storage_key()).with_secure(secure_cookies);
        Self {
            http,
            backend,
            storage,
        }
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.http
            .post(self.backend.auth_endpoint(path))
            .header("apikey", self.backend.anon_key())
    }

    /// Exchanges a refresh token for a new session.
    ///
    /// `Ok(None)` means the refresh token was rejected and the session is over.
    async fn refresh(&self, refresh_token: &str) -> Result<Option<Session>, Report<IdentityError>> {
        let response = self
            .post("token?grant_type=refresh_token")
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_client_error() {
            debug!(status = status.as_u16(), "refresh token rejected");
            return Ok(None);
        }
        if !status.is_success() {
            let reason = format!("token refresh failed with status {status}");
            return Err(IdentityError::Unreachable { reason }.into());
        }

        let session: Session = response.json().await.map_err(decode_error)?;
        Ok(Some(session.stamped(Utc::now())))
    }

    async fn fetch_user(&self, access_token: &str) -> Result<Option<User>, Report<IdentityError>> {
        let response = self
            .http
            .get(self.backend.auth_endpoint("user"))
            .header("apikey", self.backend.anon_key())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            StatusCode::OK => Ok(Some(response.json().await.map_err(decode_error)?)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            _ => Err(rejection(response).await.into()),
        }
    }
}

#[async_trait]
impl IdentityService for SupabaseIdentity {
    #[instrument(skip_all)]
    async fn get_user(
        &self,
        cookies: &mut dyn CookieMethods,
    ) -> Result<Option<User>, Report<IdentityError>> {
        let existing = cookies.get_all();
        let session = match self.storage.read(&existing) {
            Ok(Some(session)) => session,
            Ok(None) => return Ok(None),
            Err(report) => {
                debug!(error = %report, "discarding undecodable session cookie");
                cookies.set_all(self.storage.clear(&existing));
                return Ok(None);
            }
        };

        let session = if session.is_expiring(Utc::now(), EXPIRY_MARGIN_SECONDS) {
            match self.refresh(session.refresh_token()).await? {
                Some(refreshed) => {
                    debug!("access token refreshed");
                    cookies.set_all(self.storage.write(&refreshed, &existing));
                    refreshed
                }
                None => {
                    cookies.set_all(self.storage.clear(&existing));
                    return Ok(None);
                }
            }
        } else {
            session
        };

        self.fetch_user(session.access_token()).await
    }

    #[instrument(skip_all)]
    async fn exchange_code_for_session(
        &self,
        code: &str,
        cookies: &mut dyn CookieMethods,
    ) -> Result<Session, Report<IdentityError>> {
        let existing = cookies.get_all();
        let Some(code_verifier) = self.storage.read_code_verifier(&existing) else {
            return Err(IdentityError::MissingCodeVerifier.into());
        };

        let result = self
            .post("token?grant_type=pkce")
            .json(&PkceRequest {
                auth_code: code,
                code_verifier: &code_verifier,
            })
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                cookies.set_all(vec![self.storage.clear_code_verifier()]);
                return Err(transport_error(e).into());
            }
        };

        if !response.status().is_success() {
            cookies.set_all(vec![self.storage.clear_code_verifier()]);
            return Err(rejection(response).await.into());
        }

        let session = match response.json::<Session>().await {
            Ok(session) => session.stamped(Utc::now()),
            Err(e) => {
                cookies.set_all(vec![self.storage.clear_code_verifier()]);
                return Err(decode_error(e).into());
            }
        };

        let mut updates = self.storage.write(&session, &existing);
        updates.push(self.storage.clear_code_verifier());
        cookies.set_all(updates);
        Ok(session)
    }

    #[instrument(skip_all)]
    async fn sign_out(&self, cookies: &mut dyn CookieMethods) -> Result<(), Report<IdentityError>> {
        let existing = cookies.get_all();
        if let Ok(Some(session)) = self.storage.read(&existing) {
            let result = self
                .post("logout")
                .bearer_auth(session.access_token())
                .send()
                .await;
            match result {
                Ok(response) if response.status().is_success() => {}
                Ok(response) => {
                    warn!(status = response.status().as_u16(), "remote sign-out rejected");
                }
                Err(e) => warn!(error = %e, "remote sign-out failed"),
            }
        }

        let removals = self.storage.clear(&existing);
        if !removals.is_empty() {
            cookies.set_all(removals);
        }
        Ok(())
    }
}
