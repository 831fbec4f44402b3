//! Session material and its cookie encoding.
//!
//! A session is never stored server-side. The whole token set lives in the
//! browser as one cookie, or as numbered chunks of one cookie when the
//! encoded value would exceed what browsers reliably accept:
//!
//! ```text
//! sb-<ref>-auth-token=base64-<urlsafe base64 of JSON>
//! sb-<ref>-auth-token.0=…  sb-<ref>-auth-token.1=…
//! ```

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rootcause::Report;
use serde::{Deserialize, Serialize};

use crate::cookie::{CookieOptions, CookiePair, CookieToSet};
use crate::error::IdentityError;
use crate::user::User;

/// Prefix marking a base64-encoded cookie value.
pub const BASE64_PREFIX: &str = "base64-";

/// Longest value written to a single cookie before chunking.
pub const MAX_CHUNK_SIZE: usize = 3180;

/// Seconds before expiry at which an access token is due for rotation.
pub const EXPIRY_MARGIN_SECONDS: i64 = 90;

/// Tokens issued by the identity service for one signed-in browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    /// Unix timestamp (seconds) at which the access token expires.
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<User>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    /// Creates a session from freshly issued tokens.
    #[must_use]
    pub fn new(access_token: String, refresh_token: String, expires_at: Option<i64>) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_in: None,
            expires_at,
            token_type: default_token_type(),
            user: None,
        }
    }

    /// Attaches the user the tokens belong to.
    #[must_use]
    pub fn with_user(mut self, user: User) -> Self {
        self.user = Some(user);
        self
    }

    /// Fills `expires_at` from `expires_in` when the issuer only sent the latter.
    #[must_use]
    pub fn stamped(mut self, now: DateTime<Utc>) -> Self {
        if self.expires_at.is_none()
            && let Some(expires_in) = self.expires_in
        {
            self.expires_at = Some(now.timestamp().saturating_add(expires_in));
        }
        self
    }

    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    #[must_use]
    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    #[must_use]
    pub fn expires_at(&self) -> Option<i64> {
        self.expires_at
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Returns true when the access token expires within `margin_seconds` of `now`.
    ///
    /// A session without an expiry is treated as expiring so that it gets
    /// refreshed into one that has one.
    #[must_use]
    pub fn is_expiring(&self, now: DateTime<Utc>, margin_seconds: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at.saturating_sub(margin_seconds) <= now.timestamp(),
            None => true,
        }
    }
}

/// Reads and writes sessions under a storage key.
#[derive(Debug, Clone)]
pub struct SessionStorage {
    key: String,
    secure: bool,
}

impl SessionStorage {
    /// Creates storage for the given cookie name.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secure: false,
        }
    }

    /// Sets the `Secure` flag on written cookies.
    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Returns the storage key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the name of the PKCE verifier cookie.
    #[must_use]
    pub fn code_verifier_key(&self) -> String {
        format!("{}-code-verifier", self.key)
    }

    fn options(&self) -> CookieOptions {
        CookieOptions::default().with_secure(self.secure)
    }

    fn is_session_cookie(&self, name: &str) -> bool {
        name == self.key
            || name
                .strip_prefix(&self.key)
                .and_then(|rest| rest.strip_prefix('.'))
                .is_some_and(|index| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()))
    }

    /// Reassembles the raw stored value from unchunked or chunked cookies.
    fn raw_value(&self, cookies: &[CookiePair]) -> Option<String> {
        let lookup = |name: &str| {
            cookies
                .iter()
                .find(|pair| pair.name == name && !pair.value.is_empty())
                .map(|pair| pair.value.clone())
        };

        if let Some(value) = lookup(&self.key) {
            return Some(value);
        }

        let mut joined = String::new();
        for index in 0.. {
            match lookup(&format!("{}.{index}", self.key)) {
                Some(chunk) => joined.push_str(&chunk),
                None => break,
            }
        }
        (!joined.is_empty()).then_some(joined)
    }

    /// Decodes the stored session, if any.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSession` if cookies are present but not decodable.
    pub fn read(&self, cookies: &[CookiePair]) -> Result<Option<Session>, Report<IdentityError>> {
        let Some(raw) = self.raw_value(cookies) else {
            return Ok(None);
        };

        let json = match raw.strip_prefix(BASE64_PREFIX) {
            Some(encoded) => {
                let bytes = URL_SAFE_NO_PAD
                    .decode(encoded.trim_end_matches('='))
                    .map_err(|e| IdentityError::InvalidSession {
                        reason: format!("bad base64: {e}"),
                    })?;
                String::from_utf8(bytes).map_err(|e| IdentityError::InvalidSession {
                    reason: format!("not utf-8: {e}"),
                })?
            }
            None => raw,
        };

        let session = serde_json::from_str(&json).map_err(|e| IdentityError::InvalidSession {
            reason: format!("bad session json: {e}"),
        })?;
        Ok(Some(session))
    }

    /// Encodes a session into the cookies that store it.
    ///
    /// Any session cookie in `existing` that the new encoding does not
    /// overwrite is emitted as a removal so stale chunks never linger.
    #[must_use]
    pub fn write(&self, session: &Session, existing: &[CookiePair]) -> Vec<CookieToSet> {
        // Session serialization cannot fail: all fields are plain data.
        let json = serde_json::to_string(session).unwrap_or_default();
        let encoded = format!("{BASE64_PREFIX}{}", URL_SAFE_NO_PAD.encode(json));

        let mut cookies = Vec::new();
        if encoded.len() <= MAX_CHUNK_SIZE {
            cookies.push(CookieToSet::new(&self.key, encoded, self.options()));
        } else {
            // The encoding is ASCII, so byte chunks are valid strings.
            for (index, chunk) in encoded.as_bytes().chunks(MAX_CHUNK_SIZE).enumerate() {
                cookies.push(CookieToSet::new(
                    format!("{}.{index}", self.key),
                    String::from_utf8_lossy(chunk),
                    self.options(),
                ));
            }
        }

        let stale: Vec<CookieToSet> = existing
            .iter()
            .filter(|pair| self.is_session_cookie(&pair.name))
            .filter(|pair| !cookies.iter().any(|c| c.name == pair.name))
            .map(|pair| self.removal(&pair.name))
            .collect();
        cookies.extend(stale);
        cookies
    }

    /// Removal entries for every session cookie present.
    #[must_use]
    pub fn clear(&self, existing: &[CookiePair]) -> Vec<CookieToSet> {
        existing
            .iter()
            .filter(|pair| self.is_session_cookie(&pair.name))
            .map(|pair| self.removal(&pair.name))
            .collect()
    }

    /// Reads the stored PKCE verifier, if any.
    #[must_use]
    pub fn read_code_verifier(&self, cookies: &[CookiePair]) -> Option<String> {
        let key = self.code_verifier_key();
        cookies
            .iter()
            .find(|pair| pair.name == key && !pair.value.is_empty())
            .map(|pair| pair.value.clone())
    }

    /// Cookie storing a PKCE verifier for the upcoming code exchange.
    #[must_use]
    pub fn write_code_verifier(&self, verifier: &str) -> CookieToSet {
        CookieToSet::new(self.code_verifier_key(), verifier, self.options())
    }

    /// Removal entry for the PKCE verifier cookie.
    #[must_use]
    pub fn clear_code_verifier(&self) -> CookieToSet {
        self.removal(&self.code_verifier_key())
    }

    fn removal(&self, name: &str) -> CookieToSet {
        CookieToSet::new(name, "", CookieOptions::removal().with_secure(self.secure))
    }
}
