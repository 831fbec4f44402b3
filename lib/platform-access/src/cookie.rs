//! Cookie state shared between the inbound request and the outbound response.
//!
//! The identity service never sees HTTP types. It reads the request's
//! cookies and writes rotated cookies through [`CookieMethods`], and the web
//! layer translates [`CookieToSet`] into `Set-Cookie` headers.

use serde::{Deserialize, Serialize};

/// Max age applied to session cookies: 400 days, the browser upper bound.
pub const DEFAULT_MAX_AGE_SECONDS: i64 = 400 * 24 * 60 * 60;

/// A single `name=value` pair from the request's Cookie header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookiePair {
    pub name: String,
    pub value: String,
}

impl CookiePair {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// The cookie set of an inbound request.
///
/// Insertion order is preserved so that re-serializing the header after a
/// rotation keeps unrelated cookies where the browser put them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestCookies {
    pairs: Vec<CookiePair>,
}

impl RequestCookies {
    /// Creates an empty cookie set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a `Cookie` request header.
    ///
    /// Segments without `=` or with an empty name are skipped; when a name
    /// repeats, the last value wins.
    #[must_use]
    pub fn parse(header: &str) -> Self {
        let mut cookies = Self::new();
        for segment in header.split(';') {
            let Some((name, value)) = segment.split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            cookies.set(name, value.trim());
        }
        cookies
    }

    /// Returns the value of a cookie, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|pair| pair.name == name)
            .map(|pair| pair.value.as_str())
    }

    /// Returns every cookie in request order.
    #[must_use]
    pub fn get_all(&self) -> Vec<CookiePair> {
        self.pairs.clone()
    }

    /// Inserts or replaces a cookie value.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.pairs.iter_mut().find(|pair| pair.name == name) {
            Some(pair) => pair.value = value.to_string(),
            None => self.pairs.push(CookiePair::new(name, value)),
        }
    }

    /// Returns true if no cookies are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Serializes the set back into a `Cookie` header value.
    #[must_use]
    pub fn header_value(&self) -> String {
        self.pairs
            .iter()
            .map(|pair| format!("{}={}", pair.name, pair.value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for RequestCookies {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut cookies = Self::new();
        for (name, value) in iter {
            let name: String = name.into();
            let value: String = value.into();
            cookies.set(&name, &value);
        }
        cookies
    }
}

/// The `SameSite` attribute of a response cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    #[default]
    Lax,
    Strict,
    None,
}

/// Attributes of a response cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieOptions {
    pub path: Option<String>,
    pub domain: Option<String>,
    /// Lifetime in seconds. Zero expires the cookie immediately.
    pub max_age: Option<i64>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: Option<SameSite>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: Some("/".to_string()),
            domain: None,
            max_age: Some(DEFAULT_MAX_AGE_SECONDS),
            http_only: false,
            secure: false,
            same_site: Some(SameSite::Lax),
        }
    }
}

impl CookieOptions {
    /// Options that instruct the browser to drop the cookie.
    #[must_use]
    pub fn removal() -> Self {
        Self {
            max_age: Some(0),
            ..Self::default()
        }
    }

    /// Sets the `Secure` flag.
    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }
}

/// A cookie the identity service wants persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieToSet {
    pub name: String,
    pub value: String,
    pub options: CookieOptions,
}

impl CookieToSet {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>, options: CookieOptions) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            options,
        }
    }

    /// A removal entry for `name`: empty value, zero max age.
    #[must_use]
    pub fn removal(name: impl Into<String>) -> Self {
        Self::new(name, "", CookieOptions::removal())
    }

    /// Returns true if this entry deletes the cookie.
    #[must_use]
    pub fn is_removal(&self) -> bool {
        self.options.max_age == Some(0)
    }
}

/// The read/write pair an identity service uses to access cookie state.
pub trait CookieMethods: Send {
    /// Returns every cookie currently visible to this request.
    fn get_all(&self) -> Vec<CookiePair>;

    /// Persists a batch of rotated cookies.
    fn set_all(&mut self, cookies: Vec<CookieToSet>);
}
