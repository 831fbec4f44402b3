//! Session refresh adapter.
//!
//! Binds an identity service to one request's cookies. Token rotation
//! performed by the service must be visible to two audiences at once: the
//! remainder of this request (through the request cookie set) and the
//! browser's next request (through the outbound response). [`CookieBridge`]
//! keeps both in step so only one authoritative cookie state exists.

use rootcause::Report;

use crate::cookie::{CookieMethods, CookiePair, CookieToSet, RequestCookies};
use crate::error::IdentityError;
use crate::identity::IdentityService;
use crate::session::Session;
use crate::user::User;

/// The outbound "continue with this request" response.
///
/// Carries the request cookies downstream handlers should see and the
/// cookies the browser must store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Passthrough {
    request_cookies: RequestCookies,
    set_cookies: Vec<CookieToSet>,
}

impl Passthrough {
    /// A passthrough mirroring the request unchanged.
    #[must_use]
    pub fn next(request_cookies: &RequestCookies) -> Self {
        Self {
            request_cookies: request_cookies.clone(),
            set_cookies: Vec::new(),
        }
    }

    /// Cookies downstream handlers should observe.
    #[must_use]
    pub fn request_cookies(&self) -> &RequestCookies {
        &self.request_cookies
    }

    /// Cookies to send back to the browser.
    #[must_use]
    pub fn set_cookies(&self) -> &[CookieToSet] {
        &self.set_cookies
    }

    /// Splits into request cookies and response cookies.
    #[must_use]
    pub fn into_parts(self) -> (RequestCookies, Vec<CookieToSet>) {
        (self.request_cookies, self.set_cookies)
    }
}

/// Read/write access to a request's cookies that mirrors writes onto the
/// outbound response.
#[derive(Debug, Clone)]
pub struct CookieBridge {
    request_cookies: RequestCookies,
    response: Passthrough,
}

impl CookieBridge {
    #[must_use]
    pub fn new(request_cookies: RequestCookies) -> Self {
        let response = Passthrough::next(&request_cookies);
        Self {
            request_cookies,
            response,
        }
    }

    #[must_use]
    pub fn response(&self) -> &Passthrough {
        &self.response
    }

    #[must_use]
    pub fn into_response(self) -> Passthrough {
        self.response
    }
}

impl CookieMethods for CookieBridge {
    fn get_all(&self) -> Vec<CookiePair> {
        self.request_cookies.get_all()
    }

    fn set_all(&mut self, cookies: Vec<CookieToSet>) {
        for cookie in &cookies {
            self.request_cookies.set(&cookie.name, &cookie.value);
        }
        // Rebuilding from the updated request drops cookies set by any
        // earlier batch; the latest batch is authoritative.
        self.response = Passthrough::next(&self.request_cookies);
        self.response.set_cookies = cookies;
    }
}

/// An identity service handle bound to one request's cookies, paired with
/// the outbound response built so far.
pub struct MiddlewareClient<'s, S: ?Sized> {
    service: &'s S,
    bridge: CookieBridge,
}

/// Creates the (client, outbound response) pair for a request.
#[must_use]
pub fn create_middleware_client<S>(
    service: &S,
    request_cookies: RequestCookies,
) -> MiddlewareClient<'_, S>
where
    S: IdentityService + ?Sized,
{
    MiddlewareClient {
        service,
        bridge: CookieBridge::new(request_cookies),
    }
}

impl<S> MiddlewareClient<'_, S>
where
    S: IdentityService + ?Sized,
{
    /// Resolves the current identity, applying any rotation to both the
    /// request view and the outbound response.
    ///
    /// # Errors
    ///
    /// Propagates identity service failures unchanged.
    pub async fn get_user(&mut self) -> Result<Option<User>, Report<IdentityError>> {
        self.service.get_user(&mut self.bridge).await
    }

    /// Exchanges an authorization code, persisting the session cookies.
    ///
    /// # Errors
    ///
    /// Propagates identity service failures unchanged.
    pub async fn exchange_code_for_session(
        &mut self,
        code: &str,
    ) -> Result<Session, Report<IdentityError>> {
        self.service
            .exchange_code_for_session(code, &mut self.bridge)
            .await
    }

    /// Ends the session and clears its cookies.
    ///
    /// # Errors
    ///
    /// Propagates identity service failures unchanged.
    pub async fn sign_out(&mut self) -> Result<(), Report<IdentityError>> {
        self.service.sign_out(&mut self.bridge).await
    }

    /// The request cookies as the identity service currently sees them.
    #[must_use]
    pub fn request_cookies(&self) -> Vec<CookiePair> {
        self.bridge.get_all()
    }

    /// The outbound response built so far.
    #[must_use]
    pub fn response(&self) -> &Passthrough {
        self.bridge.response()
    }

    /// Consumes the client, yielding the outbound response.
    #[must_use]
    pub fn into_response(self) -> Passthrough {
        self.bridge.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookie::CookieOptions;
    use crate::testing::FakeIdentity;

    #[test]
    fn fresh_bridge_mirrors_request() {
        let cookies = RequestCookies::parse("a=1; b=2");
        let bridge = CookieBridge::new(cookies.clone());
        assert_eq!(bridge.response().request_cookies(), &cookies);
        assert!(bridge.response().set_cookies().is_empty());
    }

    #[test]
    fn set_all_updates_request_and_response() {
        let mut bridge = CookieBridge::new(RequestCookies::parse("sb-token=old; theme=dark"));
        bridge.set_all(vec![CookieToSet::new(
            "sb-token",
            "X",
            CookieOptions::default().with_secure(true),
        )]);

        assert!(bridge.get_all().contains(&CookiePair::new("sb-token", "X")));
        let response = bridge.response();
        assert_eq!(response.request_cookies().get("sb-token"), Some("X"));
        assert_eq!(response.request_cookies().get("theme"), Some("dark"));
        assert_eq!(response.set_cookies().len(), 1);
        assert_eq!(response.set_cookies()[0].value, "X");
        assert!(response.set_cookies()[0].options.secure);
    }

    #[test]
    fn later_batch_replaces_earlier_response_cookies() {
        let mut bridge = CookieBridge::new(RequestCookies::new());
        bridge.set_all(vec![CookieToSet::new("a", "1", CookieOptions::default())]);
        bridge.set_all(vec![CookieToSet::new("b", "2", CookieOptions::default())]);

        let names: Vec<&str> = bridge
            .response()
            .set_cookies()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["b"]);
        assert_eq!(bridge.response().request_cookies().get("a"), Some("1"));
    }

    #[tokio::test]
    async fn no_rotation_leaves_cookies_untouched() {
        let service = FakeIdentity::signed_in();
        let inbound = RequestCookies::parse("sb-token=abc; theme=dark");
        let mut client = create_middleware_client(&service, inbound.clone());

        let user = client.get_user().await.expect("resolve");
        assert!(user.is_some());

        let response = client.into_response();
        assert_eq!(response.request_cookies(), &inbound);
        assert!(response.set_cookies().is_empty());
    }

    #[tokio::test]
    async fn rotation_is_visible_to_request_and_response() {
        let service = FakeIdentity::signed_in().rotating("sb-token", "X");
        let mut client = create_middleware_client(&service, RequestCookies::parse("sb-token=old"));

        client.get_user().await.expect("resolve");

        assert!(
            client
                .request_cookies()
                .contains(&CookiePair::new("sb-token", "X"))
        );
        let response = client.into_response();
        assert_eq!(response.request_cookies().get("sb-token"), Some("X"));
        assert_eq!(response.set_cookies()[0].name, "sb-token");
        assert_eq!(response.set_cookies()[0].value, "X");
    }
}
