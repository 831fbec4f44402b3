//! The identity service seam.
//!
//! The hosted identity provider is an opaque remote collaborator. Everything
//! in this crate depends only on these three operations and on their cookie
//! side effects.

use async_trait::async_trait;
use rootcause::Report;

use crate::cookie::CookieMethods;
use crate::error::IdentityError;
use crate::session::Session;
use crate::user::User;

/// Operations the session gating flow needs from the identity service.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Resolves the current user from the supplied cookies.
    ///
    /// Implementations rotate tokens through `cookies.set_all` when the
    /// stored access token is due for renewal. `Ok(None)` means anonymous.
    async fn get_user(
        &self,
        cookies: &mut dyn CookieMethods,
    ) -> Result<Option<User>, Report<IdentityError>>;

    /// Exchanges an authorization code for a session, persisting the
    /// resulting tokens through `cookies.set_all`.
    async fn exchange_code_for_session(
        &self,
        code: &str,
        cookies: &mut dyn CookieMethods,
    ) -> Result<Session, Report<IdentityError>>;

    /// Ends the current session and clears its cookies.
    async fn sign_out(&self, cookies: &mut dyn CookieMethods) -> Result<(), Report<IdentityError>>;
}
