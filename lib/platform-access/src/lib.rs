//! Session gating and cookie-based session refresh for befree.
//!
//! This crate provides:
//! - The identity service seam (`IdentityService`) and its error type
//! - The cookie model shared with the browser (`RequestCookies`, `CookieToSet`)
//! - Session cookie encoding, chunking, and PKCE verifier storage (`SessionStorage`)
//! - The session refresh adapter (`create_middleware_client`)
//! - The per-request gate and the OAuth callback logic
//!
//! # Example
//!
//! ```
//! use befree_platform_access::{AllowList, RequestCookies, RouteMatcher, gate::login_location};
//!
//! let matcher = RouteMatcher::default();
//! assert!(matcher.matches("/dashboard"));
//! assert!(!matcher.matches("/static/app.css"));
//!
//! let allow = AllowList::default();
//! assert!(allow.is_allowed("/auth/callback"));
//! assert!(!allow.is_allowed("/dashboard"));
//!
//! let cookies = RequestCookies::parse("theme=dark; sb-abc-auth-token=base64-e30");
//! assert_eq!(cookies.get("theme"), Some("dark"));
//! assert_eq!(login_location(Some("next=%2Fprojects")), "/login?next=%2Fprojects");
//! ```

pub mod adapter;
pub mod backend;
pub mod callback;
pub mod cookie;
pub mod error;
pub mod gate;
pub mod identity;
pub mod session;
pub mod user;

#[cfg(test)]
mod testing;

// Re-export main types at crate root
pub use adapter::{CookieBridge, MiddlewareClient, Passthrough, create_middleware_client};
pub use backend::BackendConfig;
pub use callback::{CallbackOutcome, CallbackRequest, RuntimeEnvironment, exchange_callback};
pub use cookie::{CookieMethods, CookieOptions, CookiePair, CookieToSet, RequestCookies, SameSite};
pub use error::{BackendConfigError, IdentityError};
pub use gate::{AllowList, GateDecision, GateRequest, RouteMatcher, gate};
pub use identity::IdentityService;
pub use session::{Session, SessionStorage};
pub use user::User;
