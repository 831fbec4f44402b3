//! Error types for the platform-access crate.
//!
//! Errors are returned wrapped in a rootcause `Report`:
//! - `IdentityError`: failures talking to the identity service
//! - `BackendConfigError`: invalid backend connection settings

use std::fmt;

/// Errors from identity service operations.
///
/// None of these cross the request boundary: the gate treats every one of
/// them as "no identity" and the callback endpoint turns them into a
/// redirect to the error page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The identity service could not be reached or answered with a server error.
    Unreachable { reason: String },
    /// Session cookies were present but could not be decoded.
    InvalidSession { reason: String },
    /// A code exchange was attempted without a stored PKCE verifier.
    MissingCodeVerifier,
    /// The identity service rejected the request.
    Rejected { status: u16, message: String },
    /// The identity service answered with a body we could not interpret.
    UnexpectedResponse { reason: String },
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable { reason } => {
                write!(f, "identity service unreachable: {reason}")
            }
            Self::InvalidSession { reason } => {
                write!(f, "invalid session cookie: {reason}")
            }
            Self::MissingCodeVerifier => {
                write!(f, "no PKCE code verifier stored for this browser")
            }
            Self::Rejected { status, message } => {
                write!(f, "identity service rejected request ({status}): {message}")
            }
            Self::UnexpectedResponse { reason } => {
                write!(f, "unexpected identity service response: {reason}")
            }
        }
    }
}

impl std::error::Error for IdentityError {}

/// Errors from validating backend connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfigError {
    /// The backend URL could not be parsed or is not http(s).
    InvalidUrl { url: String, reason: String },
    /// The public (anon) key is empty.
    MissingAnonKey,
}

impl fmt::Display for BackendConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl { url, reason } => {
                write!(f, "invalid backend URL '{url}': {reason}")
            }
            Self::MissingAnonKey => write!(f, "backend anon key is empty"),
        }
    }
}

impl std::error::Error for BackendConfigError {}
