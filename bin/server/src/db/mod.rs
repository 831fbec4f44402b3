//! Data access for the befree platform.
//!
//! All tables live behind the hosted backend's REST layer (PostgREST) and
//! are queried with the caller's access token, so row-level security on
//! the backend decides what each user may read and write.
//!
//! This module provides repositories for:
//! - User profiles
//! - Organizations, their memberships, and projects

pub mod organization;
pub mod profile;

pub use organization::{
    MemberRole, MembershipRole, NewOrganization, NewProject, Organization, OrganizationRepository,
    Project, ProjectRepository,
};
pub use profile::{Profile, ProfileRepository};

use befree_platform_access::BackendConfig;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fmt;

/// PostgREST media type selecting a single JSON object instead of an array.
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// An error reported by the backend for a rejected query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BackendError {
    /// HTTP status of the rejected request.
    #[serde(skip)]
    pub status: u16,
    /// Postgres SQLSTATE or PostgREST error code, e.g. `23505` or `PGRST116`.
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

/// Data access errors.
#[derive(Debug)]
pub enum DbError {
    /// The backend rejected the query.
    Backend(BackendError),
    /// The backend could not be reached.
    Transport { reason: String },
    /// The backend answered with a body that does not match the expected row shape.
    Decode { reason: String },
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(e) => match &e.code {
                Some(code) => {
                    write!(f, "backend error {code} (status {}): {}", e.status, e.message)
                }
                None => write!(f, "backend error (status {}): {}", e.status, e.message),
            },
            Self::Transport { reason } => write!(f, "backend unreachable: {reason}"),
            Self::Decode { reason } => write!(f, "unexpected backend response: {reason}"),
        }
    }
}

impl std::error::Error for DbError {}

impl From<reqwest::Error> for DbError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode {
                reason: e.to_string(),
            }
        } else {
            Self::Transport {
                reason: e.to_string(),
            }
        }
    }
}

/// A REST client scoped to one caller's access token.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    backend: BackendConfig,
    access_token: String,
}

impl RestClient {
    /// Creates a client that acts as the holder of `access_token`.
    #[must_use]
    pub fn new(http: reqwest::Client, backend: BackendConfig, access_token: String) -> Self {
        Self {
            http,
            backend,
            access_token,
        }
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.http
            .request(method, self.backend.rest_endpoint(table))
            .header("apikey", self.backend.anon_key())
            .bearer_auth(&self.access_token)
    }

    /// Starts a query expecting exactly one row back.
    pub(crate) fn single(&self, method: Method, table: &str) -> RequestBuilder {
        self.request(method, table)
            .header(reqwest::header::ACCEPT, SINGLE_OBJECT)
            .header("Prefer", "return=representation")
    }

    /// Starts a query returning a list of rows.
    pub(crate) fn list(&self, table: &str) -> RequestBuilder {
        self.request(Method::GET, table)
    }

    /// Starts a write that returns no body.
    pub(crate) fn write(&self, method: Method, table: &str) -> RequestBuilder {
        self.request(method, table).header("Prefer", "return=minimal")
    }
}

/// Sends a request and decodes a successful JSON body.
pub(crate) async fn fetch<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, DbError> {
    let response = checked(request.send().await?).await?;
    Ok(response.json::<T>().await?)
}

/// Sends a request whose successful body is ignored.
pub(crate) async fn execute(request: RequestBuilder) -> Result<(), DbError> {
    checked(request.send().await?).await?;
    Ok(())
}

async fn checked(response: Response) -> Result<Response, DbError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await?;
    Err(DbError::Backend(parse_backend_error(status, &body)))
}

fn parse_backend_error(status: StatusCode, body: &str) -> BackendError {
    let mut error = serde_json::from_str::<BackendError>(body).unwrap_or_else(|_| BackendError {
        message: body.trim().to_string(),
        ..BackendError::default()
    });
    error.status = status.as_u16();
    error
}
