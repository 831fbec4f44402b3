//! Core domain types and utilities for the befree platform.
//!
//! This crate provides the foundational types and error handling shared by
//! the session gating library and the web server.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{OrganizationId, ParseIdError, ProjectId, UserId};
