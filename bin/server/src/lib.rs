//! befree web server.
//!
//! This crate provides the axum HTTP surface of the befree boilerplate:
//! configuration loading, the hosted identity client, the session gate as
//! middleware, the OAuth routes, and the profile/organization actions.

pub mod actions;
pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod types;
pub mod user;
