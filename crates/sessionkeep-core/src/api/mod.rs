//! REST API client module.
//!
//! This module provides the `ApiClient` for the identity service
//! (`/register`, `/login`) and for authorized calls that carry the
//! current session's bearer token.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
