//! REST client module for the portfolio's remote data sources.
//!
//! This module provides the `ApiClient` for the two read-only feeds the
//! landing page consumes:
//!
//! - GitHub profile and repository listing (metrics)
//! - the static JSON blog index, one path per language

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
