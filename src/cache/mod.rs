//! Local caching module for page data.
//!
//! This module provides `LocalStore`, a persistent key/value store with the
//! semantics of browser local storage (string values, unbounded retention,
//! last write wins), and `CacheEntry`, a payload paired with the time it was
//! stored.
//!
//! Keys written by this crate:
//! - `theme`, `blog_language_preference`
//! - `github_metrics`, `github_metrics_timestamp`
//! - `blog_posts_<lang>_<date>`

pub mod entry;
pub mod store;

pub use entry::CacheEntry;
pub use store::LocalStore;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Malformed cache entry: {key}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cache I/O error for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize cache entry {key}: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CacheError {
    pub fn is_malformed(&self) -> bool {
        matches!(self, CacheError::Malformed { .. })
    }
}
