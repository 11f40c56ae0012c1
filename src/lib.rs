//! foliocache - the caching core of a static portfolio site.
//!
//! Two layers keep the landing page useful offline:
//!
//! - a service-worker style asset cache (`worker`): versioned buckets,
//!   network-first fetches with cache fallback, stale-version cleanup
//! - local data caches for the page's remote feeds: GitHub metrics behind a
//!   rolling 24-hour window (`metrics`) and blog teasers partitioned by
//!   language and calendar day (`blog`)
//!
//! `App` ties both to one cache directory for a session.

pub mod api;
pub mod app;
pub mod blog;
pub mod cache;
pub mod config;
pub mod metrics;
pub mod models;
pub mod page;
pub mod prefs;
pub mod utils;
pub mod worker;

pub use app::{App, PageLoad};
pub use config::Config;
