//! Data models for portfolio content.
//!
//! - `MetricsSnapshot`: aggregate GitHub profile numbers
//! - `BlogPost`: one entry of the static blog index
//! - `Language`, `Theme`: persisted user preferences
//! - GitHub response shapes: `GitHubProfile`, `GitHubRepo`

pub mod blog;
pub mod metrics;
pub mod preference;

pub use blog::BlogPost;
pub use metrics::{GitHubProfile, GitHubRepo, MetricsSnapshot};
pub use preference::{Language, Theme};
