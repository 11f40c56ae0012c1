//! GitHub profile metrics shown on the landing page.

use serde::{Deserialize, Serialize};

/// Commits assumed per public repository when estimating the commit count.
pub const COMMITS_PER_REPO: u64 = 50;

/// Lower bound on the estimated commit count.
pub const MIN_ESTIMATED_COMMITS: u64 = 500;

/// Aggregate profile numbers. Replaced wholesale, never merged field by field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub commits: u64,
    pub repos: u64,
    pub stars: u64,
}

impl Default for MetricsSnapshot {
    /// Shown when the live API cannot be reached. Never persisted.
    fn default() -> Self {
        Self {
            commits: 500,
            repos: 15,
            stars: 50,
        }
    }
}

impl MetricsSnapshot {
    /// Build a snapshot from the public repository count and the star count
    /// of each listed repository.
    ///
    /// The REST API exposes no total commit count, so `commits` is an
    /// estimate: `max(repos * 50, 500)`.
    pub fn from_profile(public_repos: u64, star_counts: impl IntoIterator<Item = u64>) -> Self {
        Self {
            commits: estimate_commits(public_repos),
            repos: public_repos,
            stars: star_counts.into_iter().sum(),
        }
    }
}

pub fn estimate_commits(public_repos: u64) -> u64 {
    public_repos
        .saturating_mul(COMMITS_PER_REPO)
        .max(MIN_ESTIMATED_COMMITS)
}

/// `GET /users/{user}` - only the field we consume.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubProfile {
    pub public_repos: u64,
}

/// One element of `GET /users/{user}/repos`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRepo {
    pub stargazers_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_estimate_has_floor() {
        assert_eq!(estimate_commits(0), 500);
        assert_eq!(estimate_commits(10), 500);
        assert_eq!(estimate_commits(11), 550);
        assert_eq!(estimate_commits(42), 2100);
    }

    #[test]
    fn test_from_profile_sums_stars() {
        let snapshot = MetricsSnapshot::from_profile(20, [3, 0, 12, 5]);
        assert_eq!(snapshot, MetricsSnapshot { commits: 1000, repos: 20, stars: 20 });
    }

    #[test]
    fn test_default_snapshot() {
        let snapshot = MetricsSnapshot::default();
        assert_eq!((snapshot.commits, snapshot.repos, snapshot.stars), (500, 15, 50));
    }

    #[test]
    fn test_parse_repo_listing_ignores_extra_fields() {
        let json = r#"[{"name": "a", "stargazers_count": 4, "fork": false}, {"stargazers_count": 1}]"#;
        let repos: Vec<GitHubRepo> = serde_json::from_str(json).unwrap();
        assert_eq!(repos.iter().map(|r| r.stargazers_count).sum::<u64>(), 5);
    }
}
