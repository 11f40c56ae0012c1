//! API client for the GitHub REST API and the static blog index.
//!
//! Both sources are public and read-only, so requests carry no credentials.

use std::time::Duration;

use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::Config;
use crate::models::{BlogPost, GitHubProfile, GitHubRepo, Language, MetricsSnapshot};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Repositories listed per metrics refresh. GitHub caps `per_page` at 100.
const REPO_PAGE_SIZE: u32 = 100;

/// GitHub rejects requests without a User-Agent.
const USER_AGENT: &str = concat!("foliocache/", env!("CARGO_PKG_VERSION"));

const GITHUB_ACCEPT: &str = "application/vnd.github+json";

/// HTTP client for the portfolio's data sources.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    api_base: String,
    site_origin: String,
    github_user: String,
    blog_feed_en: String,
    blog_feed_it: String,
}

impl ApiClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            api_base: config.github_api_base.trim_end_matches('/').to_string(),
            site_origin: config.site_origin.trim_end_matches('/').to_string(),
            github_user: config.github_user.clone(),
            blog_feed_en: config.blog_feed_path(Language::En).to_string(),
            blog_feed_it: config.blog_feed_path(Language::It).to_string(),
        })
    }

    /// The underlying HTTP client, shared with the service worker's network.
    pub fn http(&self) -> &Client {
        &self.client
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &str, accept: &str) -> Result<T, ApiError> {
        debug!(url = url, "GET");
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, accept)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", url, e)))
    }

    // ===== GitHub =====

    pub async fn fetch_profile(&self) -> Result<GitHubProfile, ApiError> {
        let url = format!("{}/users/{}", self.api_base, self.github_user);
        self.get(&url, GITHUB_ACCEPT).await
    }

    /// Most recently updated public repositories, up to one page.
    pub async fn fetch_repos(&self) -> Result<Vec<GitHubRepo>, ApiError> {
        let url = format!(
            "{}/users/{}/repos?per_page={}&sort=updated",
            self.api_base, self.github_user, REPO_PAGE_SIZE
        );
        self.get(&url, GITHUB_ACCEPT).await
    }

    /// Fetch profile and repository listing concurrently and aggregate them.
    pub async fn fetch_metrics(&self) -> Result<MetricsSnapshot, ApiError> {
        let (profile, repos) =
            futures::future::try_join(self.fetch_profile(), self.fetch_repos()).await?;

        Ok(MetricsSnapshot::from_profile(
            profile.public_repos,
            repos.iter().map(|r| r.stargazers_count),
        ))
    }

    // ===== Blog =====

    pub fn blog_feed_url(&self, lang: Language) -> String {
        let path = match lang {
            Language::En => &self.blog_feed_en,
            Language::It => &self.blog_feed_it,
        };
        format!("{}{}", self.site_origin, path)
    }

    pub async fn fetch_blog_feed(&self, lang: Language) -> Result<Vec<BlogPost>, ApiError> {
        let url = self.blog_feed_url(lang);
        self.get(&url, "application/json").await
    }
}
