//! Application configuration management.
//!
//! This module handles loading and saving the configuration: the GitHub
//! handle whose metrics are shown, the site origin and blog feed paths,
//! the service worker's cache version and precache manifest, and the
//! keyword table used to infer blog tags.
//!
//! Configuration is stored at `~/.config/foliocache/config.json`.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::models::Language;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "foliocache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable that overrides the configured GitHub handle
pub const GITHUB_USER_ENV: &str = "FOLIOCACHE_GITHUB_USER";

/// One row of the tag inference table.
/// The rule matches when every keyword occurs in the lowercased post text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRule {
    pub label: String,
    pub keywords: Vec<String>,
}

impl TagRule {
    pub fn new(label: &str, keywords: &[&str]) -> Self {
        Self {
            label: label.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    pub fn matches(&self, lowercased: &str) -> bool {
        !self.keywords.is_empty() && self.keywords.iter().all(|k| lowercased.contains(k.as_str()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub github_user: String,
    pub github_api_base: String,
    pub site_origin: String,
    pub blog_feed_en: String,
    pub blog_feed_it: String,
    pub cache_version: String,
    pub precache: Vec<String>,
    pub offline_shell: String,
    pub tag_keywords: Vec<TagRule>,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            github_user: "AndreaBozzo".to_string(),
            github_api_base: "https://api.github.com".to_string(),
            site_origin: "https://andreabozzo.github.io".to_string(),
            blog_feed_en: "/AndreaBozzo/blog/en/index.json".to_string(),
            blog_feed_it: "/AndreaBozzo/blog/index.json".to_string(),
            cache_version: "andreabozzo-v1".to_string(),
            precache: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/assets/styles.min.css".to_string(),
                "/assets/main.min.js".to_string(),
                "/assets/og-image.jpg".to_string(),
            ],
            offline_shell: "/index.html".to_string(),
            tag_keywords: vec![
                TagRule::new("Rust", &["rust"]),
                TagRule::new("Data Engineering", &["data", "engineer"]),
                TagRule::new("Streaming", &["streaming"]),
                TagRule::new("Apache Iceberg", &["iceberg"]),
            ],
            request_timeout_secs: 30,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        if let Ok(user) = std::env::var(GITHUB_USER_ENV) {
            if !user.trim().is_empty() {
                config.github_user = user.trim().to_string();
            }
        }
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Host name of the live metrics API; requests to it bypass the worker cache.
    pub fn api_host(&self) -> String {
        url::Url::parse(&self.github_api_base)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "api.github.com".to_string())
    }

    /// Feed path for the given blog language.
    pub fn blog_feed_path(&self, lang: Language) -> &str {
        match lang {
            Language::En => &self.blog_feed_en,
            Language::It => &self.blog_feed_it,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.github_user, "AndreaBozzo");
        assert_eq!(config.cache_version, "andreabozzo-v1");
        assert_eq!(config.precache.len(), 5);
        assert_eq!(config.tag_keywords.len(), 4);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"cache_version": "andreabozzo-v2"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.cache_version, "andreabozzo-v2");
        assert_eq!(config.offline_shell, "/index.html");
    }

    #[test]
    fn test_api_host_and_feed_paths() {
        let config = Config::default();
        assert_eq!(config.api_host(), "api.github.com");
        assert_eq!(config.blog_feed_path(Language::En), "/AndreaBozzo/blog/en/index.json");
        assert_eq!(config.blog_feed_path(Language::It), "/AndreaBozzo/blog/index.json");
    }

    #[test]
    fn test_tag_rule_requires_every_keyword() {
        let rule = TagRule::new("Data Engineering", &["data", "engineer"]);
        assert!(rule.matches("modern data engineering"));
        assert!(!rule.matches("data lakes"));
        assert!(!TagRule::new("Empty", &[]).matches("anything"));
    }
}
