//! Render targets of the landing page.
//!
//! `Document` holds the fixed set of elements the loaders write into. A
//! write to an element that is not present is a no-op: the caller gets a
//! `PageError::MissingTarget` it may log, and nothing else happens.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use crate::blog::render_blog_grid;
use crate::config::TagRule;
use crate::models::{BlogPost, Language, MetricsSnapshot, Theme};
use crate::utils::format_thousands;

pub const COMMITS_COUNT: &str = "commits-count";
pub const REPOS_COUNT: &str = "repos-count";
pub const STARS_COUNT: &str = "stars-count";
pub const BLOG_GRID: &str = "blog-grid";
pub const THEME_ICON: &str = "theme-icon";
pub const LANG_ICON: &str = "lang-icon";
pub const LANG_TEXT: &str = "lang-text";

/// Every target of the landing page, in document order.
pub const LANDING_TARGETS: [&str; 7] = [
    THEME_ICON,
    COMMITS_COUNT,
    REPOS_COUNT,
    STARS_COUNT,
    LANG_ICON,
    LANG_TEXT,
    BLOG_GRID,
];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PageError {
    #[error("No element with id '{0}'")]
    MissingTarget(String),
}

#[derive(Debug, Clone, Default)]
pub struct Document {
    elements: BTreeMap<String, String>,
}

impl Document {
    pub fn with_targets<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            elements: ids
                .into_iter()
                .map(|id| (id.to_string(), String::new()))
                .collect(),
        }
    }

    /// The landing page with every target present and empty.
    pub fn landing() -> Self {
        Self::with_targets(LANDING_TARGETS)
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.elements.get(id).map(String::as_str)
    }

    pub fn set(&mut self, id: &str, content: impl Into<String>) -> Result<(), PageError> {
        match self.elements.get_mut(id) {
            Some(slot) => {
                *slot = content.into();
                Ok(())
            }
            None => Err(PageError::MissingTarget(id.to_string())),
        }
    }

    /// `set`, logging and swallowing a missing target.
    fn set_or_skip(&mut self, id: &str, content: impl Into<String>) {
        if let Err(e) = self.set(id, content) {
            debug!(error = %e, "Skipping render");
        }
    }

    pub fn elements(&self) -> impl Iterator<Item = (&str, &str)> {
        self.elements.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    // ===== Sinks =====

    pub fn render_metrics(&mut self, metrics: &MetricsSnapshot) {
        self.set_or_skip(COMMITS_COUNT, format_thousands(metrics.commits));
        self.set_or_skip(REPOS_COUNT, format_thousands(metrics.repos));
        self.set_or_skip(STARS_COUNT, format_thousands(metrics.stars));
    }

    pub fn render_blog(&mut self, posts: &[BlogPost], lang: Language, rules: &[TagRule]) {
        self.set_or_skip(BLOG_GRID, render_blog_grid(posts, lang, rules));
    }

    pub fn render_language_toggle(&mut self, lang: Language) {
        self.set_or_skip(LANG_ICON, lang.flag());
        self.set_or_skip(LANG_TEXT, lang.label());
    }

    pub fn render_theme(&mut self, theme: Theme) {
        self.set_or_skip(THEME_ICON, theme.icon());
    }
}
