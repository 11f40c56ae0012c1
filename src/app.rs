//! Per-session application context.
//!
//! `App` owns everything one page load needs: configuration, the local
//! store, the API client, the two data caches and the render targets. The
//! service worker side is reached through the same context so that both
//! halves share one cache directory.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::blog::{BlogCache, BlogFeed};
use crate::cache::LocalStore;
use crate::config::Config;
use crate::metrics::MetricsCache;
use crate::models::{Language, MetricsSnapshot, Theme};
use crate::page::Document;
use crate::prefs::{system_locale, Preferences};
use crate::worker::{
    should_register, CacheStorage, HttpNetwork, Registration, RegistrationState, ServiceWorker,
    WorkerConfig,
};

/// Local store directory inside the cache directory
const LOCAL_DIR: &str = "local";

/// Service worker bucket directory inside the cache directory
const BUCKETS_DIR: &str = "buckets";

/// Persisted registration state file
const REGISTRATION_FILE: &str = "worker.json";

/// What a full page load produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLoad {
    pub metrics: MetricsSnapshot,
    pub blog: BlogFeed,
}

pub struct App {
    pub config: Config,
    pub document: Document,
    cache_dir: PathBuf,
    store: LocalStore,
    api: ApiClient,
    prefs: Preferences,
    metrics: MetricsCache,
    blog: BlogCache,
}

impl App {
    /// Build a session from the saved configuration and the user's locale.
    pub fn new() -> Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        let cache_dir = config.cache_dir()?;
        debug!(?cache_dir, "Cache directory configured");
        Self::with_config(config, cache_dir, system_locale())
    }

    pub fn with_config(config: Config, cache_dir: PathBuf, locale: Option<String>) -> Result<Self> {
        let store = LocalStore::new(cache_dir.join(LOCAL_DIR))
            .context("Failed to create local store")?;
        let api = ApiClient::new(&config)?;

        Ok(Self {
            document: Document::landing(),
            prefs: Preferences::new(store.clone()),
            metrics: MetricsCache::new(store.clone(), api.clone()),
            blog: BlogCache::new(store.clone(), api.clone(), locale),
            store,
            api,
            config,
            cache_dir,
        })
    }

    pub fn cache_dir(&self) -> &PathBuf {
        &self.cache_dir
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    pub fn local_store(&self) -> &LocalStore {
        &self.store
    }

    pub fn metrics_cache(&self) -> &MetricsCache {
        &self.metrics
    }

    // ===== Page =====

    /// Load metrics and blog posts concurrently and render both.
    pub async fn load_page(&mut self) -> PageLoad {
        self.document.render_theme(self.prefs.theme());

        let (metrics, blog) = tokio::join!(self.metrics.get_metrics(), self.blog.get_posts(None));

        self.document.render_metrics(&metrics);
        self.render_blog(&blog);
        PageLoad { metrics, blog }
    }

    pub async fn load_metrics(&mut self) -> MetricsSnapshot {
        let metrics = self.metrics.get_metrics().await;
        self.document.render_metrics(&metrics);
        metrics
    }

    pub async fn load_blog(&mut self, language: Option<Language>) -> BlogFeed {
        let feed = self.blog.get_posts(language).await;
        self.render_blog(&feed);
        feed
    }

    pub async fn toggle_blog_language(&mut self) -> Result<BlogFeed> {
        let feed = self.blog.toggle_language().await?;
        self.render_blog(&feed);
        Ok(feed)
    }

    pub fn toggle_theme(&mut self) -> Result<Theme> {
        let theme = self.prefs.toggle_theme()?;
        self.document.render_theme(theme);
        Ok(theme)
    }

    fn render_blog(&mut self, feed: &BlogFeed) {
        self.document.render_language_toggle(feed.language);
        self.document
            .render_blog(&feed.posts, feed.language, &self.config.tag_keywords);
    }

    // ===== Service worker =====

    /// False on local development hosts.
    pub fn should_register_worker(&self) -> bool {
        url::Url::parse(&self.config.site_origin)
            .ok()
            .and_then(|u| u.host_str().map(should_register))
            .unwrap_or(false)
    }

    pub fn cache_storage(&self) -> Result<CacheStorage> {
        Ok(CacheStorage::new(self.cache_dir.join(BUCKETS_DIR))?)
    }

    fn registration_path(&self) -> PathBuf {
        self.cache_dir.join(REGISTRATION_FILE)
    }

    /// A fresh worker for the configured version.
    pub fn new_worker(&self) -> Result<ServiceWorker<HttpNetwork>> {
        self.worker(true)
    }

    /// A fresh worker that stays waiting after install until told to skip.
    pub fn new_waiting_worker(&self) -> Result<ServiceWorker<HttpNetwork>> {
        self.worker(false)
    }

    fn worker(&self, skip_waiting: bool) -> Result<ServiceWorker<HttpNetwork>> {
        let mut config = WorkerConfig::from_config(&self.config)?;
        config.skip_waiting_on_install = skip_waiting;
        Ok(ServiceWorker::new(
            config,
            HttpNetwork::new(self.api.http().clone()),
            self.cache_storage()?,
        ))
    }

    /// The registration as left by the previous session.
    pub fn load_registration(&self) -> Result<Registration<HttpNetwork>> {
        let mut registration = Registration::new();
        let state = RegistrationState::load(&self.registration_path())?;
        if let Some(version) = state.active_version {
            let caches = self.cache_storage()?;
            if !caches.has(&version) {
                warn!(version = %version, "Active worker's cache bucket is missing");
            }
            let mut config = WorkerConfig::from_config(&self.config)?;
            config.version = version;
            registration.resume(ServiceWorker::resume(
                config,
                HttpNetwork::new(self.api.http().clone()),
                caches,
            ));
        }
        Ok(registration)
    }

    pub fn save_registration(&self, registration: &Registration<HttpNetwork>) -> Result<()> {
        let state = registration.state();
        info!(active = ?state.active_version, "Saving service worker registration");
        state.save(&self.registration_path())
    }
}
