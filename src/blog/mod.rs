//! Bilingual blog teaser loader.
//!
//! Posts are cached per language and per calendar day: the key embeds the
//! local date, so yesterday's entry is simply never looked up again. On any
//! failure the loader yields an empty feed, which renders as the
//! language-appropriate empty state. Failures are never persisted.

pub mod render;

use chrono::{Local, NaiveDate};
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::cache::{CacheError, LocalStore};
use crate::models::{BlogPost, Language};
use crate::prefs::Preferences;

pub use render::{format_blog_date, render_blog_grid, resolve_tags};

/// Result of one blog load: the language it resolved to and the posts, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlogFeed {
    pub language: Language,
    pub posts: Vec<BlogPost>,
}

/// Cache key for a language and calendar day, e.g. `blog_posts_en_Sun Oct 18 2026`.
pub fn cache_key(lang: Language, day: NaiveDate) -> String {
    format!("blog_posts_{}_{}", lang.code(), day.format("%a %b %d %Y"))
}

pub struct BlogCache {
    store: LocalStore,
    api: ApiClient,
    prefs: Preferences,
    locale: Option<String>,
}

impl BlogCache {
    pub fn new(store: LocalStore, api: ApiClient, locale: Option<String>) -> Self {
        Self {
            prefs: Preferences::new(store.clone()),
            store,
            api,
            locale,
        }
    }

    pub fn language(&self, override_lang: Option<Language>) -> Language {
        self.prefs
            .effective_language(override_lang, self.locale.as_deref())
    }

    pub async fn get_posts(&self, override_lang: Option<Language>) -> BlogFeed {
        self.get_posts_on(override_lang, Local::now().date_naive()).await
    }

    /// Load posts as of `today`. Never fails; failures yield no posts.
    pub async fn get_posts_on(&self, override_lang: Option<Language>, today: NaiveDate) -> BlogFeed {
        let language = self.language(override_lang);
        let key = cache_key(language, today);

        match self.store.get_json::<Vec<BlogPost>>(&key) {
            Ok(Some(posts)) => {
                debug!(key = %key, count = posts.len(), "Serving cached blog posts");
                return BlogFeed { language, posts };
            }
            Ok(None) => {}
            Err(e @ CacheError::Malformed { .. }) => {
                warn!(error = %e, "Failed to parse cached blog posts");
                if let Err(e) = self.store.remove(&key) {
                    warn!(key = %key, error = %e, "Failed to remove corrupt blog cache entry");
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to read cached blog posts");
            }
        }

        match self.api.fetch_blog_feed(language).await {
            Ok(posts) => {
                if let Err(e) = self.store.set_json(&key, &posts) {
                    warn!(key = %key, error = %e, "Failed to cache blog posts");
                }
                BlogFeed { language, posts }
            }
            Err(e) => {
                warn!(lang = %language, error = %e, "Failed to load blog posts");
                BlogFeed {
                    language,
                    posts: Vec::new(),
                }
            }
        }
    }

    /// Flip the effective language, persist it, and reload posts in it.
    pub async fn toggle_language(&self) -> Result<BlogFeed, CacheError> {
        let next = self.language(None).toggled();
        self.prefs.set_language(next)?;
        Ok(self.get_posts(Some(next)).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const EN_FEED: &str = r#"[
        {"title": "Streaming with Rust", "summary": "S1", "permalink": "/en/one/", "date": "2025-05-01"},
        {"title": "Iceberg tables", "summary": "S2", "permalink": "/en/two/"}
    ]"#;

    struct Fixture {
        _dir: tempfile::TempDir,
        store: LocalStore,
        blog: BlogCache,
    }

    fn fixture(server: &MockServer, locale: Option<&str>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().to_path_buf()).unwrap();
        let config = Config {
            site_origin: server.uri(),
            ..Config::default()
        };
        let api = ApiClient::new(&config).unwrap();
        let blog = BlogCache::new(store.clone(), api, locale.map(String::from));
        Fixture { _dir: dir, store, blog }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_cache_key_format() {
        assert_eq!(cache_key(Language::En, day(2026, 10, 18)), "blog_posts_en_Sun Oct 18 2026");
        assert_eq!(cache_key(Language::It, day(2025, 3, 7)), "blog_posts_it_Fri Mar 07 2025");
    }

    #[tokio::test]
    async fn test_same_day_is_served_from_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/AndreaBozzo/blog/en/index.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(EN_FEED))
            .expect(1)
            .mount(&server)
            .await;
        let f = fixture(&server, None);

        let today = day(2026, 10, 18);
        let first = f.blog.get_posts_on(None, today).await;
        let second = f.blog.get_posts_on(None, today).await;

        assert_eq!(first.language, Language::En);
        assert_eq!(first.posts.len(), 2);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_next_day_does_not_reuse_entry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/AndreaBozzo/blog/en/index.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(EN_FEED))
            .expect(2)
            .mount(&server)
            .await;
        let f = fixture(&server, None);

        f.blog.get_posts_on(None, day(2026, 10, 18)).await;
        f.blog.get_posts_on(None, day(2026, 10, 19)).await;

        assert!(f.store.get(&cache_key(Language::En, day(2026, 10, 18))).unwrap().is_some());
        assert!(f.store.get(&cache_key(Language::En, day(2026, 10, 19))).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_locale_selects_italian_feed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/AndreaBozzo/blog/index.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"title": "Ciao", "summary": "s", "permalink": "/it/"}]"#,
            ))
            .expect(1)
            .mount(&server)
            .await;
        let f = fixture(&server, Some("it_IT.UTF-8"));

        let feed = f.blog.get_posts_on(None, day(2026, 1, 1)).await;
        assert_eq!(feed.language, Language::It);
        assert_eq!(feed.posts[0].title, "Ciao");
    }

    #[tokio::test]
    async fn test_bad_status_yields_empty_and_persists_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let f = fixture(&server, None);

        let today = day(2026, 10, 18);
        let feed = f.blog.get_posts_on(None, today).await;
        assert!(feed.posts.is_empty());
        assert_eq!(f.store.get(&cache_key(Language::En, today)).unwrap(), None);
    }

    #[tokio::test]
    async fn test_malformed_feed_yields_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&server)
            .await;
        let f = fixture(&server, None);

        let today = day(2026, 10, 18);
        assert!(f.blog.get_posts_on(None, today).await.posts.is_empty());
        assert_eq!(f.store.get(&cache_key(Language::En, today)).unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_replaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/AndreaBozzo/blog/en/index.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(EN_FEED))
            .expect(1)
            .mount(&server)
            .await;
        let f = fixture(&server, None);

        let today = day(2026, 10, 18);
        let key = cache_key(Language::En, today);
        f.store.set(&key, "[{broken").unwrap();

        let feed = f.blog.get_posts_on(None, today).await;
        assert_eq!(feed.posts.len(), 2);
        assert_eq!(f.store.get_json::<Vec<BlogPost>>(&key).unwrap(), Some(feed.posts));
    }

    #[tokio::test]
    async fn test_toggle_language_persists_and_reloads() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/AndreaBozzo/blog/index.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(1)
            .mount(&server)
            .await;
        let f = fixture(&server, Some("en_US.UTF-8"));

        let feed = f.blog.toggle_language().await.unwrap();
        assert_eq!(feed.language, Language::It);
        assert!(feed.posts.is_empty());
        assert_eq!(f.blog.language(None), Language::It);
    }
}
