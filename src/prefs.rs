//! Theme and blog-language preferences.

use tracing::{debug, warn};

use crate::cache::{CacheError, LocalStore};
use crate::models::{Language, Theme};

pub const THEME_KEY: &str = "theme";
pub const LANGUAGE_KEY: &str = "blog_language_preference";

/// Locale variables consulted for the reported language, highest priority first.
const LOCALE_VARS: [&str; 3] = ["LC_ALL", "LC_MESSAGES", "LANG"];

/// Locale reported by the environment, if any (e.g. `it_IT.UTF-8`).
pub fn system_locale() -> Option<String> {
    LOCALE_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.is_empty() && value != "C" && value != "POSIX")
}

#[derive(Debug, Clone)]
pub struct Preferences {
    store: LocalStore,
}

impl Preferences {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// Saved theme; `dark` when unset or unrecognised.
    pub fn theme(&self) -> Theme {
        match self.store.get(THEME_KEY) {
            Ok(Some(raw)) => raw.parse().unwrap_or_default(),
            Ok(None) => Theme::default(),
            Err(e) => {
                warn!(error = %e, "Failed to read theme preference");
                Theme::default()
            }
        }
    }

    pub fn set_theme(&self, theme: Theme) -> Result<(), CacheError> {
        self.store.set(THEME_KEY, theme.as_str())
    }

    pub fn toggle_theme(&self) -> Result<Theme, CacheError> {
        let next = self.theme().toggled();
        self.set_theme(next)?;
        Ok(next)
    }

    pub fn saved_language(&self) -> Option<Language> {
        match self.store.get(LANGUAGE_KEY) {
            Ok(Some(raw)) => match raw.parse() {
                Ok(lang) => Some(lang),
                Err(_) => {
                    debug!(value = %raw, "Ignoring unrecognised language preference");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read language preference");
                None
            }
        }
    }

    pub fn set_language(&self, lang: Language) -> Result<(), CacheError> {
        self.store.set(LANGUAGE_KEY, lang.code())
    }

    /// Effective blog language: explicit override, then the saved preference,
    /// then the reported locale (`it*` reads as Italian), then English.
    pub fn effective_language(&self, override_lang: Option<Language>, locale: Option<&str>) -> Language {
        override_lang
            .or_else(|| self.saved_language())
            .or_else(|| locale.map(Language::from_locale))
            .unwrap_or_default()
    }
}
