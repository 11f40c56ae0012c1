use std::io::Write;
use std::path::PathBuf;

use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use super::CacheError;
use crate::utils::sanitize_name;

/// File-backed key/value store. One file per key, string values.
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new(dir: PathBuf) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(sanitize_name(key))
    }

    fn io_error(key: &str, source: std::io::Error) -> CacheError {
        CacheError::Io {
            key: key.to_string(),
            source,
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let path = self.key_path(key);
        match std::fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_error(key, e)),
        }
    }

    /// Write a value. The write lands via rename so readers never see a torn value.
    pub fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut tmp =
            tempfile::NamedTempFile::new_in(&self.dir).map_err(|e| Self::io_error(key, e))?;
        tmp.write_all(value.as_bytes())
            .map_err(|e| Self::io_error(key, e))?;
        tmp.persist(self.key_path(key))
            .map_err(|e| Self::io_error(key, e.error))?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<(), CacheError> {
        match std::fs::remove_file(self.key_path(key)) {
            Ok(()) => {
                debug!(key = key, "Removed local cache entry");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_error(key, e)),
        }
    }

    /// Read and deserialize a JSON value.
    /// A value that fails to parse is reported as `CacheError::Malformed`.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.get(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| CacheError::Malformed {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    pub fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        let raw = serde_json::to_string(value).map_err(|source| CacheError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.set(key, &raw)
    }

    /// Stored key names (in their on-disk form), sorted.
    pub fn keys(&self) -> Result<Vec<String>, CacheError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| Self::io_error("*", e))?;
        let mut keys: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            // in-flight writes
            .filter(|name| !name.starts_with(".tmp"))
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("local")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_get_set_remove() {
        let (_dir, store) = store();
        assert_eq!(store.get("theme").unwrap(), None);

        store.set("theme", "light").unwrap();
        assert_eq!(store.get("theme").unwrap().as_deref(), Some("light"));

        store.set("theme", "dark").unwrap();
        assert_eq!(store.get("theme").unwrap().as_deref(), Some("dark"));

        store.remove("theme").unwrap();
        assert_eq!(store.get("theme").unwrap(), None);
        // Removing an absent key is fine
        store.remove("theme").unwrap();
    }

    #[test]
    fn test_json_round_trip_and_malformed() {
        let (_dir, store) = store();
        store.set_json("nums", &vec![1, 2, 3]).unwrap();
        assert_eq!(store.get_json::<Vec<i32>>("nums").unwrap(), Some(vec![1, 2, 3]));

        store.set("nums", "{not json").unwrap();
        let err = store.get_json::<Vec<i32>>("nums").unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_keys_with_spaces() {
        let (_dir, store) = store();
        store.set("blog_posts_en_Sun Oct 18 2026", "[]").unwrap();
        store.set("theme", "dark").unwrap();
        assert_eq!(store.get("blog_posts_en_Sun Oct 18 2026").unwrap().as_deref(), Some("[]"));
        assert_eq!(
            store.keys().unwrap(),
            vec!["blog_posts_en_Sun_Oct_18_2026".to_string(), "theme".to_string()]
        );
    }

    #[test]
    fn test_concurrent_sets_to_one_key() {
        let (_dir, store) = store();
        let values = ["a".repeat(1 << 16), "b".to_string()];

        std::thread::scope(|scope| {
            for value in &values {
                let store = &store;
                scope.spawn(move || {
                    for _ in 0..20 {
                        store.set("github_metrics", value).unwrap();
                    }
                });
            }
        });

        let stored = store.get("github_metrics").unwrap().unwrap();
        assert!(values.contains(&stored));
        assert_eq!(store.keys().unwrap(), vec!["github_metrics".to_string()]);
    }
}
