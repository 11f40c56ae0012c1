//! On-disk cache buckets.
//!
//! Layout: `<root>/<bucket>/<sha256(url)>.json` holds the status line, the
//! headers and the name of the body file, `<sha256(url)>.<random>.body` the
//! raw body. Every body gets a fresh file name and the metadata is renamed
//! into place last, so a reader sees either the previous entry or the
//! complete new one, and concurrent puts to the same URL never share a
//! temporary file.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::{HttpResponse, WorkerError};
use crate::utils::sanitize_name;

#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    url: String,
    status: u16,
    headers: Vec<(String, String)>,
    /// Body file name inside the bucket directory
    body: String,
}

fn storage_error(path: &Path, source: std::io::Error) -> WorkerError {
    WorkerError::Storage {
        path: path.display().to_string(),
        source,
    }
}

fn write_atomic(dir: &Path, path: &Path, contents: &[u8]) -> Result<(), WorkerError> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| storage_error(dir, e))?;
    tmp.write_all(contents).map_err(|e| storage_error(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| storage_error(path, e.error))?;
    Ok(())
}

/// All buckets under one root directory.
#[derive(Debug, Clone)]
pub struct CacheStorage {
    root: PathBuf,
}

impl CacheStorage {
    pub fn new(root: PathBuf) -> Result<Self, WorkerError> {
        std::fs::create_dir_all(&root).map_err(|e| storage_error(&root, e))?;
        Ok(Self { root })
    }

    /// Handle to a bucket without creating it.
    pub fn bucket(&self, name: &str) -> Bucket {
        Bucket {
            name: name.to_string(),
            dir: self.root.join(sanitize_name(name)),
        }
    }

    /// Handle to a bucket, creating it if needed.
    pub fn open(&self, name: &str) -> Result<Bucket, WorkerError> {
        let bucket = self.bucket(name);
        std::fs::create_dir_all(&bucket.dir).map_err(|e| storage_error(&bucket.dir, e))?;
        Ok(bucket)
    }

    pub fn has(&self, name: &str) -> bool {
        self.bucket(name).dir.is_dir()
    }

    /// Names of existing buckets, sorted.
    pub fn keys(&self) -> Result<Vec<String>, WorkerError> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| storage_error(&self.root, e))?;
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Delete a bucket and everything in it. Returns whether it existed.
    pub fn delete(&self, name: &str) -> Result<bool, WorkerError> {
        let dir = self.bucket(name).dir;
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(storage_error(&dir, e)),
        }
    }
}

/// One named bucket of request URL → response.
#[derive(Debug, Clone)]
pub struct Bucket {
    name: String,
    dir: PathBuf,
}

impl Bucket {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn url_hash(url: &str) -> String {
        hex::encode(Sha256::digest(url.as_bytes()))
    }

    fn read_meta(&self, path: &Path) -> Result<Option<EntryMeta>, WorkerError> {
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_error(path, e)),
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|source| WorkerError::CorruptEntry {
                path: path.display().to_string(),
                source,
            })
    }

    /// Write `body` under a name no other put uses. Returns the file name.
    fn write_body(&self, hash: &str, body: &[u8]) -> Result<String, WorkerError> {
        let mut file = tempfile::Builder::new()
            .prefix(&format!("{}.", hash))
            .suffix(".body")
            .tempfile_in(&self.dir)
            .map_err(|e| storage_error(&self.dir, e))?;
        file.write_all(body).map_err(|e| storage_error(file.path(), e))?;
        let (_, path) = file.keep().map_err(|e| storage_error(&self.dir, e.error))?;
        path.file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                storage_error(
                    &path,
                    std::io::Error::new(std::io::ErrorKind::InvalidData, "non UTF-8 file name"),
                )
            })
    }

    pub fn put(&self, url: &str, response: &HttpResponse) -> Result<(), WorkerError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| storage_error(&self.dir, e))?;
        let hash = Self::url_hash(url);
        let meta_path = self.dir.join(format!("{}.json", hash));
        let previous = self.read_meta(&meta_path).ok().flatten().map(|meta| meta.body);

        let meta = EntryMeta {
            url: url.to_string(),
            status: response.status,
            headers: response.headers.clone(),
            body: self.write_body(&hash, &response.body)?,
        };
        let meta_json = serde_json::to_vec(&meta).map_err(|source| WorkerError::CorruptEntry {
            path: meta_path.display().to_string(),
            source,
        })?;
        write_atomic(&self.dir, &meta_path, &meta_json)?;

        if let Some(old) = previous.filter(|old| *old != meta.body) {
            let old_path = self.dir.join(old);
            if let Err(e) = std::fs::remove_file(&old_path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %old_path.display(), error = %e, "Failed to remove replaced body");
                }
            }
        }
        debug!(bucket = %self.name, url = url, "Cached response");
        Ok(())
    }

    pub fn match_url(&self, url: &str) -> Result<Option<HttpResponse>, WorkerError> {
        let meta_path = self.dir.join(format!("{}.json", Self::url_hash(url)));
        let Some(meta) = self.read_meta(&meta_path)? else {
            return Ok(None);
        };

        let body_path = self.dir.join(&meta.body);
        let body = match std::fs::read(&body_path) {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(bucket = %self.name, url = url, "Cache entry has no body");
                return Ok(None);
            }
            Err(e) => return Err(storage_error(&body_path, e)),
        };

        Ok(Some(HttpResponse {
            url: meta.url,
            status: meta.status,
            headers: meta.headers,
            body,
        }))
    }

    /// URLs stored in this bucket, sorted.
    pub fn keys(&self) -> Result<Vec<String>, WorkerError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(storage_error(&self.dir, e)),
        };
        let mut urls: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| std::fs::read(&path).ok())
            .filter_map(|raw| serde_json::from_slice::<EntryMeta>(&raw).ok())
            .map(|meta| meta.url)
            .collect();
        urls.sort();
        Ok(urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> (tempfile::TempDir, CacheStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = CacheStorage::new(dir.path().join("buckets")).unwrap();
        (dir, storage)
    }

    #[test]
    fn test_put_and_match() {
        let (_dir, storage) = storage();
        let bucket = storage.open("site-v1").unwrap();
        let url = "https://example.org/assets/main.min.js";
        let response = HttpResponse::new(url, 200, "console.log(1)")
            .with_header("content-type", "text/javascript");

        assert_eq!(bucket.match_url(url).unwrap(), None);
        bucket.put(url, &response).unwrap();
        assert_eq!(bucket.match_url(url).unwrap(), Some(response));
        assert_eq!(bucket.keys().unwrap(), vec![url.to_string()]);
    }

    #[test]
    fn test_put_overwrites() {
        let (_dir, storage) = storage();
        let bucket = storage.open("site-v1").unwrap();
        let url = "https://example.org/";
        bucket.put(url, &HttpResponse::new(url, 200, "old")).unwrap();
        bucket.put(url, &HttpResponse::new(url, 200, "new")).unwrap();
        assert_eq!(bucket.match_url(url).unwrap().unwrap().text(), "new");

        let bodies = std::fs::read_dir(storage.root.join("site-v1"))
            .unwrap()
            .filter(|e| e.as_ref().unwrap().path().extension().is_some_and(|ext| ext == "body"))
            .count();
        assert_eq!(bodies, 1);
    }

    #[test]
    fn test_concurrent_puts_to_one_url() {
        let (_dir, storage) = storage();
        let bucket = storage.open("site-v1").unwrap();
        let url = "https://example.org/";
        let large = vec![b'x'; 1 << 20];

        for _ in 0..20 {
            let results: Vec<_> = std::thread::scope(|scope| {
                let writers: Vec<_> = [large.as_slice(), b"y".as_slice()]
                    .into_iter()
                    .map(|body| {
                        let bucket = &bucket;
                        scope.spawn(move || {
                            let response = HttpResponse::new(url, 200, body)
                                .with_header("content-length", &body.len().to_string());
                            bucket.put(url, &response)
                        })
                    })
                    .collect();
                writers.into_iter().map(|w| w.join().unwrap()).collect()
            });
            assert!(results.iter().all(|r| r.is_ok()), "{:?}", results);

            let cached = bucket.match_url(url).unwrap().unwrap();
            assert_eq!(cached.header("content-length"), Some(cached.body.len().to_string().as_str()));
        }
        assert_eq!(bucket.keys().unwrap(), vec![url.to_string()]);
    }

    #[test]
    fn test_keys_and_delete() {
        let (_dir, storage) = storage();
        storage.open("site-v1").unwrap();
        storage.open("site-v2").unwrap();
        assert_eq!(storage.keys().unwrap(), vec!["site-v1", "site-v2"]);

        assert!(storage.delete("site-v1").unwrap());
        assert!(!storage.delete("site-v1").unwrap());
        assert!(!storage.has("site-v1"));
        assert_eq!(storage.keys().unwrap(), vec!["site-v2"]);
    }

    #[test]
    fn test_unopened_bucket_is_empty() {
        let (_dir, storage) = storage();
        let bucket = storage.bucket("never-opened");
        assert_eq!(bucket.match_url("https://example.org/").unwrap(), None);
        assert!(bucket.keys().unwrap().is_empty());
        assert!(!storage.has("never-opened"));
    }
}
