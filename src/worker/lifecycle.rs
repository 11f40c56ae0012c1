//! Service worker lifecycle and fetch policy.
//!
//! States run `Parsed → Installing → Installed → Activating → Activated`;
//! a worker whose install fails, or that is replaced, becomes `Redundant`.
//!
//! Fetch policy for an activated worker, network first:
//! 1. cross-origin requests and requests for the metrics API host are not
//!    intercepted;
//! 2. otherwise the network is tried, and a 200 response to a GET is copied
//!    into the bucket in the background;
//! 3. on network failure the bucket is consulted, then (for navigations
//!    only) the cached app shell.

use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use super::{CacheStorage, Destination, FetchRequest, HttpResponse, Network, WorkerError};
use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

/// Messages a page can post to a worker, e.g. `{"action": "skipWaiting"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum WorkerMessage {
    #[serde(rename = "skipWaiting")]
    SkipWaiting,
}

impl WorkerMessage {
    /// Parse a posted message. Unknown actions yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

/// Static settings of one worker version.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub version: String,
    pub origin: Url,
    pub precache: Vec<String>,
    pub offline_shell: String,
    pub api_host: String,
    /// Skip the waiting phase as soon as install succeeds.
    pub skip_waiting_on_install: bool,
}

impl WorkerConfig {
    pub fn from_config(config: &Config) -> Result<Self, WorkerError> {
        let origin = Url::parse(&config.site_origin)
            .map_err(|e| WorkerError::InvalidUrl(format!("{}: {}", config.site_origin, e)))?;
        Ok(Self {
            version: config.cache_version.clone(),
            origin,
            precache: config.precache.clone(),
            offline_shell: config.offline_shell.clone(),
            api_host: config.api_host(),
            skip_waiting_on_install: true,
        })
    }

    fn resolve(&self, path: &str) -> Result<Url, WorkerError> {
        self.origin
            .join(path)
            .map_err(|e| WorkerError::InvalidUrl(format!("{}: {}", path, e)))
    }
}

/// Where a fetch was answered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Not intercepted; the caller goes to the network itself.
    Passthrough,
    Network(HttpResponse),
    Cache(HttpResponse),
    /// Navigation answered with the cached app shell.
    OfflineShell(HttpResponse),
    /// Network failed and nothing suitable was cached.
    NoResponse,
}

impl FetchOutcome {
    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            FetchOutcome::Network(r) | FetchOutcome::Cache(r) | FetchOutcome::OfflineShell(r) => Some(r),
            FetchOutcome::Passthrough | FetchOutcome::NoResponse => None,
        }
    }

    pub fn source(&self) -> &'static str {
        match self {
            FetchOutcome::Passthrough => "passthrough",
            FetchOutcome::Network(_) => "network",
            FetchOutcome::Cache(_) => "cache",
            FetchOutcome::OfflineShell(_) => "offline-shell",
            FetchOutcome::NoResponse => "none",
        }
    }
}

pub struct ServiceWorker<N> {
    config: WorkerConfig,
    network: N,
    caches: CacheStorage,
    state: WorkerState,
    skip_waiting: bool,
    controls_clients: bool,
    pending_writes: Mutex<Vec<JoinHandle<()>>>,
}

impl<N: Network> ServiceWorker<N> {
    pub fn new(config: WorkerConfig, network: N, caches: CacheStorage) -> Self {
        Self {
            config,
            network,
            caches,
            state: WorkerState::Parsed,
            skip_waiting: false,
            controls_clients: false,
            pending_writes: Mutex::new(Vec::new()),
        }
    }

    /// A worker that was activated by an earlier session and still controls the page.
    pub fn resume(config: WorkerConfig, network: N, caches: CacheStorage) -> Self {
        let mut worker = Self::new(config, network, caches);
        worker.state = WorkerState::Activated;
        worker.controls_clients = true;
        worker
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting
    }

    pub fn controls_clients(&self) -> bool {
        self.controls_clients
    }

    pub fn caches(&self) -> &CacheStorage {
        &self.caches
    }

    fn expect_state(&self, expected: WorkerState, action: &'static str) -> Result<(), WorkerError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(WorkerError::InvalidState {
                action,
                state: self.state,
            })
        }
    }

    /// Precache the app shell into this version's bucket.
    ///
    /// All manifest assets are fetched before anything is stored; one
    /// transport failure or non-2xx response fails the whole install and
    /// leaves the bucket untouched.
    pub async fn install(&mut self) -> Result<(), WorkerError> {
        self.expect_state(WorkerState::Parsed, "install")?;
        self.state = WorkerState::Installing;
        info!(version = %self.config.version, "Installing service worker");

        match self.precache().await {
            Ok(count) => {
                info!(version = %self.config.version, assets = count, "Cached app shell");
                self.state = WorkerState::Installed;
                if self.config.skip_waiting_on_install {
                    self.skip_waiting = true;
                }
                Ok(())
            }
            Err(e) => {
                warn!(version = %self.config.version, error = %e, "Service worker install failed");
                self.state = WorkerState::Redundant;
                Err(e)
            }
        }
    }

    async fn precache(&self) -> Result<usize, WorkerError> {
        let requests = self
            .config
            .precache
            .iter()
            .map(|path| self.config.resolve(path).map(FetchRequest::get))
            .collect::<Result<Vec<_>, _>>()?;

        let responses =
            futures::future::join_all(requests.iter().map(|req| self.network.fetch(req))).await;

        let mut fetched = Vec::with_capacity(requests.len());
        for (request, response) in requests.iter().zip(responses) {
            let response = response?;
            if !response.is_ok() {
                return Err(WorkerError::BadStatus {
                    url: request.url.to_string(),
                    status: response.status,
                });
            }
            fetched.push((request.url.to_string(), response));
        }

        let bucket = self.caches.open(&self.config.version)?;
        for (url, response) in &fetched {
            bucket.put(url, response)?;
        }
        Ok(fetched.len())
    }

    /// Delete every bucket but this version's, then take control of open pages.
    /// Returns the names of the deleted buckets.
    pub fn activate(&mut self) -> Result<Vec<String>, WorkerError> {
        self.expect_state(WorkerState::Installed, "activate")?;
        self.state = WorkerState::Activating;
        info!(version = %self.config.version, "Activating service worker");

        let current = crate::utils::sanitize_name(&self.config.version);
        let mut deleted = Vec::new();
        for name in self.caches.keys()? {
            if name != current {
                info!(bucket = %name, "Deleting old cache");
                self.caches.delete(&name)?;
                deleted.push(name);
            }
        }

        self.state = WorkerState::Activated;
        self.controls_clients = true;
        Ok(deleted)
    }

    /// Mark this worker as replaced.
    pub fn retire(&mut self) {
        self.state = WorkerState::Redundant;
        self.controls_clients = false;
    }

    pub fn handle_message(&mut self, message: WorkerMessage) {
        match message {
            WorkerMessage::SkipWaiting => {
                debug!(version = %self.config.version, "Skip waiting requested");
                self.skip_waiting = true;
            }
        }
    }

    /// Whether this worker answers `request` at all.
    pub fn intercepts(&self, request: &FetchRequest) -> bool {
        if request.url.origin() != self.config.origin.origin() {
            return false;
        }
        // Live metrics are never cached, even behind a same-origin proxy
        !request.url.as_str().contains(self.config.api_host.as_str())
    }

    pub async fn handle_fetch(&self, request: &FetchRequest) -> FetchOutcome {
        if !self.intercepts(request) {
            return FetchOutcome::Passthrough;
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.status == 200 && request.method == reqwest::Method::GET {
                    self.cache_in_background(request.url.to_string(), response.clone());
                }
                FetchOutcome::Network(response)
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Network failed, trying cache");
                self.fallback(request)
            }
        }
    }

    fn fallback(&self, request: &FetchRequest) -> FetchOutcome {
        let bucket = self.caches.bucket(&self.config.version);

        match bucket.match_url(request.url.as_str()) {
            Ok(Some(cached)) => {
                debug!(url = %request.url, "Serving from cache");
                return FetchOutcome::Cache(cached);
            }
            Ok(None) => {}
            Err(e) => warn!(url = %request.url, error = %e, "Cache lookup failed"),
        }

        if request.destination != Destination::Document {
            return FetchOutcome::NoResponse;
        }

        let shell = match self.config.resolve(&self.config.offline_shell) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Invalid offline shell path");
                return FetchOutcome::NoResponse;
            }
        };
        match bucket.match_url(shell.as_str()) {
            Ok(Some(cached)) => FetchOutcome::OfflineShell(cached),
            Ok(None) => FetchOutcome::NoResponse,
            Err(e) => {
                warn!(url = %shell, error = %e, "Offline shell lookup failed");
                FetchOutcome::NoResponse
            }
        }
    }

    fn cache_in_background(&self, url: String, response: HttpResponse) {
        let bucket = self.caches.bucket(&self.config.version);
        let handle = tokio::task::spawn_blocking(move || {
            if let Err(e) = bucket.put(&url, &response) {
                warn!(bucket = %bucket.name(), url = %url, error = %e, "Failed to cache response");
            }
        });
        let mut pending = match self.pending_writes.lock() {
            Ok(pending) => pending,
            Err(poisoned) => poisoned.into_inner(),
        };
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    #[cfg(test)]
    fn pending_writes(&self) -> (usize, usize) {
        let pending = match self.pending_writes.lock() {
            Ok(pending) => pending,
            Err(poisoned) => poisoned.into_inner(),
        };
        let running = pending.iter().filter(|h| !h.is_finished()).count();
        (pending.len(), running)
    }

    /// Wait for background cache writes started so far.
    pub async fn settle(&self) {
        let handles = match self.pending_writes.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background cache write panicked");
            }
        }
    }
}
