//! Page-side registration of the service worker.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use super::{FetchOutcome, FetchRequest, Network, ServiceWorker, WorkerError, WorkerMessage};

/// How often a registered page checks for a new worker version.
pub const UPDATE_CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Hosts treated as local development, where no worker is registered.
const LOCAL_HOSTS: [&str; 2] = ["localhost", "127.0.0.1"];

pub fn should_register(host: &str) -> bool {
    !LOCAL_HOSTS.contains(&host)
}

/// Result of offering a worker version to the registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Same version as the active worker; nothing installed.
    UpToDate,
    /// Installed and now controlling the page.
    Activated { deleted: Vec<String> },
    /// Installed, waiting for a skip-waiting message.
    Waiting,
}

/// Active worker version persisted between sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationState {
    pub active_version: Option<String>,
}

impl RegistrationState {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

pub struct Registration<N> {
    active: Option<ServiceWorker<N>>,
    waiting: Option<ServiceWorker<N>>,
    controller: watch::Sender<Option<String>>,
}

impl<N: Network> Default for Registration<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Network> Registration<N> {
    pub fn new() -> Self {
        let (controller, _) = watch::channel(None);
        Self {
            active: None,
            waiting: None,
            controller,
        }
    }

    /// Adopt a worker that already controls the page from an earlier session.
    pub fn resume(&mut self, worker: ServiceWorker<N>) {
        let version = worker.version().to_string();
        self.active = Some(worker);
        self.controller.send_replace(Some(version));
    }

    /// Receiver notified whenever a new version takes control.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.controller.subscribe()
    }

    pub fn active(&self) -> Option<&ServiceWorker<N>> {
        self.active.as_ref()
    }

    pub fn waiting(&self) -> Option<&ServiceWorker<N>> {
        self.waiting.as_ref()
    }

    pub fn state(&self) -> RegistrationState {
        RegistrationState {
            active_version: self.active.as_ref().map(|w| w.version().to_string()),
        }
    }

    /// Offer `candidate` as the newest version.
    ///
    /// A failed install leaves the active worker in place.
    pub async fn update(&mut self, mut candidate: ServiceWorker<N>) -> Result<UpdateOutcome, WorkerError> {
        if self.active.as_ref().map(|w| w.version()) == Some(candidate.version()) {
            debug!(version = %candidate.version(), "Service worker up to date");
            return Ok(UpdateOutcome::UpToDate);
        }

        candidate.install().await?;

        if candidate.skip_waiting_requested() || self.active.is_none() {
            let deleted = self.promote(candidate)?;
            Ok(UpdateOutcome::Activated { deleted })
        } else {
            info!(version = %candidate.version(), "New service worker waiting");
            if let Some(mut previous) = self.waiting.replace(candidate) {
                previous.retire();
            }
            Ok(UpdateOutcome::Waiting)
        }
    }

    fn promote(&mut self, mut worker: ServiceWorker<N>) -> Result<Vec<String>, WorkerError> {
        let deleted = worker.activate()?;
        let version = worker.version().to_string();
        if let Some(mut previous) = self.active.replace(worker) {
            previous.retire();
        }
        info!(version = %version, "Service worker took control");
        self.controller.send_replace(Some(version));
        Ok(deleted)
    }

    /// Deliver a message to the waiting worker, promoting it when it asks to
    /// skip waiting. Returns whether a promotion happened.
    pub fn post_message(&mut self, message: WorkerMessage) -> Result<bool, WorkerError> {
        Ok(self.deliver(message)?.is_some())
    }

    /// Offer `candidate` and, if it ends up waiting, post `message` to it.
    pub async fn update_with_message(
        &mut self,
        candidate: ServiceWorker<N>,
        message: WorkerMessage,
    ) -> Result<UpdateOutcome, WorkerError> {
        let outcome = self.update(candidate).await?;
        if outcome != UpdateOutcome::Waiting {
            return Ok(outcome);
        }
        Ok(match self.deliver(message)? {
            Some(deleted) => UpdateOutcome::Activated { deleted },
            None => UpdateOutcome::Waiting,
        })
    }

    /// Returns the deleted buckets when the message promoted the waiting worker.
    fn deliver(&mut self, message: WorkerMessage) -> Result<Option<Vec<String>>, WorkerError> {
        let Some(mut waiting) = self.waiting.take() else {
            debug!(?message, "No waiting service worker");
            return Ok(None);
        };
        waiting.handle_message(message);
        if waiting.skip_waiting_requested() {
            self.promote(waiting).map(Some)
        } else {
            self.waiting = Some(waiting);
            Ok(None)
        }
    }

    /// Route a request through the controlling worker, if any.
    ///
    /// Returns as soon as the response is known; cache writes it started
    /// keep running until `settle`.
    pub async fn fetch(&self, request: &FetchRequest) -> FetchOutcome {
        match self.active.as_ref() {
            Some(worker) if worker.controls_clients() => worker.handle_fetch(request).await,
            _ => FetchOutcome::Passthrough,
        }
    }

    /// Wait for the active worker's background cache writes.
    pub async fn settle(&self) {
        if let Some(worker) = self.active.as_ref() {
            worker.settle().await;
        }
    }

    /// Check for updates every `period` until `shutdown` fires.
    ///
    /// `candidate` builds the worker for whatever version is current at
    /// check time; returning `None` skips that check. Without an active
    /// worker the first check runs immediately.
    pub async fn poll_updates<F>(
        &mut self,
        period: Duration,
        mut candidate: F,
        mut shutdown: oneshot::Receiver<()>,
    ) where
        F: FnMut() -> Option<ServiceWorker<N>>,
    {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately
        if self.active.is_some() {
            ticker.tick().await;
        }

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    let Some(worker) = candidate() else { continue };
                    match self.update(worker).await {
                        Ok(outcome) => debug!(?outcome, "Update check complete"),
                        Err(e) => warn!(error = %e, "Update check failed"),
                    }
                }
            }
        }
    }
}
