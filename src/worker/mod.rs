//! Offline cache for site assets, modelled on a browser service worker.
//!
//! - `CacheStorage` / `Bucket`: named, versioned request→response stores on disk
//! - `Network`: the seam through which live requests are made
//! - `ServiceWorker`: install (precache the app shell), activate (delete
//!   buckets of other versions), and network-first fetch handling
//! - `Registration`: the page-side view - which worker controls the page,
//!   update checks, and controller-change notification

pub mod lifecycle;
pub mod network;
pub mod registration;
pub mod storage;

pub use lifecycle::{FetchOutcome, ServiceWorker, WorkerConfig, WorkerMessage, WorkerState};
pub use network::{HttpNetwork, HttpResponse, Network};
pub use registration::{should_register, Registration, RegistrationState, UpdateOutcome};
pub use storage::{Bucket, CacheStorage};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Precache of {url} failed with status {status}")]
    BadStatus { url: String, status: u16 },

    #[error("Invalid URL {0}")]
    InvalidUrl(String),

    #[error("Cache storage error at {path}: {source}")]
    Storage {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt cache entry at {path}: {source}")]
    CorruptEntry {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cannot {action} a worker in state {state}")]
    InvalidState { action: &'static str, state: WorkerState },
}

/// What the requester intends to do with the response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// Top-level navigation
    Document,
    Style,
    Script,
    Image,
    #[default]
    Other,
}

/// A request routed through the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: Url,
    pub method: reqwest::Method,
    pub destination: Destination,
}

impl FetchRequest {
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: reqwest::Method::GET,
            destination: Destination::Other,
        }
    }

    pub fn navigate(url: Url) -> Self {
        Self {
            destination: Destination::Document,
            ..Self::get(url)
        }
    }

    pub fn parse(raw: &str, destination: Destination) -> Result<Self, WorkerError> {
        let url = Url::parse(raw).map_err(|e| WorkerError::InvalidUrl(format!("{}: {}", raw, e)))?;
        Ok(Self {
            destination,
            ..Self::get(url)
        })
    }
}
