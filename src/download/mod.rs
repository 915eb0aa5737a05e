//! Background cache population.
//!
//! The API layer enqueues classified requests; a single worker drains the
//! queue one item at a time, fetches into a reserved temp file, and
//! publishes the result into the cache store.
//!
//! # Architecture
//!
//! ```text
//! GET /video → DownloadQueue ──mpsc──→ DownloadWorker → FetchBackend → CacheStore::publish
//!                   ↑                        │
//!                   └── pending ids ←── complete()
//! ```

pub mod fetch;
pub mod queue;
pub mod worker;

use std::path::PathBuf;

use thiserror::Error;

use crate::cache::CacheError;
use crate::resolver::ResolveError;

// Re-export key types
pub use fetch::{FetchBackend, FetchStrategy, HttpFetcher, MediaFetcher, YtdlFetcher};
pub use queue::{channel, DownloadQueue, EnqueueResult, QueueReceiver};
pub use worker::{CategoryToggles, DownloadWorker};

/// Errors that can occur while downloading
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Redirect from {0} without a Location header")]
    MissingRedirect(String),

    #[error(transparent)]
    Tool(#[from] ResolveError),

    #[error("Download produced no output file: {0}")]
    MissingOutput(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

impl DownloadError {
    /// yt-dlp refused because YouTube wants a signed-in session
    pub fn is_bot_check(&self) -> bool {
        matches!(
            self,
            DownloadError::Tool(ResolveError::ToolFailed { stderr, .. })
                if stderr.contains("Sign in to confirm")
        )
    }
}
