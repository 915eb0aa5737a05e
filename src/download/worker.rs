//! Download worker.
//!
//! Drains the queue strictly one item at a time. The temp paths in the cache
//! directory are shared by every download, so there is never more than one
//! fetch in flight.

use std::sync::Arc;

use tokio::task::JoinHandle;

use super::fetch::{FetchBackend, FetchStrategy};
use super::queue::{self, DownloadQueue, QueueReceiver};
use super::DownloadError;
use crate::cache::{CacheStore, PublishOutcome};
use crate::config::Config;
use crate::domain::{SourceCategory, VideoInfo};

/// Per-category caching switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryToggles {
    pub youtube: bool,
    pub pypydance: bool,
    pub vrdancing: bool,
}

impl CategoryToggles {
    pub fn from_config(config: &Config) -> Self {
        Self {
            youtube: config.cache_youtube,
            pypydance: config.cache_pypydance,
            vrdancing: config.cache_vrdancing,
        }
    }

    /// Whether downloads for a category should run at all
    pub fn enabled(&self, category: SourceCategory) -> bool {
        match category {
            SourceCategory::YouTube => self.youtube,
            SourceCategory::PyPyDance => self.pypydance,
            SourceCategory::VRDancing => self.vrdancing,
            SourceCategory::Other => false,
        }
    }
}

impl Default for CategoryToggles {
    fn default() -> Self {
        Self {
            youtube: true,
            pypydance: true,
            vrdancing: true,
        }
    }
}

/// Single consumer of the download queue
pub struct DownloadWorker {
    cache: Arc<CacheStore>,
    backend: Arc<dyn FetchBackend>,
    toggles: CategoryToggles,
}

impl DownloadWorker {
    pub fn new(
        cache: Arc<CacheStore>,
        backend: Arc<dyn FetchBackend>,
        toggles: CategoryToggles,
    ) -> Self {
        Self {
            cache,
            backend,
            toggles,
        }
    }

    /// Create the queue and start consuming it on a background task.
    ///
    /// The task ends once every [`DownloadQueue`] clone has been dropped.
    pub fn spawn(self) -> (DownloadQueue, JoinHandle<()>) {
        let (queue, receiver) = queue::channel();
        let handle = tokio::spawn(self.run(receiver));
        (queue, handle)
    }

    /// Consume items until the queue closes
    pub async fn run(self, mut receiver: QueueReceiver) {
        tracing::debug!("Download worker started");

        while let Some(info) = receiver.recv().await {
            self.handle(&info).await;
            receiver.complete(&info.video_id);
        }

        tracing::debug!("Download worker stopped");
    }

    /// Process one item and log the outcome; failures are dropped, not retried
    async fn handle(&self, info: &VideoInfo) {
        match self.process(info).await {
            Ok(Some(PublishOutcome::Published(entry))) => {
                tracing::info!(
                    "Cached {} ({} bytes, cache now {} bytes)",
                    entry.file_name,
                    entry.size_bytes,
                    self.cache.total_size()
                );
            }
            Ok(Some(PublishOutcome::AlreadyCached)) | Ok(None) => {}
            Err(e) => {
                tracing::error!("Failed to download {}: {}", info.source_url, e);
                if e.is_bot_check() {
                    tracing::error!(
                        "YouTube asked for a sign-in; export cookies from a logged-in browser \
                         and enable ytdl_use_cookies"
                    );
                }
                self.cache.clear_temp_files().await;
            }
        }
    }

    /// Download one item into the cache.
    ///
    /// Returns `None` when the item was skipped without fetching.
    pub async fn process(&self, info: &VideoInfo) -> Result<Option<PublishOutcome>, DownloadError> {
        if !self.toggles.enabled(info.source_category) {
            tracing::debug!(
                "Caching disabled for {}, skipping {}",
                info.source_category,
                info.video_id
            );
            return Ok(None);
        }

        let Some(strategy) = FetchStrategy::for_info(info) else {
            return Ok(None);
        };

        let file_name = info.file_name();
        if self.cache.lookup(&file_name).await.is_some() {
            tracing::debug!("{} already cached, skipping download", file_name);
            return Ok(None);
        }

        self.cache.clear_temp_files().await;
        let temp_path = self.cache.temp_path(info.download_format);

        tracing::info!("Downloading {} as {}", info.source_url, file_name);
        self.backend.fetch(&strategy, &temp_path).await?;

        if !tokio::fs::metadata(&temp_path)
            .await
            .is_ok_and(|m| m.is_file())
        {
            return Err(DownloadError::MissingOutput(temp_path));
        }

        Ok(Some(self.cache.publish(&temp_path, &file_name).await?))
    }
}
