//! Shared fixtures for integration tests.
//!
//! External tools are replaced by in-process fakes that record how they
//! were called.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::Notify;

use vcache::api::{AppContext, RequestPolicy};
use vcache::cache::CacheStore;
use vcache::config::Config;
use vcache::cookies::CookieJar;
use vcache::domain::{DownloadFormat, SourceCategory, VideoInfo};
use vcache::download::{
    self, DownloadError, DownloadQueue, FetchBackend, FetchStrategy, QueueReceiver,
};
use vcache::resolver::{Classifier, MediaResolver, PlaybackRequest, ResolveError};

pub const LIVE_URL: &str = "https://rr1.googlevideo.com/videoplayback?expire=1";

/// Resolver with canned ids and a canned live URL
#[derive(Default)]
pub struct FakeResolver {
    ids: HashMap<String, String>,
    live_url: Option<String>,
    pub id_calls: AtomicUsize,
    pub playback_calls: Mutex<Vec<PlaybackRequest>>,
}

impl FakeResolver {
    pub fn new() -> Self {
        Self {
            live_url: Some(LIVE_URL.to_string()),
            ..Self::default()
        }
    }

    /// Resolver whose playback lookups always fail
    pub fn failing() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, url: &str, id: &str) -> Self {
        self.ids.insert(url.to_string(), id.to_string());
        self
    }

    pub fn playback_requests(&self) -> Vec<PlaybackRequest> {
        self.playback_calls.lock().clone()
    }
}

#[async_trait]
impl MediaResolver for FakeResolver {
    fn name(&self) -> &str {
        "fake"
    }

    async fn extract_id(&self, url: &str) -> Result<String, ResolveError> {
        self.id_calls.fetch_add(1, Ordering::SeqCst);
        self.ids.get(url).cloned().ok_or_else(|| ResolveError::ToolFailed {
            tool: "fake".to_string(),
            code: 1,
            stderr: format!("ERROR: Unsupported URL: {}", url),
        })
    }

    async fn playback_url(&self, request: &PlaybackRequest) -> Result<String, ResolveError> {
        self.playback_calls.lock().push(request.clone());
        self.live_url
            .clone()
            .ok_or_else(|| ResolveError::EmptyOutput("fake".to_string()))
    }
}

/// Fetch backend that writes fixed bytes, optionally waiting on a gate
#[derive(Default)]
pub struct FakeBackend {
    content: Vec<u8>,
    fail: bool,
    gate: Option<Arc<Notify>>,
    pub calls: AtomicUsize,
    pub saw_existing_dest: AtomicBool,
    pub strategies: Mutex<Vec<FetchStrategy>>,
}

impl FakeBackend {
    pub fn writing(content: &[u8]) -> Self {
        Self {
            content: content.to_vec(),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Block every fetch until the gate is notified
    pub fn gated(content: &[u8], gate: Arc<Notify>) -> Self {
        Self {
            content: content.to_vec(),
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FetchBackend for FakeBackend {
    async fn fetch(&self, strategy: &FetchStrategy, dest: &Path) -> Result<(), DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.strategies.lock().push(strategy.clone());
        if dest.exists() {
            self.saw_existing_dest.store(true, Ordering::SeqCst);
        }

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        if self.fail {
            return Err(DownloadError::HttpStatus {
                status: 404,
                url: "https://cdn.example/missing.mp4".to_string(),
            });
        }

        tokio::fs::write(dest, &self.content).await?;
        Ok(())
    }
}

/// Router context over a temp cache dir, with the queue's consumer side
/// kept for inspection instead of a running worker
pub struct Harness {
    pub temp: TempDir,
    pub resolver: Arc<FakeResolver>,
    pub ctx: AppContext,
    pub receiver: QueueReceiver,
}

impl Harness {
    pub fn new(config: Config, resolver: FakeResolver) -> Self {
        let temp = TempDir::new().unwrap();
        let cache = Arc::new(CacheStore::open(temp.path().join("cache"), 0).unwrap());
        let resolver = Arc::new(resolver);
        let classifier = Arc::new(Classifier::new(
            resolver.clone() as Arc<dyn MediaResolver>,
            config.cache_youtube_max_resolution,
        ));
        let (queue, receiver) = download::channel();
        let cookies = CookieJar::new(temp.path().join("youtube_cookies.txt"), config.ytdl_use_cookies);

        let ctx = AppContext {
            policy: Arc::new(RequestPolicy::from_config(&config)),
            config: Arc::new(config),
            classifier,
            cache: Some(cache),
            queue,
            cookies,
        };

        Self {
            temp,
            resolver,
            ctx,
            receiver,
        }
    }

    pub fn cache(&self) -> &CacheStore {
        self.ctx.cache.as_deref().unwrap()
    }

    /// Put a file into the cache dir and index it
    pub async fn cache_file(&self, file_name: &str, content: &[u8]) -> PathBuf {
        let path = self.cache().dir().join(file_name);
        std::fs::write(&path, content).unwrap();
        assert!(self.cache().add(file_name).await.unwrap());
        path
    }

    /// Items enqueued so far
    pub fn drain_queue(&mut self) -> Vec<VideoInfo> {
        let mut items = Vec::new();
        while let Some(item) = self.receiver.try_recv() {
            items.push(item);
        }
        items
    }
}

/// `/video` request URI with a percent-encoded source URL
pub fn video_uri(url: &str, avpro: bool) -> String {
    let parsed = reqwest::Url::parse_with_params(
        "http://localhost/video",
        &[("url", url), ("avpro", if avpro { "true" } else { "false" })],
    )
    .unwrap();
    format!("/video?{}", parsed.query().unwrap())
}

pub fn youtube_info(id: &str, format: DownloadFormat) -> VideoInfo {
    VideoInfo {
        video_id: id.to_string(),
        source_url: format!("https://www.youtube.com/watch?v={}", id),
        source_category: SourceCategory::YouTube,
        download_format: format,
        requested_avpro: format == DownloadFormat::Webm,
    }
}

/// Wait until the queue has no pending or in-flight ids
pub async fn wait_idle(queue: &DownloadQueue) {
    for _ in 0..500 {
        if queue.is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("download queue did not drain");
}
