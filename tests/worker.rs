//! Download worker integration tests
//!
//! The fetch backend is a fake that writes fixed bytes into the temp path.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tempfile::TempDir;

use common::{wait_idle, youtube_info, FakeBackend, FakeResolver};
use vcache::cache::{CacheStore, PublishOutcome, TEMP_MP4, TEMP_WEBM};
use vcache::cli::precache;
use vcache::domain::{DownloadFormat, SourceCategory, VideoInfo};
use vcache::download::{CategoryToggles, DownloadWorker, FetchStrategy};
use vcache::resolver::{Classifier, MediaResolver};

fn open_cache(temp: &TempDir) -> Arc<CacheStore> {
    Arc::new(CacheStore::open(temp.path().join("cache"), 0).unwrap())
}

fn worker(
    cache: &Arc<CacheStore>,
    backend: &Arc<FakeBackend>,
    toggles: CategoryToggles,
) -> DownloadWorker {
    DownloadWorker::new(cache.clone(), backend.clone(), toggles)
}

#[tokio::test]
async fn test_successful_download_is_published() {
    let temp = TempDir::new().unwrap();
    let cache = open_cache(&temp);
    let backend = Arc::new(FakeBackend::writing(b"webm bytes"));
    let worker = worker(&cache, &backend, CategoryToggles::default());

    let outcome = worker
        .process(&youtube_info("abc123", DownloadFormat::Webm))
        .await
        .unwrap();

    assert!(matches!(outcome, Some(PublishOutcome::Published(ref e)) if e.file_name == "abc123.webm"));
    assert_eq!(
        std::fs::read(cache.dir().join("abc123.webm")).unwrap(),
        b"webm bytes"
    );
    assert!(!cache.dir().join(TEMP_WEBM).exists());
    assert_eq!(
        backend.strategies.lock()[0],
        FetchStrategy::FormatLadder {
            video_id: "abc123".to_string(),
            format: DownloadFormat::Webm,
        }
    );
}

#[tokio::test]
async fn test_failed_download_is_dropped() {
    let temp = TempDir::new().unwrap();
    let cache = open_cache(&temp);
    let backend = Arc::new(FakeBackend::failing());
    let (queue, _handle) = worker(&cache, &backend, CategoryToggles::default()).spawn();

    assert!(queue.enqueue(youtube_info("abc123", DownloadFormat::Mp4)).is_new());
    wait_idle(&queue).await;

    // No retry, no cache change, no temp leftovers
    assert_eq!(backend.call_count(), 1);
    assert!(cache.is_empty());
    assert!(!cache.dir().join(TEMP_MP4).exists());

    // The id is free again for a later request
    assert!(queue.enqueue(youtube_info("abc123", DownloadFormat::Mp4)).is_new());
    wait_idle(&queue).await;
    assert_eq!(backend.call_count(), 2);
}

#[tokio::test]
async fn test_disabled_category_is_skipped() {
    let temp = TempDir::new().unwrap();
    let cache = open_cache(&temp);
    let backend = Arc::new(FakeBackend::writing(b"bytes"));
    let toggles = CategoryToggles {
        youtube: false,
        ..CategoryToggles::default()
    };
    let (queue, _handle) = worker(&cache, &backend, toggles).spawn();

    assert!(queue.enqueue(youtube_info("abc123", DownloadFormat::Mp4)).is_new());
    wait_idle(&queue).await;

    assert_eq!(backend.call_count(), 0);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_stale_temp_file_is_deleted_first() {
    let temp = TempDir::new().unwrap();
    let cache = open_cache(&temp);
    std::fs::write(cache.dir().join(TEMP_MP4), b"partial").unwrap();
    let backend = Arc::new(FakeBackend::writing(b"complete"));
    let worker = worker(&cache, &backend, CategoryToggles::default());

    worker
        .process(&youtube_info("abc123", DownloadFormat::Mp4))
        .await
        .unwrap();

    assert!(!backend.saw_existing_dest.load(Ordering::SeqCst));
    assert_eq!(
        std::fs::read(cache.dir().join("abc123.mp4")).unwrap(),
        b"complete"
    );
}

#[tokio::test]
async fn test_already_cached_item_is_not_fetched() {
    let temp = TempDir::new().unwrap();
    let cache = open_cache(&temp);
    std::fs::write(cache.dir().join("abc123.mp4"), b"old").unwrap();
    cache.add("abc123.mp4").await.unwrap();
    let backend = Arc::new(FakeBackend::writing(b"new"));
    let worker = worker(&cache, &backend, CategoryToggles::default());

    let outcome = worker
        .process(&youtube_info("abc123", DownloadFormat::Mp4))
        .await
        .unwrap();

    assert!(outcome.is_none());
    assert_eq!(backend.call_count(), 0);
    assert_eq!(std::fs::read(cache.dir().join("abc123.mp4")).unwrap(), b"old");
}

#[tokio::test]
async fn test_asset_item_uses_direct_fetch() {
    let temp = TempDir::new().unwrap();
    let cache = open_cache(&temp);
    let backend = Arc::new(FakeBackend::writing(b"asset"));
    let worker = worker(&cache, &backend, CategoryToggles::default());
    let info = VideoInfo {
        video_id: "vrdancing-42".to_string(),
        source_url: "https://cdn.vrdancing.club/videos/42.mp4".to_string(),
        source_category: SourceCategory::VRDancing,
        download_format: DownloadFormat::Mp4,
        requested_avpro: true,
    };

    worker.process(&info).await.unwrap();

    assert_eq!(
        backend.strategies.lock()[0],
        FetchStrategy::DirectFetch {
            url: "https://cdn.vrdancing.club/videos/42.mp4".to_string()
        }
    );
    assert!(cache.lookup("vrdancing-42.mp4").await.is_some());
}

#[tokio::test]
async fn test_precache_queues_uncached_urls() {
    let temp = TempDir::new().unwrap();
    let cache = open_cache(&temp);
    std::fs::write(cache.dir().join("cached1.mp4"), b"x").unwrap();
    cache.add("cached1.mp4").await.unwrap();

    let resolver = FakeResolver::new()
        .with_id("https://youtu.be/cached1", "cached1")
        .with_id("https://youtu.be/fresh01", "fresh01");
    let classifier = Classifier::new(Arc::new(resolver) as Arc<dyn MediaResolver>, 1080);

    let backend = Arc::new(FakeBackend::writing(b"bytes"));
    let (queue, _handle) = worker(&cache, &backend, CategoryToggles::default()).spawn();

    let urls = vec![
        "https://youtu.be/cached1".to_string(),
        "https://youtu.be/fresh01".to_string(),
        "https://youtu.be/unknown".to_string(),
        "  ".to_string(),
    ];
    let queued = precache(&classifier, &cache, &queue, &urls).await;
    wait_idle(&queue).await;

    assert_eq!(queued, 1);
    assert_eq!(backend.call_count(), 1);
    assert!(cache.lookup("fresh01.mp4").await.is_some());
}
