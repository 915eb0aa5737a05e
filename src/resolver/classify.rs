//! URL classification.
//!
//! Categories are decided by host: first-party dance asset CDNs, the
//! YouTube domain family, and everything else. Asset ids come straight from
//! the URL; YouTube ids need the external resolver.

use std::sync::Arc;

use reqwest::Url;

use super::{is_valid_video_id, MediaResolver, PlaybackRequest, ResolveError};
use crate::domain::{DownloadFormat, SourceCategory, VideoInfo};

const YOUTUBE_DOMAINS: &[&str] = &["youtube.com", "youtu.be", "youtube-nocookie.com"];
const PYPYDANCE_DOMAINS: &[&str] = &["pypy.moe", "pypy.dance"];
const VRDANCING_DOMAINS: &[&str] = &["vrdancing.club"];

/// Classify a source URL by host
pub fn category_of(url: &str) -> SourceCategory {
    let Some(host) = host_of(url) else {
        return SourceCategory::Other;
    };

    if matches_any(&host, PYPYDANCE_DOMAINS) {
        SourceCategory::PyPyDance
    } else if matches_any(&host, VRDANCING_DOMAINS) {
        SourceCategory::VRDancing
    } else if matches_any(&host, YOUTUBE_DOMAINS) {
        SourceCategory::YouTube
    } else {
        SourceCategory::Other
    }
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url.trim())
        .ok()?
        .host_str()
        .map(|h| h.to_ascii_lowercase())
}

fn matches_any(host: &str, domains: &[&str]) -> bool {
    domains.iter().any(|domain| {
        host == *domain
            || host
                .strip_suffix(domain)
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

/// Derive the id of an asset-CDN URL.
///
/// Uses the `id` query parameter when present, otherwise the stem of the
/// last path segment. The category name is prefixed so ids from different
/// CDNs never collide.
fn asset_id(url: &str, category: SourceCategory) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;

    let raw = parsed
        .query_pairs()
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.into_owned())
        .or_else(|| {
            parsed
                .path_segments()?
                .rev()
                .find(|s| !s.is_empty())
                .map(|segment| match segment.rsplit_once('.') {
                    Some((stem, _)) => stem.to_string(),
                    None => segment.to_string(),
                })
        })?;

    let id = format!("{}-{}", category, raw);
    is_valid_video_id(&id).then_some(id)
}

/// Turns source URLs into [`VideoInfo`] and live playback URLs
pub struct Classifier {
    resolver: Arc<dyn MediaResolver>,

    /// Max vertical resolution for YouTube (0 = unlimited)
    youtube_max_height: u32,
}

impl Classifier {
    /// Create a classifier backed by an external resolver
    pub fn new(resolver: Arc<dyn MediaResolver>, youtube_max_height: u32) -> Self {
        Self {
            resolver,
            youtube_max_height,
        }
    }

    /// Classify a source URL.
    ///
    /// Never fails: an id that cannot be resolved is left empty, which the
    /// caller treats as "serve live, don't cache".
    pub async fn classify(&self, source_url: &str, avpro: bool) -> VideoInfo {
        let category = category_of(source_url);

        let (video_id, download_format) = match category {
            SourceCategory::YouTube => (
                self.youtube_id(source_url).await,
                DownloadFormat::for_avpro(avpro),
            ),
            SourceCategory::PyPyDance | SourceCategory::VRDancing => (
                asset_id(source_url, category).unwrap_or_default(),
                DownloadFormat::Mp4,
            ),
            SourceCategory::Other => (String::new(), DownloadFormat::for_avpro(avpro)),
        };

        VideoInfo {
            video_id,
            source_url: source_url.to_string(),
            source_category: category,
            download_format,
            requested_avpro: avpro,
        }
    }

    async fn youtube_id(&self, url: &str) -> String {
        match self.resolver.extract_id(url).await {
            Ok(id) if is_valid_video_id(&id) => id,
            Ok(id) => {
                tracing::warn!("{} returned unusable id {:?} for {}", self.resolver.name(), id, url);
                String::new()
            }
            Err(e) => {
                tracing::warn!("Failed to get video id for {}: {}", url, e);
                String::new()
            }
        }
    }

    /// Resolve a live URL the caller can play right now
    pub async fn playback_url(&self, info: &VideoInfo, avpro: bool) -> Result<String, ResolveError> {
        let max_height = match info.source_category {
            // Asset CDNs serve plain files
            SourceCategory::PyPyDance | SourceCategory::VRDancing => {
                return Ok(info.source_url.clone());
            }
            SourceCategory::YouTube => Some(self.youtube_max_height).filter(|h| *h > 0),
            SourceCategory::Other => None,
        };

        let request = PlaybackRequest {
            url: info.source_url.clone(),
            avpro,
            max_height,
        };
        self.resolver.playback_url(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct FakeResolver {
        id: Option<String>,
        requests: Mutex<Vec<PlaybackRequest>>,
    }

    #[async_trait]
    impl MediaResolver for FakeResolver {
        fn name(&self) -> &str {
            "fake"
        }

        async fn extract_id(&self, _url: &str) -> Result<String, ResolveError> {
            self.id
                .clone()
                .ok_or_else(|| ResolveError::EmptyOutput("fake".to_string()))
        }

        async fn playback_url(&self, request: &PlaybackRequest) -> Result<String, ResolveError> {
            self.requests.lock().push(request.clone());
            Ok("https://rr1.googlevideo.com/videoplayback".to_string())
        }
    }

    fn build(id: Option<&str>) -> (Classifier, Arc<FakeResolver>) {
        let resolver = Arc::new(FakeResolver {
            id: id.map(str::to_string),
            ..Default::default()
        });
        (Classifier::new(resolver.clone(), 1080), resolver)
    }

    #[test]
    fn test_category_of() {
        assert_eq!(
            category_of("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            SourceCategory::YouTube
        );
        assert_eq!(category_of("https://youtu.be/dQw4w9WgXcQ"), SourceCategory::YouTube);
        assert_eq!(
            category_of("https://music.YouTube.com/watch?v=x"),
            SourceCategory::YouTube
        );
        assert_eq!(
            category_of("https://jd.pypy.moe/api/v1/videos/1234.mp4"),
            SourceCategory::PyPyDance
        );
        assert_eq!(
            category_of("https://na2.vrdancing.club/video/abcd.mp4"),
            SourceCategory::VRDancing
        );
        assert_eq!(category_of("https://notyoutube.com/watch"), SourceCategory::Other);
        assert_eq!(category_of("not a url"), SourceCategory::Other);
    }

    #[test]
    fn test_asset_ids() {
        assert_eq!(
            asset_id("https://jd.pypy.moe/api/v1/videos/1234.mp4", SourceCategory::PyPyDance),
            Some("pypydance-1234".to_string())
        );
        assert_eq!(
            asset_id("http://api.pypy.dance/video?id=987", SourceCategory::PyPyDance),
            Some("pypydance-987".to_string())
        );
        assert_eq!(
            asset_id("https://na2.vrdancing.club/video/abcd.mp4", SourceCategory::VRDancing),
            Some("vrdancing-abcd".to_string())
        );
        assert_eq!(
            asset_id("https://na2.vrdancing.club/", SourceCategory::VRDancing),
            None
        );
    }

    #[tokio::test]
    async fn test_classify_youtube() {
        let (classifier, _) = build(Some("dQw4w9WgXcQ"));
        let info = classifier
            .classify("https://www.youtube.com/watch?v=dQw4w9WgXcQ", true)
            .await;

        assert_eq!(info.video_id, "dQw4w9WgXcQ");
        assert_eq!(info.source_category, SourceCategory::YouTube);
        assert_eq!(info.download_format, DownloadFormat::Webm);
        assert!(info.requested_avpro);
    }

    #[tokio::test]
    async fn test_classify_youtube_fails_soft() {
        let (classifier, _) = build(None);
        let info = classifier.classify("https://youtu.be/broken", false).await;
        assert!(!info.has_id());
        assert_eq!(info.source_category, SourceCategory::YouTube);

        let (classifier, _) = build(Some("../etc/passwd"));
        let info = classifier.classify("https://youtu.be/broken", false).await;
        assert!(!info.has_id());
    }

    #[tokio::test]
    async fn test_classify_asset_is_always_mp4() {
        let (classifier, _) = build(None);
        let info = classifier
            .classify("https://jd.pypy.moe/api/v1/videos/1234.mp4", true)
            .await;
        assert_eq!(info.video_id, "pypydance-1234");
        assert_eq!(info.download_format, DownloadFormat::Mp4);
    }

    #[tokio::test]
    async fn test_playback_url_dispatch() {
        let (classifier, resolver) = build(Some("dQw4w9WgXcQ"));

        let asset = classifier
            .classify("https://na2.vrdancing.club/video/abcd.mp4", false)
            .await;
        assert_eq!(
            classifier.playback_url(&asset, false).await.unwrap(),
            "https://na2.vrdancing.club/video/abcd.mp4"
        );
        assert!(resolver.requests.lock().is_empty());

        let yt = classifier.classify("https://youtu.be/dQw4w9WgXcQ", true).await;
        classifier.playback_url(&yt, true).await.unwrap();

        let other = classifier.classify("https://example.com/live.m3u8", false).await;
        classifier.playback_url(&other, false).await.unwrap();

        let requests = resolver.requests.lock();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].max_height, Some(1080));
        assert!(requests[0].avpro);
        assert_eq!(requests[1].max_height, None);
    }
}
