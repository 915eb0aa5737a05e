//! Fetch strategies.
//!
//! YouTube items go through yt-dlp with a format ladder; asset-CDN items are
//! plain HTTP GETs with one manually followed redirect. Both write to the
//! destination path they are given and nothing else.

use std::path::Path;

use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use reqwest::Url;
use tokio::io::AsyncWriteExt;

use super::DownloadError;
use crate::domain::{DownloadFormat, SourceCategory, VideoInfo};
use crate::resolver::ytdlp::{download_format, YtdlOptions};

const USER_AGENT: &str = concat!("vcache/", env!("CARGO_PKG_VERSION"));

/// How a queued item is fetched, with the parameters each path needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStrategy {
    /// yt-dlp download through the codec/container ladder
    FormatLadder {
        video_id: String,
        format: DownloadFormat,
    },

    /// Direct HTTP GET of an asset file
    DirectFetch { url: String },
}

impl FetchStrategy {
    /// Strategy for a classified item; `None` for uncacheable categories
    pub fn for_info(info: &VideoInfo) -> Option<Self> {
        match info.source_category {
            SourceCategory::YouTube => Some(FetchStrategy::FormatLadder {
                video_id: info.video_id.clone(),
                format: info.download_format,
            }),
            SourceCategory::PyPyDance | SourceCategory::VRDancing => {
                Some(FetchStrategy::DirectFetch {
                    url: info.source_url.clone(),
                })
            }
            SourceCategory::Other => None,
        }
    }
}

/// Anything able to materialise a strategy into a file
#[async_trait]
pub trait FetchBackend: Send + Sync {
    /// Fetch into `dest`; `dest` must not exist beforehand
    async fn fetch(&self, strategy: &FetchStrategy, dest: &Path) -> Result<(), DownloadError>;
}

/// yt-dlp driven downloads
pub struct YtdlFetcher {
    options: YtdlOptions,

    /// Max vertical resolution for the richest tier
    max_height: u32,

    /// Max video length in minutes (0 = unlimited)
    max_length_minutes: u32,
}

impl YtdlFetcher {
    pub fn new(options: YtdlOptions, max_height: u32, max_length_minutes: u32) -> Self {
        Self {
            options,
            max_height,
            max_length_minutes,
        }
    }

    /// Full argument vector for one download
    pub async fn args(&self, video_id: &str, format: DownloadFormat, dest: &Path) -> Vec<String> {
        let mut args = self.options.base_args().await;

        args.extend([
            "-q".to_string(),
            "-o".to_string(),
            dest.to_string_lossy().to_string(),
            "-f".to_string(),
            download_format(format, self.max_height, self.options.dub_language.as_deref()),
            "--no-mtime".to_string(),
            "--no-progress".to_string(),
        ]);

        if format == DownloadFormat::Mp4 {
            args.push("--remux-video".to_string());
            args.push("mp4".to_string());
        }

        if self.max_length_minutes > 0 {
            args.push("--match-filter".to_string());
            args.push(format!("duration <= {}", u64::from(self.max_length_minutes) * 60));
        }

        args.push("--".to_string());
        args.push(video_id.to_string());
        args
    }

    pub async fn fetch(
        &self,
        video_id: &str,
        format: DownloadFormat,
        dest: &Path,
    ) -> Result<(), DownloadError> {
        let args = self.args(video_id, format, dest).await;
        self.options.run(&args).await?;
        Ok(())
    }
}

/// Plain HTTP downloads for asset CDNs
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher; automatic redirects are off so the hop can be logged
    pub fn new() -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(Policy::none())
            .build()?;

        Ok(Self { client })
    }

    pub async fn fetch(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        let mut url =
            Url::parse(url).map_err(|e| DownloadError::InvalidUrl(format!("{}: {}", url, e)))?;
        let mut response = self.client.get(url.clone()).send().await?;

        if response.status().is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| DownloadError::MissingRedirect(url.to_string()))?;

            let next = url
                .join(location)
                .map_err(|e| DownloadError::InvalidUrl(format!("{}: {}", location, e)))?;
            tracing::info!("Redirected to: {}", next);

            url = next;
            response = self.client.get(url.clone()).send().await?;
        }

        if !response.status().is_success() {
            return Err(DownloadError::HttpStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let mut file = tokio::fs::File::create(dest).await?;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        Ok(())
    }
}

/// Production backend: one implementation per strategy
pub struct MediaFetcher {
    ytdl: YtdlFetcher,
    http: HttpFetcher,
}

impl MediaFetcher {
    pub fn new(ytdl: YtdlFetcher, http: HttpFetcher) -> Self {
        Self { ytdl, http }
    }
}

#[async_trait]
impl FetchBackend for MediaFetcher {
    async fn fetch(&self, strategy: &FetchStrategy, dest: &Path) -> Result<(), DownloadError> {
        match strategy {
            FetchStrategy::FormatLadder { video_id, format } => {
                self.ytdl.fetch(video_id, *format, dest).await
            }
            FetchStrategy::DirectFetch { url } => self.http.fetch(url, dest).await,
        }
    }
}
