//! Source URL classification and playback URL resolution.
//!
//! The classifier turns an arbitrary source URL into a [`VideoInfo`]
//! (stable id, category, cache container). Anything that needs the external
//! media tool goes through the [`MediaResolver`] trait so the tool can be
//! swapped out in tests.

pub mod classify;
pub mod ytdlp;

use async_trait::async_trait;
use thiserror::Error;

pub use classify::{category_of, Classifier};
pub use ytdlp::{YtdlOptions, YtdlResolver};

/// Errors that can occur while resolving a URL
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} failed with exit code {code}: {stderr}")]
    ToolFailed {
        tool: String,
        code: i32,
        stderr: String,
    },

    #[error("{0} returned no output")]
    EmptyOutput(String),
}

/// Parameters for a live playback URL lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackRequest {
    /// Source URL to resolve
    pub url: String,

    /// Prefer the demuxed tier over a single progressive file
    pub avpro: bool,

    /// Maximum vertical resolution, if limited
    pub max_height: Option<u32>,
}

/// External tool able to identify videos and produce streaming URLs
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Human-readable resolver name
    fn name(&self) -> &str;

    /// Resolve the stable video id of a source URL
    async fn extract_id(&self, url: &str) -> Result<String, ResolveError>;

    /// Resolve a direct, time-limited streaming URL
    async fn playback_url(&self, request: &PlaybackRequest) -> Result<String, ResolveError>;
}

/// Whether a string is usable as a cache file stem
pub fn is_valid_video_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
