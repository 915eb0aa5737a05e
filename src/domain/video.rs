//! Resolved request descriptors.
//!
//! A [`VideoInfo`] is built per inbound request by the classifier, consumed
//! by the API layer, and copied into the download queue when caching applies.

use serde::{Deserialize, Serialize};

/// Where a source URL comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceCategory {
    /// youtube.com / youtu.be
    YouTube,

    /// PyPyDance asset CDN
    PyPyDance,

    /// VRDancing asset CDN
    VRDancing,

    /// Anything else (never cached)
    Other,
}

impl std::fmt::Display for SourceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceCategory::YouTube => write!(f, "youtube"),
            SourceCategory::PyPyDance => write!(f, "pypydance"),
            SourceCategory::VRDancing => write!(f, "vrdancing"),
            SourceCategory::Other => write!(f, "other"),
        }
    }
}

/// Container the cached copy is stored in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadFormat {
    /// Single progressive file
    Mp4,

    /// Demuxed tier (AVPro)
    Webm,
}

impl DownloadFormat {
    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            DownloadFormat::Mp4 => "mp4",
            DownloadFormat::Webm => "webm",
        }
    }

    /// Format a caller asking for `avpro` would be served
    pub fn for_avpro(avpro: bool) -> Self {
        if avpro {
            DownloadFormat::Webm
        } else {
            DownloadFormat::Mp4
        }
    }
}

impl std::fmt::Display for DownloadFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// A classified source URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Stable id for the source video (empty when unresolvable)
    pub video_id: String,

    /// The URL exactly as the caller sent it
    pub source_url: String,

    /// Classification of the source
    pub source_category: SourceCategory,

    /// Container a cached copy will be downloaded into
    pub download_format: DownloadFormat,

    /// Caller's avpro hint at classification time
    pub requested_avpro: bool,
}

impl VideoInfo {
    /// Whether the id could be resolved
    pub fn has_id(&self) -> bool {
        !self.video_id.is_empty()
    }

    /// Cache file name for a given container: `<videoId>.<ext>`
    pub fn file_name_for(&self, format: DownloadFormat) -> String {
        format!("{}.{}", self.video_id, format.extension())
    }

    /// Cache file name this item is downloaded into
    pub fn file_name(&self) -> String {
        self.file_name_for(self.download_format)
    }
}
