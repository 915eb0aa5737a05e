//! yt-dlp backend.
//!
//! Shells out to the yt-dlp binary for id extraction and live URL lookup,
//! and builds the format-selection expressions the download worker uses.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::{MediaResolver, PlaybackRequest, ResolveError};
use crate::config::ResolvedConfig;
use crate::cookies::CookieJar;
use crate::domain::DownloadFormat;

/// Resolution cap for the widely-compatible mp4 tier
const MP4_TIER_MAX_HEIGHT: u32 = 1080;

/// Invocation settings shared by every yt-dlp call
#[derive(Debug, Clone)]
pub struct YtdlOptions {
    /// Path to the yt-dlp binary
    pub binary: PathBuf,

    /// Cookie export passed via `--cookies` when usable
    pub cookies: CookieJar,

    /// User-supplied extra arguments
    pub additional_args: Vec<String>,

    /// Preferred audio track language
    pub dub_language: Option<String>,
}

impl YtdlOptions {
    /// Build options from resolved configuration
    pub fn from_config(resolved: &ResolvedConfig) -> Self {
        Self {
            binary: resolved.ytdl_path.clone(),
            cookies: CookieJar::new(
                resolved.cookies_path.clone(),
                resolved.config.ytdl_use_cookies,
            ),
            additional_args: resolved.config.additional_args(),
            dub_language: resolved.config.dub_language().map(str::to_string),
        }
    }

    /// Name used in logs and errors
    pub fn tool_name(&self) -> String {
        self.binary
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "yt-dlp".to_string())
    }

    /// Arguments every invocation carries (encoding, cookies, extras)
    pub async fn base_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["--encoding", "utf-8", "--no-playlist", "--no-warnings"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        if let Some(path) = self.cookies.usable_path().await {
            args.push("--cookies".to_string());
            args.push(path.to_string_lossy().to_string());
        }

        args.extend(self.additional_args.iter().cloned());
        args
    }

    /// Run yt-dlp to completion, returning stdout on success
    pub async fn run(&self, args: &[String]) -> Result<String, ResolveError> {
        tracing::debug!("Running {} {}", self.binary.display(), args.join(" "));

        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| ResolveError::Spawn {
                tool: self.tool_name(),
                source,
            })?;

        if !output.status.success() {
            return Err(ResolveError::ToolFailed {
                tool: self.tool_name(),
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

fn height_filter(max_height: Option<u32>) -> String {
    match max_height {
        Some(h) => format!("[height<={}]", h),
        None => String::new(),
    }
}

/// `+<audio>` with an optional language preference falling back to any track
fn audio_selector(base: &str, language: Option<&str>) -> String {
    match language {
        Some(lang) => format!("+({}[language={}]/{})", base, lang, base),
        None => format!("+{}", base),
    }
}

/// Format expression for a live playback URL.
///
/// avpro prefers a demuxed webm video+audio pair; otherwise a single
/// progressive mp4 served over plain http.
pub fn playback_format(avpro: bool, max_height: Option<u32>, language: Option<&str>) -> String {
    let h = height_filter(max_height);
    if avpro {
        format!(
            "bv*{h}[ext=webm]{audio}/bv*{h}+ba/b{h}/b",
            h = h,
            audio = audio_selector("ba[ext=webm]", language)
        )
    } else {
        format!("b{h}[ext=mp4][protocol^=http]/b[protocol^=http]/b", h = h)
    }
}

/// Format ladder for caching downloads.
///
/// Tries the richest tier first and falls back to a more compatible one
/// within the same invocation.
pub fn download_format(format: DownloadFormat, max_height: u32, language: Option<&str>) -> String {
    match format {
        DownloadFormat::Webm => {
            let audio = audio_selector("ba[acodec=opus][ext=webm]", language);
            format!(
                "bv*[height<={h}][vcodec~='^av01'][ext=mp4][dynamic_range='SDR']{audio}\
                 /bv*[height<={h}][vcodec~='vp9'][ext=webm][dynamic_range='SDR']{audio}",
                h = max_height,
                audio = audio
            )
        }
        DownloadFormat::Mp4 => {
            let h = max_height.min(MP4_TIER_MAX_HEIGHT);
            format!(
                "bv*[height<={h}][vcodec~='^(avc|h264)']{audio}\
                 /bv*[height<={h}][vcodec~='^av01'][dynamic_range='SDR']",
                h = h,
                audio = audio_selector("ba[ext=m4a]", language)
            )
        }
    }
}

/// First non-empty line of tool output
fn first_line(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

/// [`MediaResolver`] backed by the yt-dlp binary
pub struct YtdlResolver {
    options: YtdlOptions,
}

impl YtdlResolver {
    /// Create a resolver with invocation options
    pub fn new(options: YtdlOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl MediaResolver for YtdlResolver {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn extract_id(&self, url: &str) -> Result<String, ResolveError> {
        let mut args = self.options.base_args().await;
        args.extend(
            ["--skip-download", "--print", "id", "--", url]
                .iter()
                .map(|s| s.to_string()),
        );

        let stdout = self.options.run(&args).await?;
        first_line(&stdout).ok_or_else(|| ResolveError::EmptyOutput(self.options.tool_name()))
    }

    async fn playback_url(&self, request: &PlaybackRequest) -> Result<String, ResolveError> {
        let format = playback_format(
            request.avpro,
            request.max_height,
            self.options.dub_language.as_deref(),
        );

        let mut args = self.options.base_args().await;
        args.extend(
            ["-f", format.as_str(), "--get-url", "--", request.url.as_str()]
                .iter()
                .map(|s| s.to_string()),
        );

        let stdout = self.options.run(&args).await?;
        first_line(&stdout).ok_or_else(|| ResolveError::EmptyOutput(self.options.tool_name()))
    }
}
