//! Configuration for vcache.
//!
//! Configuration sources (highest priority first):
//! 1. `--config <path>` on the command line
//! 2. `$VCACHE_HOME/config.json`
//! 3. `<local data dir>/vcache/config.json`
//!
//! Every key is optional. A missing file is created with defaults on first
//! run, and a file whose normalised form differs is written back.

pub mod paths;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Config file schema (matches JSON structure)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL public cache links are built from
    pub web_server_url: String,

    /// Socket address the HTTP API binds to
    pub listen_addr: String,

    /// yt-dlp executable (bare name = PATH lookup, relative = data dir)
    pub ytdl_path: String,

    /// Pass the stored cookie export to yt-dlp
    pub ytdl_use_cookies: bool,

    /// Extra arguments appended to every yt-dlp invocation
    pub ytdl_additional_args: String,

    /// Preferred audio track language (e.g. "en"), empty for default
    pub ytdl_dub_language: String,

    /// Cache directory, empty for the platform default
    pub cache_path: String,

    pub cache_youtube: bool,

    /// Maximum vertical resolution for cached YouTube downloads
    pub cache_youtube_max_resolution: u32,

    /// Maximum YouTube video length in minutes (0 = unlimited)
    pub cache_youtube_max_length: u32,

    /// Cache size budget in GiB (0 = unbounded)
    pub cache_max_size_gb: f64,

    pub cache_pypydance: bool,

    pub cache_vrdancing: bool,

    /// Exact-match URLs answered with the placeholder
    pub blocked_urls: Vec<String>,

    /// URL returned for blocked requests
    pub blocked_placeholder_url: String,

    /// URL prefixes that are served live but never cached
    pub no_cache_url_prefixes: Vec<String>,

    /// Host substrings that force a progressive (non-avpro) stream
    pub progressive_only_hosts: Vec<String>,

    /// URLs queued for caching at startup
    pub pre_cache_urls: Vec<String>,

    /// Host application's resolver executable to substitute (empty = skip)
    pub host_tool_path: String,

    /// Forwarding stub copied over the host executable
    pub stub_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web_server_url: "http://localhost:9696".to_string(),
            listen_addr: "127.0.0.1:9696".to_string(),
            ytdl_path: "yt-dlp".to_string(),
            ytdl_use_cookies: true,
            ytdl_additional_args: String::new(),
            ytdl_dub_language: String::new(),
            cache_path: String::new(),
            cache_youtube: true,
            cache_youtube_max_resolution: 2160,
            cache_youtube_max_length: 120,
            cache_max_size_gb: 0.0,
            cache_pypydance: true,
            cache_vrdancing: true,
            blocked_urls: vec!["https://na2.vrdancing.club/sampleurl.mp4".to_string()],
            blocked_placeholder_url: "https://ellyvr.dev/blocked.mp4".to_string(),
            no_cache_url_prefixes: vec![
                "https://mightygymcdn.nyc3.cdn.digitaloceanspaces.com".to_string(),
            ],
            progressive_only_hosts: vec![
                ".imvrcdn.com".to_string(),
                ".illumination.media".to_string(),
            ],
            pre_cache_urls: Vec::new(),
            host_tool_path: String::new(),
            stub_path: String::new(),
        }
    }
}

impl Config {
    /// Canonicalise values that have more than one spelling
    pub fn normalize(&mut self) {
        while self.web_server_url.ends_with('/') {
            self.web_server_url.pop();
        }
        self.ytdl_dub_language = self.ytdl_dub_language.trim().to_string();
    }

    /// Cache budget in bytes (0 = unbounded)
    pub fn max_cache_size_bytes(&self) -> u64 {
        if self.cache_max_size_gb <= 0.0 {
            0
        } else {
            (self.cache_max_size_gb * GIB) as u64
        }
    }

    /// `ytdl_additional_args` split on whitespace
    pub fn additional_args(&self) -> Vec<String> {
        self.ytdl_additional_args
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    /// Preferred audio language, if any
    pub fn dub_language(&self) -> Option<&str> {
        Some(self.ytdl_dub_language.as_str()).filter(|l| !l.is_empty())
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Settings as loaded (normalised)
    pub config: Config,

    /// Path the config was loaded from
    pub config_file: PathBuf,

    /// Data directory (cookies, lock file)
    pub data_dir: PathBuf,

    /// Absolute cache directory
    pub cache_dir: PathBuf,

    /// Cookie export path
    pub cookies_path: PathBuf,

    /// yt-dlp executable to invoke
    pub ytdl_path: PathBuf,
}

impl ResolvedConfig {
    /// Resolve paths for an already loaded config
    pub fn resolve(config: Config, config_file: PathBuf, data_dir: PathBuf) -> Result<Self> {
        let cache_dir = if config.cache_path.is_empty() {
            paths::default_cache_dir()?
        } else {
            resolve_path(&data_dir, &config.cache_path)
        };

        let ytdl_path = resolve_tool_path(&data_dir, &config.ytdl_path);

        Ok(Self {
            cookies_path: paths::cookies_file(&data_dir),
            config,
            config_file,
            data_dir,
            cache_dir,
            ytdl_path,
        })
    }

    /// Host executable path, when substitution is configured
    pub fn host_tool_path(&self) -> Option<PathBuf> {
        Some(self.config.host_tool_path.as_str())
            .filter(|p| !p.is_empty())
            .map(|p| resolve_path(&self.data_dir, p))
    }

    /// Stub executable path, when substitution is configured
    pub fn stub_path(&self) -> Option<PathBuf> {
        Some(self.config.stub_path.as_str())
            .filter(|p| !p.is_empty())
            .map(|p| resolve_path(&self.data_dir, p))
    }
}

/// Load and parse config file
pub fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Load a config file, creating it with defaults if missing and re-saving
/// it when normalisation changed anything
pub fn load_or_create(path: &Path) -> Result<Config> {
    let existing = if path.exists() {
        Some(std::fs::read_to_string(path).with_context(|| {
            format!("Failed to read config file: {}", path.display())
        })?)
    } else {
        tracing::info!("No config found, creating {}", path.display());
        None
    };

    let mut config = match existing.as_deref() {
        Some(content) => serde_json::from_str(content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        None => Config::default(),
    };
    config.normalize();

    let serialized = serde_json::to_string_pretty(&config)?;
    if existing.as_deref() != Some(serialized.as_str()) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        std::fs::write(path, &serialized)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        tracing::info!("Config saved to {}", path.display());
    }

    Ok(config)
}

/// Resolve a path that may be relative to a base directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Bare executable names are left for PATH lookup
fn resolve_tool_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.components().count() == 1 && !path.is_absolute() {
        path
    } else {
        resolve_path(base, path_str)
    }
}

/// Load configuration from all sources
pub fn load(config_override: Option<&Path>) -> Result<ResolvedConfig> {
    let data_dir = paths::data_dir()?;
    let config_file = config_override
        .map(Path::to_path_buf)
        .unwrap_or_else(|| paths::config_file(&data_dir));

    let config = load_or_create(&config_file)?;
    ResolvedConfig::resolve(config, config_file, data_dir)
}
