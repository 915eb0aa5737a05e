//! Canonical paths for vcache.
//!
//! Single source of truth - import this instead of hardcoding paths.
//!
//! ## Layout
//!
//! | Location | Purpose |
//! |----------|---------|
//! | `<data>/config.json` | Daemon configuration |
//! | `<data>/youtube_cookies.txt` | Cookie export posted by the browser extension |
//! | `<data>/vcache.lock` | Single-instance lock |
//! | `<cache>/CachedAssets/` | Cached media files (flat) |
//!
//! `<data>` is `$VCACHE_HOME` when set, otherwise the platform's local data
//! directory joined with `vcache`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Environment variable overriding the data directory
pub const HOME_ENV: &str = "VCACHE_HOME";

/// Get the vcache data directory
pub fn data_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var(HOME_ENV) {
        return Ok(PathBuf::from(home));
    }

    Ok(dirs::data_local_dir()
        .context("Failed to determine local data directory")?
        .join("vcache"))
}

/// Default cache directory (<platform cache>/vcache/CachedAssets)
pub fn default_cache_dir() -> Result<PathBuf> {
    Ok(dirs::cache_dir()
        .context("Failed to determine cache directory")?
        .join("vcache")
        .join("CachedAssets"))
}

/// Config file inside a data directory
pub fn config_file(data_dir: &Path) -> PathBuf {
    data_dir.join("config.json")
}

/// Cookie export inside a data directory
pub fn cookies_file(data_dir: &Path) -> PathBuf {
    data_dir.join("youtube_cookies.txt")
}

/// Single-instance lock file inside a data directory
pub fn lock_file(data_dir: &Path) -> PathBuf {
    data_dir.join("vcache.lock")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cache_dir_has_expected_components() {
        let path = default_cache_dir().unwrap();
        assert!(path.ends_with("vcache/CachedAssets"));
    }

    #[test]
    fn test_data_dir_children() {
        let base = PathBuf::from("/tmp/vcache-data");
        assert_eq!(config_file(&base), base.join("config.json"));
        assert_eq!(cookies_file(&base), base.join("youtube_cookies.txt"));
        assert_eq!(lock_file(&base), base.join("vcache.lock"));
    }
}
