//! Cookie export handling.
//!
//! The browser extension posts a Netscape-format cookie file; yt-dlp gets
//! `--cookies <path>` only when cookie usage is enabled and the stored file
//! still looks like a usable export.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;

/// Errors that can occur while storing cookies
#[derive(Debug, Error)]
pub enum CookieError {
    #[error("Cookie payload is not a Netscape cookie export")]
    Invalid,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Check that text has the shape of a Netscape cookie export.
///
/// Requires at least one cookie line, and every non-comment line must have
/// the seven tab-separated fields. `#HttpOnly_` lines are cookie lines.
pub fn is_valid(text: &str) -> bool {
    let mut cookie_lines = 0;

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let body = match line.strip_prefix("#HttpOnly_") {
            Some(rest) => rest,
            None if line.starts_with('#') => continue,
            None => line,
        };

        if body.split('\t').count() != 7 {
            return false;
        }
        cookie_lines += 1;
    }

    cookie_lines > 0
}

/// Location and usage policy of the stored cookie export
#[derive(Debug, Clone)]
pub struct CookieJar {
    path: PathBuf,
    enabled: bool,
}

impl CookieJar {
    /// Create a jar for a cookie file path
    pub fn new(path: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            path: path.into(),
            enabled,
        }
    }

    /// Cookie file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether configuration allows passing cookies to yt-dlp
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Path to hand to yt-dlp, if cookies are enabled and the stored file is valid
    pub async fn usable_path(&self) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }

        let content = fs::read_to_string(&self.path).await.ok()?;
        is_valid(&content).then(|| self.path.clone())
    }

    /// Validate and persist a cookie export
    pub async fn store(&self, text: &str) -> Result<(), CookieError> {
        if !is_valid(text) {
            return Err(CookieError::Invalid);
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.path, text).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = "# Netscape HTTP Cookie File\n\
        # This file is generated by a browser extension.\n\
        \n\
        .youtube.com\tTRUE\t/\tTRUE\t1767225600\tPREF\tf6=40000000\n\
        #HttpOnly_.youtube.com\tTRUE\t/\tTRUE\t1767225600\tLOGIN_INFO\tAFmmF2sw\n";

    #[test]
    fn test_valid_export() {
        assert!(is_valid(SAMPLE));
        assert!(is_valid(&SAMPLE.replace('\n', "\r\n")));
    }

    #[test]
    fn test_invalid_exports() {
        assert!(!is_valid(""));
        assert!(!is_valid("   \n"));
        assert!(!is_valid("# Netscape HTTP Cookie File\n"));
        assert!(!is_valid("session=abc; path=/"));
        assert!(!is_valid(&format!("{}garbage line\n", SAMPLE)));
    }

    #[tokio::test]
    async fn test_store_and_usable_path() {
        let temp = TempDir::new().unwrap();
        let jar = CookieJar::new(temp.path().join("data").join("cookies.txt"), true);

        assert!(jar.usable_path().await.is_none());
        jar.store(SAMPLE).await.unwrap();
        assert_eq!(jar.usable_path().await, Some(jar.path().to_path_buf()));
    }

    #[tokio::test]
    async fn test_store_rejects_invalid_without_writing() {
        let temp = TempDir::new().unwrap();
        let jar = CookieJar::new(temp.path().join("cookies.txt"), true);

        assert!(matches!(jar.store("nope").await, Err(CookieError::Invalid)));
        assert!(!jar.path().exists());
    }

    #[tokio::test]
    async fn test_disabled_jar_is_never_usable() {
        let temp = TempDir::new().unwrap();
        let jar = CookieJar::new(temp.path().join("cookies.txt"), false);
        jar.store(SAMPLE).await.unwrap();
        assert!(jar.usable_path().await.is_none());
    }
}
