//! Cache index and file publication.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::fs;

use super::{is_temp_name, TEMP_MP4, TEMP_WEBM};
use crate::domain::DownloadFormat;

/// Errors that can occur in the cache store
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Download output missing: {0}")]
    MissingTemp(PathBuf),
}

/// A file present in the cache directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// `<videoId>.<ext>`, unique key
    pub file_name: String,

    /// Size on disk
    pub size_bytes: u64,

    /// Last write time (eviction order)
    pub last_modified: DateTime<Utc>,
}

/// Result of publishing a finished download
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Renamed into place and indexed
    Published(CacheEntry),

    /// A file with the final name already existed; temp file discarded
    AlreadyCached,
}

#[derive(Debug, Default)]
struct CacheIndex {
    entries: HashMap<String, CacheEntry>,
    total_size: u64,
}

impl CacheIndex {
    fn upsert(&mut self, entry: CacheEntry) {
        let size = entry.size_bytes;
        if let Some(old) = self.entries.insert(entry.file_name.clone(), entry) {
            self.total_size -= old.size_bytes;
        }
        self.total_size += size;
    }

    fn remove(&mut self, file_name: &str) -> Option<CacheEntry> {
        let removed = self.entries.remove(file_name)?;
        self.total_size -= removed.size_bytes;
        Some(removed)
    }
}

/// Size-bounded cache of media files
#[derive(Debug)]
pub struct CacheStore {
    /// Flat cache directory
    dir: PathBuf,

    /// Budget in bytes (0 = unbounded)
    max_size_bytes: u64,

    index: Mutex<CacheIndex>,
}

impl CacheStore {
    /// Open the cache directory, creating it if needed, and rebuild the
    /// index from the files present.
    ///
    /// Scans synchronously; call once at startup.
    pub fn open(dir: impl Into<PathBuf>, max_size_bytes: u64) -> Result<Self, CacheError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let mut index = CacheIndex::default();
        for dir_entry in std::fs::read_dir(&dir)? {
            let dir_entry = dir_entry?;
            let Some(file_name) = dir_entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if is_temp_name(&file_name) {
                continue;
            }

            let metadata = match dir_entry.metadata() {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };
            index.upsert(entry_from_metadata(file_name, &metadata)?);
        }

        tracing::debug!(
            "Indexed {} cached files ({} bytes) in {}",
            index.entries.len(),
            index.total_size,
            dir.display()
        );

        Ok(Self {
            dir,
            max_size_bytes,
            index: Mutex::new(index),
        })
    }

    /// Cache directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reserved temp path for a container
    pub fn temp_path(&self, format: DownloadFormat) -> PathBuf {
        match format {
            DownloadFormat::Mp4 => self.dir.join(TEMP_MP4),
            DownloadFormat::Webm => self.dir.join(TEMP_WEBM),
        }
    }

    /// Delete temp files left behind by an aborted download.
    /// Returns the number of files removed.
    pub async fn clear_temp_files(&self) -> usize {
        let mut removed = 0;
        for name in [TEMP_MP4, TEMP_WEBM] {
            let path = self.dir.join(name);
            match fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::warn!("Deleted stale temp file {}", path.display());
                    removed += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => tracing::error!("Failed to delete temp file {}: {}", path.display(), e),
            }
        }
        removed
    }

    /// Look up a cache file by name.
    ///
    /// The directory decides: an indexed entry whose file has disappeared is
    /// dropped and reported as a miss, and a file present on disk but missing
    /// from the index is indexed and reported as a hit. Budget enforcement for
    /// such a file waits for the next add or publish.
    pub async fn lookup(&self, file_name: &str) -> Option<PathBuf> {
        if is_temp_name(file_name) {
            return None;
        }

        let indexed = self.index.lock().entries.contains_key(file_name);
        let path = self.dir.join(file_name);
        let metadata = match fs::metadata(&path).await {
            Ok(m) if m.is_file() => Some(m),
            _ => None,
        };

        match (indexed, metadata) {
            (true, Some(_)) => Some(path),
            (true, None) => {
                tracing::debug!("Cached file vanished, dropping from index: {}", file_name);
                self.index.lock().remove(file_name);
                None
            }
            (false, Some(metadata)) => {
                match entry_from_metadata(file_name.to_string(), &metadata) {
                    Ok(entry) => {
                        tracing::info!("Indexed unlisted cache file {}", file_name);
                        self.index.lock().upsert(entry);
                    }
                    Err(e) => tracing::warn!("Cannot index {}: {}", file_name, e),
                }
                Some(path)
            }
            (false, None) => None,
        }
    }

    /// Index a file that already exists in the cache directory, then
    /// re-evaluate eviction. Returns false if the file is not there.
    pub async fn add(&self, file_name: &str) -> Result<bool, CacheError> {
        let path = self.dir.join(file_name);
        let metadata = match fs::metadata(&path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Ok(false),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let entry = entry_from_metadata(file_name.to_string(), &metadata)?;
        self.index.lock().upsert(entry);
        self.try_evict().await;
        Ok(true)
    }

    /// Move a completed download into the cache under its final name.
    ///
    /// The rename is the atomicity boundary: the final name only ever refers
    /// to a fully written file.
    pub async fn publish(
        &self,
        temp_path: &Path,
        file_name: &str,
    ) -> Result<PublishOutcome, CacheError> {
        match fs::metadata(temp_path).await {
            Ok(m) if m.is_file() => {}
            _ => return Err(CacheError::MissingTemp(temp_path.to_path_buf())),
        }

        let final_path = self.dir.join(file_name);
        if fs::metadata(&final_path).await.is_ok() {
            tracing::warn!("{} already cached, discarding download", file_name);
            if let Err(e) = fs::remove_file(temp_path).await {
                tracing::error!("Failed to delete temp file {}: {}", temp_path.display(), e);
            }
            self.add(file_name).await?;
            return Ok(PublishOutcome::AlreadyCached);
        }

        fs::rename(temp_path, &final_path).await?;

        let metadata = fs::metadata(&final_path).await?;
        let entry = entry_from_metadata(file_name.to_string(), &metadata)?;
        self.index.lock().upsert(entry.clone());
        self.try_evict().await;

        Ok(PublishOutcome::Published(entry))
    }

    /// Evict oldest entries until the total is below budget.
    /// Returns the evicted file names in eviction order.
    pub async fn try_evict(&self) -> Vec<String> {
        let mut evicted = Vec::new();

        for entry in self.eviction_candidates() {
            let path = self.dir.join(&entry.file_name);
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::error!("Failed to evict {}: {}", path.display(), e);
                    continue;
                }
            }

            let total_size = {
                let mut index = self.index.lock();
                index.remove(&entry.file_name);
                index.total_size
            };
            tracing::info!(
                "Evicted {} ({} bytes), cache now {} bytes",
                entry.file_name,
                entry.size_bytes,
                total_size
            );
            evicted.push(entry.file_name);
        }

        evicted
    }

    /// Oldest entries whose removal brings the total below budget
    fn eviction_candidates(&self) -> Vec<CacheEntry> {
        if self.max_size_bytes == 0 {
            return Vec::new();
        }

        let index = self.index.lock();
        let mut remaining = index.total_size;
        if remaining < self.max_size_bytes {
            return Vec::new();
        }

        let mut oldest: Vec<CacheEntry> = index.entries.values().cloned().collect();
        oldest.sort_by(|a, b| {
            a.last_modified
                .cmp(&b.last_modified)
                .then_with(|| a.file_name.cmp(&b.file_name))
        });

        let mut candidates = Vec::new();
        for entry in oldest {
            if remaining < self.max_size_bytes {
                break;
            }
            remaining -= entry.size_bytes;
            candidates.push(entry);
        }
        candidates
    }

    /// Snapshot of the index, sorted by file name
    pub fn entries(&self) -> Vec<CacheEntry> {
        let mut entries: Vec<CacheEntry> = self.index.lock().entries.values().cloned().collect();
        entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        entries
    }

    /// Total indexed size in bytes
    pub fn total_size(&self) -> u64 {
        self.index.lock().total_size
    }

    /// Number of indexed files
    pub fn len(&self) -> usize {
        self.index.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn entry_from_metadata(
    file_name: String,
    metadata: &std::fs::Metadata,
) -> Result<CacheEntry, CacheError> {
    Ok(CacheEntry {
        file_name,
        size_bytes: metadata.len(),
        last_modified: DateTime::<Utc>::from(metadata.modified()?),
    })
}
