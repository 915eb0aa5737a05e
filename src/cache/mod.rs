//! On-disk media cache with a size-bounded index.
//!
//! The cache directory is flat: `<videoId>.<ext>` files plus two reserved
//! temp names used by in-progress downloads. The filesystem is the source of
//! truth: the in-memory index is rebuilt from it at startup, and every lookup
//! reconciles the entry it touches with what is on disk. The index only ever
//! lists files that are fully present under their final name.
//!
//! # Eviction
//!
//! After every add/publish, if a positive budget is configured and the
//! indexed total is at or above it, entries are removed oldest
//! `last_modified` first until the total drops below the budget.

pub mod store;

pub use store::{CacheEntry, CacheError, CacheStore, PublishOutcome};

/// Temp download target for the mp4 container
pub const TEMP_MP4: &str = "_tempVideo.mp4";

/// Temp download target for the webm container
pub const TEMP_WEBM: &str = "_tempVideo.webm";

/// Whether a file name is reserved for in-progress downloads
pub fn is_temp_name(file_name: &str) -> bool {
    file_name == TEMP_MP4 || file_name == TEMP_WEBM
}
