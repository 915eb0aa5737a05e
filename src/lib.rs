//! vcache - caching proxy for a host application's video resolver
//!
//! The host application shells out to yt-dlp to turn a video page into a
//! stream URL. vcache replaces that binary with a small forwarding stub and
//! answers from a local daemon instead: cached files are served straight
//! from disk, everything else gets a live URL while a background worker
//! fills the cache for next time.
//!
//! # Modules
//!
//! - `api`: Loopback HTTP API (`GET /video`, `POST /cookies`, cache files)
//! - `resolver`: URL classification and yt-dlp lookups
//! - `cache`: Size-bounded on-disk cache with oldest-first eviction
//! - `download`: Single-flight queue and the background download worker
//! - `patch`: Host tool substitution and restore
//! - `stub`: Client side of the forwarding stub
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run the daemon (patches the host tool if configured)
//! vcache serve
//!
//! # Show resolved configuration
//! vcache config
//!
//! # Put the original host tool back
//! vcache restore
//! ```

pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod cookies;
pub mod domain;
pub mod download;
pub mod patch;
pub mod resolver;
pub mod stub;

// Re-export main types at crate root for convenience
pub use api::{create_router, AppContext};
pub use cache::{CacheEntry, CacheStore};
pub use config::{Config, ResolvedConfig};
pub use domain::{DownloadFormat, SourceCategory, VideoInfo};
pub use download::{DownloadQueue, DownloadWorker, EnqueueResult};
pub use patch::BinaryPatcher;
pub use resolver::{Classifier, MediaResolver};
