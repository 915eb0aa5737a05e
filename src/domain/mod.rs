//! Domain types for vcache.
//!
//! This module contains the core data structures:
//! - VideoInfo: a classified source URL
//! - SourceCategory / DownloadFormat: what drives fetch strategy and cache naming

pub mod video;

// Re-export commonly used types
pub use video::{DownloadFormat, SourceCategory, VideoInfo};
