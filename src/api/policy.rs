//! Per-request bypass rules.

use crate::config::Config;

/// URL lists that override the default cache-and-serve behaviour
#[derive(Debug, Clone, Default)]
pub struct RequestPolicy {
    /// Exact URLs answered with the placeholder
    pub blocked_urls: Vec<String>,

    /// Response body for blocked URLs
    pub placeholder_url: String,

    /// Source prefixes served live but never cached
    pub no_cache_prefixes: Vec<String>,

    /// Host substrings that only play single-file streams
    pub progressive_only_hosts: Vec<String>,
}

impl RequestPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            blocked_urls: config.blocked_urls.clone(),
            placeholder_url: config.blocked_placeholder_url.clone(),
            no_cache_prefixes: config.no_cache_url_prefixes.clone(),
            progressive_only_hosts: config.progressive_only_hosts.clone(),
        }
    }

    pub fn is_blocked(&self, url: &str) -> bool {
        self.blocked_urls.iter().any(|b| b == url)
    }

    pub fn bypasses_cache(&self, url: &str) -> bool {
        self.no_cache_prefixes.iter().any(|p| url.starts_with(p.as_str()))
    }

    /// Whether the source's CDN breaks with demuxed streams
    pub fn forces_progressive(&self, url: &str) -> bool {
        self.progressive_only_hosts
            .iter()
            .any(|h| url.contains(h.as_str()))
    }
}
