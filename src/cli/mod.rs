//! Command-line interface for vcache.
//!
//! `serve` runs the caching daemon; `patch` and `restore` swap the host
//! application's yt-dlp for the forwarding stub and back; `config` shows
//! what the daemon would run with.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fs2::FileExt;

use crate::api::{self, AppContext, RequestPolicy};
use crate::cache::CacheStore;
use crate::config::{self, paths, ResolvedConfig};
use crate::cookies::CookieJar;
use crate::download::{
    self, CategoryToggles, DownloadQueue, DownloadWorker, HttpFetcher, MediaFetcher, YtdlFetcher,
};
use crate::patch::{BinaryPatcher, PatchOutcome, RevertOutcome};
use crate::resolver::{Classifier, MediaResolver, YtdlOptions, YtdlResolver};

/// vcache - caching proxy for a host application's video resolver
#[derive(Parser, Debug)]
#[command(name = "vcache")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to <data dir>/config.json)
    #[arg(long, global = true, env = "VCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the caching daemon
    Serve,

    /// Replace the host tool with the forwarding stub
    Patch,

    /// Put the original host tool back
    Restore,

    /// Show resolved configuration
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let resolved = config::load(self.config.as_deref())?;

        match self.command {
            Commands::Serve => serve(resolved).await,
            Commands::Patch => patch(&resolved).await,
            Commands::Restore => restore(&resolved).await,
            Commands::Config => show_config(&resolved),
        }
    }
}

/// Hold an exclusive lock on the data dir for the life of the daemon
fn acquire_instance_lock(data_dir: &Path) -> Result<File> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data dir: {}", data_dir.display()))?;

    let lock_path = paths::lock_file(data_dir);
    let file = File::create(&lock_path)
        .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;

    file.try_lock_exclusive().with_context(|| {
        format!(
            "Another vcache instance is running (lock held on {})",
            lock_path.display()
        )
    })?;

    Ok(file)
}

async fn serve(resolved: ResolvedConfig) -> Result<()> {
    let _lock = acquire_instance_lock(&resolved.data_dir)?;
    let config = Arc::new(resolved.config.clone());

    tracing::info!("Config: {}", resolved.config_file.display());

    let cache = match CacheStore::open(&resolved.cache_dir, config.max_cache_size_bytes()) {
        Ok(cache) => {
            cache.clear_temp_files().await;
            cache.try_evict().await;
            tracing::info!(
                "Cache: {} ({} files, {} bytes)",
                cache.dir().display(),
                cache.len(),
                cache.total_size()
            );
            Some(Arc::new(cache))
        }
        Err(e) => {
            tracing::error!(
                "Failed to open cache {}: {}; serving live URLs only",
                resolved.cache_dir.display(),
                e
            );
            None
        }
    };

    let options = YtdlOptions::from_config(&resolved);
    let resolver: Arc<dyn MediaResolver> = Arc::new(YtdlResolver::new(options.clone()));
    let classifier = Arc::new(Classifier::new(
        resolver,
        config.cache_youtube_max_resolution,
    ));

    let (queue, worker_handle) = match &cache {
        Some(cache) => {
            let backend = MediaFetcher::new(
                YtdlFetcher::new(
                    options.clone(),
                    config.cache_youtube_max_resolution,
                    config.cache_youtube_max_length,
                ),
                HttpFetcher::new().context("Failed to build HTTP client")?,
            );
            let worker = DownloadWorker::new(
                cache.clone(),
                Arc::new(backend),
                CategoryToggles::from_config(&config),
            );
            let (queue, handle) = worker.spawn();
            (queue, Some(handle))
        }
        // Nothing consumes the queue; requests never enqueue without a cache
        None => (download::channel().0, None),
    };

    let patcher = patcher_for(&resolved);
    if let Some(patcher) = &patcher {
        if let Err(e) = patcher.apply().await {
            tracing::error!("Failed to patch {}: {}", patcher.target().display(), e);
        }
    }

    if let Some(cache) = &cache {
        let queued = precache(&classifier, cache, &queue, &config.pre_cache_urls).await;
        if queued > 0 {
            tracing::info!("Queued {} URLs for pre-caching", queued);
        }
    }

    let ctx = AppContext {
        policy: Arc::new(RequestPolicy::from_config(&config)),
        config: config.clone(),
        classifier,
        cache,
        queue,
        cookies: options.cookies.clone(),
    };
    let result = api::serve(&config.listen_addr, api::create_router(ctx)).await;

    if let Some(patcher) = &patcher {
        if let Err(e) = patcher.revert().await {
            tracing::error!("Failed to restore {}: {}", patcher.target().display(), e);
        }
    }
    if let Some(handle) = worker_handle {
        handle.abort();
    }

    result
}

/// Queue configured URLs that are not cached yet.
/// Returns the number of new queue items.
pub async fn precache(
    classifier: &Classifier,
    cache: &CacheStore,
    queue: &DownloadQueue,
    urls: &[String],
) -> usize {
    let mut queued = 0;

    for url in urls.iter().filter(|u| !u.trim().is_empty()) {
        let info = classifier.classify(url.trim(), false).await;
        if !info.has_id() {
            tracing::warn!("Cannot pre-cache {}: no video id", url);
            continue;
        }
        if cache.lookup(&info.file_name()).await.is_some() {
            continue;
        }
        if queue.enqueue(info).is_new() {
            queued += 1;
        }
    }

    queued
}

fn patcher_for(resolved: &ResolvedConfig) -> Option<BinaryPatcher> {
    let target = resolved.host_tool_path()?;
    let stub = resolved.stub_path()?;
    Some(BinaryPatcher::new(target, stub))
}

fn require_patcher(resolved: &ResolvedConfig) -> Result<BinaryPatcher> {
    patcher_for(resolved).with_context(|| {
        format!(
            "host_tool_path and stub_path must both be set in {}",
            resolved.config_file.display()
        )
    })
}

async fn patch(resolved: &ResolvedConfig) -> Result<()> {
    let patcher = require_patcher(resolved)?;

    match patcher.apply().await? {
        PatchOutcome::NotInstalled => println!("Host tool directory not found, nothing patched."),
        PatchOutcome::AlreadyPatched => println!("Already patched: {}", patcher.target().display()),
        PatchOutcome::Patched => {
            println!("Patched:   {}", patcher.target().display());
            println!("Backup at: {}", patcher.backup().display());
        }
    }

    Ok(())
}

async fn restore(resolved: &ResolvedConfig) -> Result<()> {
    let patcher = require_patcher(resolved)?;

    match patcher.revert().await? {
        RevertOutcome::NotInstalled => println!("Host tool directory not found, nothing restored."),
        RevertOutcome::NothingToRestore => println!("No backup found, nothing restored."),
        RevertOutcome::Restored => println!("Restored: {}", patcher.target().display()),
    }

    Ok(())
}

/// Show the resolved configuration (for debugging)
fn show_config(resolved: &ResolvedConfig) -> Result<()> {
    let cfg = &resolved.config;
    let cookies = CookieJar::new(resolved.cookies_path.clone(), cfg.ytdl_use_cookies);

    println!("vcache configuration");
    println!("════════════════════");
    println!();
    println!("Config file: {}", resolved.config_file.display());
    println!();
    println!("Paths:");
    println!("  Data dir:   {}", resolved.data_dir.display());
    println!("  Cache dir:  {}", resolved.cache_dir.display());
    println!(
        "  Cookies:    {} ({})",
        cookies.path().display(),
        if cookies.enabled() { "enabled" } else { "disabled" }
    );
    println!("  yt-dlp:     {}", resolved.ytdl_path.display());
    println!(
        "  Host tool:  {}",
        resolved
            .host_tool_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(not set)".to_string())
    );
    println!();
    println!("Server:");
    println!("  Listen:     {}", cfg.listen_addr);
    println!("  Public URL: {}", cfg.web_server_url);
    println!();
    println!("Cache:");
    if cfg.max_cache_size_bytes() == 0 {
        println!("  Max size:   unbounded");
    } else {
        println!("  Max size:   {} GB", cfg.cache_max_size_gb);
    }
    println!(
        "  Categories: youtube={} pypydance={} vrdancing={}",
        cfg.cache_youtube, cfg.cache_pypydance, cfg.cache_vrdancing
    );
    println!(
        "  YouTube:    max {}p, max {} min",
        cfg.cache_youtube_max_resolution, cfg.cache_youtube_max_length
    );
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(cfg).context("Failed to serialize config")?
    );

    Ok(())
}
