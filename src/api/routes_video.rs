//! `GET /video`, the hot path.
//!
//! Cache hits answer immediately. Misses answer with a live URL and queue a
//! background download unless a policy rule says not to cache.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::Deserialize;

use super::AppContext;
use crate::domain::{DownloadFormat, VideoInfo};

#[derive(Debug, Deserialize)]
pub struct VideoQuery {
    pub url: Option<String>,
    pub avpro: Option<String>,
}

impl VideoQuery {
    /// Only a literal `true` (any case) asks for the demuxed tier
    pub fn avpro(&self) -> bool {
        self.avpro
            .as_deref()
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }
}

pub async fn get_video(
    State(ctx): State<AppContext>,
    Query(query): Query<VideoQuery>,
) -> (StatusCode, String) {
    let mut avpro = query.avpro();
    let Some(url) = query.url.filter(|u| !u.is_empty()) else {
        tracing::warn!("No URL provided");
        return (StatusCode::BAD_REQUEST, "No URL provided.".to_string());
    };
    tracing::info!("Request URL: {} (avpro: {})", url, avpro);

    // Blocked URLs get the placeholder whatever is on disk
    if ctx.policy.is_blocked(&url) {
        tracing::info!("URL is blocked, answering with placeholder");
        return (StatusCode::OK, ctx.policy.placeholder_url.clone());
    }

    let info = ctx.classifier.classify(&url, avpro).await;

    if let Some(file_name) = cached_file_name(&ctx, &info, avpro).await {
        let public = ctx.public_url(&file_name);
        tracing::info!("Responding with cached URL: {}", public);
        return (StatusCode::OK, public);
    }

    let mut will_cache = true;
    if ctx.cache.is_none() {
        tracing::debug!("Cache unavailable, serving live only");
        will_cache = false;
    }
    if !info.has_id() {
        tracing::info!("No video id for {}, serving live only", url);
        will_cache = false;
    }
    if ctx.policy.bypasses_cache(&url) {
        tracing::info!("URL is on the no-cache list, serving live only");
        will_cache = false;
    }
    if ctx.policy.forces_progressive(&url) {
        avpro = false;
    }

    let live = match ctx.classifier.playback_url(&info, avpro).await {
        Ok(live) => live,
        Err(e) => {
            tracing::error!("Failed to resolve {}: {}", url, e);
            return (StatusCode::BAD_GATEWAY, "Failed to resolve URL.".to_string());
        }
    };
    tracing::info!("Responding with live URL: {}", live);

    if will_cache {
        ctx.queue.enqueue(info);
    }

    (StatusCode::OK, live)
}

/// Name of a cached file for this request, trying mp4 when webm is missing
async fn cached_file_name(ctx: &AppContext, info: &VideoInfo, avpro: bool) -> Option<String> {
    let cache = ctx.cache.as_ref()?;
    if !info.has_id() {
        return None;
    }

    let preferred = info.file_name_for(DownloadFormat::for_avpro(avpro));
    if cache.lookup(&preferred).await.is_some() {
        return Some(preferred);
    }

    if avpro {
        let fallback = info.file_name_for(DownloadFormat::Mp4);
        if cache.lookup(&fallback).await.is_some() {
            return Some(fallback);
        }
    }

    None
}
