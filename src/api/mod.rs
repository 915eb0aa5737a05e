//! Loopback HTTP API.
//!
//! - `GET /video?url=&avpro=` answers with a playable URL (cached or live)
//! - `POST /cookies` stores a cookie export for yt-dlp
//! - every other path is served from the cache directory

pub mod policy;
pub mod routes_cookies;
pub mod routes_video;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use tokio::signal;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::cache::CacheStore;
use crate::config::Config;
use crate::cookies::CookieJar;
use crate::download::DownloadQueue;
use crate::resolver::Classifier;

pub use policy::RequestPolicy;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub policy: Arc<RequestPolicy>,
    pub classifier: Arc<Classifier>,

    /// `None` when the cache directory could not be provisioned; requests
    /// are then answered with live URLs only
    pub cache: Option<Arc<CacheStore>>,
    pub queue: DownloadQueue,
    pub cookies: CookieJar,
}

impl AppContext {
    /// Public URL of a cached file
    pub fn public_url(&self, file_name: &str) -> String {
        format!("{}/{}", self.config.web_server_url, file_name)
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let cache_dir = ctx.cache.as_ref().map(|cache| cache.dir().to_path_buf());

    let router = Router::new()
        .route("/video", get(routes_video::get_video))
        .route("/cookies", post(routes_cookies::post_cookies))
        .with_state(ctx);

    let router = match cache_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router.layer(TraceLayer::new_for_http())
}

/// Bind and serve until Ctrl+C or SIGTERM
pub async fn serve(listen_addr: &str, router: Router) -> Result<()> {
    let addr: SocketAddr = listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address: {}", listen_addr))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
