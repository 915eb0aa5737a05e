use axum::extract::State;
use axum::http::StatusCode;

use super::AppContext;
use crate::cookies::CookieError;

pub async fn post_cookies(State(ctx): State<AppContext>, body: String) -> (StatusCode, &'static str) {
    match ctx.cookies.store(&body).await {
        Ok(()) => {
            tracing::info!("Received YouTube cookies from browser extension");
            if !ctx.cookies.enabled() {
                tracing::warn!("ytdl_use_cookies is off, stored cookies will not be used");
            }
            (StatusCode::OK, "Cookies received.")
        }
        Err(CookieError::Invalid) => {
            tracing::error!("Invalid cookies received, not saving");
            (StatusCode::BAD_REQUEST, "Invalid cookies.")
        }
        Err(e) => {
            tracing::error!("Failed to store cookies at {}: {}", ctx.cookies.path().display(), e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to store cookies.")
        }
    }
}
