//! Forwarding stub client.
//!
//! The host application runs the stub with a yt-dlp argument vector. The
//! stub picks out the source URL and whether the host asked for a
//! progressive stream, asks the daemon's `GET /video`, and hands back the
//! URL it got.

use thiserror::Error;

/// Env var overriding the daemon base URL
pub const URL_ENV: &str = "VCACHE_URL";

/// Daemon base URL when [`URL_ENV`] is unset
pub const DEFAULT_BASE_URL: &str = "http://localhost:9696";

/// Format-selector fragment the host uses for single-file streams
const PROGRESSIVE_SELECTOR: &str = "[protocol^=http]";

/// Errors that can occur in the stub
#[derive(Debug, Error)]
pub enum StubError {
    #[error("No URL found in arguments")]
    NoUrl,

    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Daemon answered HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Daemon answered with something that is not a URL: {0:?}")]
    NotAUrl(String),
}

/// What the host asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubRequest {
    pub url: String,
    pub avpro: bool,
}

impl StubRequest {
    /// Parse a yt-dlp style argument vector (program name excluded)
    pub fn from_args<I, S>(args: I) -> Result<Self, StubError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut url = None;
        let mut avpro = true;

        for arg in args {
            let arg = arg.as_ref();
            if arg.contains(PROGRESSIVE_SELECTOR) {
                avpro = false;
                continue;
            }
            if url.is_none() && starts_with_http(arg) {
                url = Some(arg.to_string());
            }
        }

        Ok(Self {
            url: url.ok_or(StubError::NoUrl)?,
            avpro,
        })
    }
}

fn starts_with_http(arg: &str) -> bool {
    arg.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("http"))
}

/// Daemon base URL from the environment
pub fn base_url() -> String {
    std::env::var(URL_ENV)
        .ok()
        .filter(|v| !v.is_empty())
        .map(|v| v.trim_end_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

/// Ask the daemon for a playable URL
pub async fn request_url(base_url: &str, request: &StubRequest) -> Result<String, StubError> {
    let endpoint = format!("{}/video", base_url);
    let avpro = if request.avpro { "true" } else { "false" };

    let response = reqwest::Client::new()
        .get(&endpoint)
        .query(&[("url", request.url.as_str()), ("avpro", avpro)])
        .send()
        .await
        .map_err(|source| StubError::Request {
            url: endpoint.clone(),
            source,
        })?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|source| StubError::Request {
            url: endpoint.clone(),
            source,
        })?;
    let body = body.trim().to_string();

    if !status.is_success() {
        return Err(StubError::Status {
            status: status.as_u16(),
            body,
        });
    }
    if !starts_with_http(&body) {
        return Err(StubError::NotAUrl(body));
    }

    Ok(body)
}
