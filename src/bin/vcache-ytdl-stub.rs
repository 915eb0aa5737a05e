//! Drop-in replacement for the host application's yt-dlp binary.
//!
//! Prints the URL the vcache daemon hands back and exits 0, or logs to
//! stderr and exits 1.

use std::process::ExitCode;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vcache::stub::{self, StubRequest};

#[tokio::main]
async fn main() -> ExitCode {
    // stdout carries the resolved URL only
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    tracing::debug!("Invoked with: {}", args.join(" "));

    let request = match StubRequest::from_args(&args) {
        Ok(request) => request,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match stub::request_url(&stub::base_url(), &request).await {
        Ok(url) => {
            println!("{}", url);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
