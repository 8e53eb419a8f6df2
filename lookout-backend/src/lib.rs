pub mod config;
pub mod dynmap;
pub mod error;
pub mod grades;
pub mod helpers;
pub mod keepalive;
pub mod nations;
pub mod predict;
pub mod presence;
pub mod report;
pub mod scanner;
pub mod sessions;
mod validation;
pub mod webhook;

use axum::{Router, http::StatusCode, routing::get};
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Body of `GET /`, checked by the hosting platform.
pub const RUNNING_MESSAGE: &str = "Lookout scanner running";

/// Create the liveness router.
pub fn create_app(request_timeout: Duration) -> Router {
    Router::new()
        .route("/", get(|| async { RUNNING_MESSAGE }))
        .route("/health", get(|| async { StatusCode::OK }))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
}

/// HTTP client shared by the roster, nation, webhook and self-ping calls.
pub fn build_http_client(request_timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(request_timeout)
        .user_agent(concat!("lookout/", env!("CARGO_PKG_VERSION")))
        .build()
}
