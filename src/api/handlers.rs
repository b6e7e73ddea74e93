//! Sample route handlers.

use axum::http::StatusCode;
use std::time::Duration;

/// Service banner.
pub async fn index() -> &'static str {
    "API Service"
}

pub async fn test_execute() -> StatusCode {
    StatusCode::OK
}

pub async fn version_v1() -> &'static str {
    "v1"
}

pub async fn version_v2() -> &'static str {
    "v2"
}

/// Simulated work behind the `default` rate limit policy.
pub async fn limit_daily() -> StatusCode {
    tracing::info!("Request start");
    tokio::time::sleep(Duration::from_millis(100)).await;
    tracing::info!("Request end");
    StatusCode::OK
}
