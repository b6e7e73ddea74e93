//! Operational endpoints: health, liveness, metrics.

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use crate::health::{HealthReport, LIVE_TAG};
use crate::http::response::AppError;
use crate::http::server::AppState;

pub const HEALTH_PATH: &str = "/health";
pub const ALIVE_PATH: &str = "/alive";
pub const METRICS_PATH: &str = "/metrics";

/// Routes excluded from endpoint metrics.
pub fn is_system_route(route: &str) -> bool {
    matches!(route, HEALTH_PATH | ALIVE_PATH | METRICS_PATH)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(HEALTH_PATH, get(health_handler))
        .route(ALIVE_PATH, get(alive_handler))
        .route(METRICS_PATH, get(metrics_handler))
}

/// Every probe. Always 200; the body carries the status.
async fn health_handler(State(state): State<AppState>) -> Response {
    report_response(state.health.evaluate().await)
}

/// Liveness probes only.
async fn alive_handler(State(state): State<AppState>) -> Response {
    report_response(state.health.evaluate_filtered(LIVE_TAG).await)
}

fn report_response(report: HealthReport) -> Response {
    match report.to_json_pretty() {
        Ok(body) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json; charset=utf-8"),
            )],
            body,
        )
            .into_response(),
        Err(e) => AppError::Internal(format!("failed to serialize health report: {e}")).into_response(),
    }
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    let Some(handle) = state.metrics.as_ref() else {
        return AppError::NotFound("metrics are disabled".into()).into_response();
    };

    state.instrument.sample_uptime();
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; version=0.0.4"),
        )],
        handle.render(),
    )
        .into_response()
}
