//! Sample application routes.
//!
//! Placeholders that give the pipeline something to wrap; they hold no
//! business logic.

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};

use self::handlers::*;
use crate::http::server::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/test/execute", get(test_execute))
        .route("/api/v1/version/get", get(version_v1))
        .route("/api/v2/version/get", get(version_v2))
        .route("/api/v1/limit/daily", post(limit_daily))
}
