//! Execution time logging stage.
//!
//! Counts each routed request against its endpoint and flags requests that
//! exceed the configured threshold. Health and metrics endpoints are not counted.

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::http::endpoints::is_system_route;
use crate::http::request::RequestContext;
use crate::http::server::AppState;
use crate::observability::EndpointTags;

pub async fn time_logging_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let context = req.extensions().get::<RequestContext>().cloned();
    let started = context
        .as_ref()
        .map(RequestContext::start_time)
        .unwrap_or_else(Instant::now);
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned());
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let response = next.run(req).await;

    if let Some(route) = route.as_deref().filter(|route| !is_system_route(route)) {
        let tags = EndpointTags::from_route(route);
        state
            .instrument
            .record_request(&tags.area, &tags.controller, &tags.action);
    }

    let elapsed = started.elapsed();
    if elapsed > state.log_threshold {
        tracing::warn!(
            correlation_id = context.as_ref().map(|c| c.correlation_id().as_str()),
            %method,
            %path,
            status = response.status().as_u16(),
            elapsed_ms = elapsed.as_millis() as u64,
            threshold_ms = state.log_threshold.as_millis() as u64,
            "Request exceeded execution time threshold"
        );
        state.instrument.record_long_request();
    }

    response
}
