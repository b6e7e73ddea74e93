//! Request pipeline composition.
//!
//! # Stage Order (outermost first)
//! ```text
//! Context          request id, trace span, RequestContext
//! ForwardedHeaders client address and scheme from trusted proxies
//! ErrorHandler     request timeout; faults, panics and timeouts → problem documents
//! RateLimiting     admit / queue / reject per client
//! Compression      gzip eligible responses
//! TimeLogging      endpoint counters, slow request warnings
//! handler
//! ```
//!
//! # Design Decisions
//! - The order is a single constant; nothing else decides it
//! - Rate limiting sees normalized client addresses because forwarded headers run first
//! - Rejections produced by rate limiting still pass through the error handler
//! - The request timeout is enforced by the error handler, so a slow handler or
//!   a long rate limit queue wait still ends in a problem document

use axum::{middleware::from_fn_with_state, Router};
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::http::middleware::{
    compression_middleware, context_middleware, error_handler_middleware,
    forwarded_headers_middleware, rate_limit_middleware, time_logging_middleware,
};
use crate::http::request::{UuidRequestIdGenerator, X_REQUEST_ID};
use crate::http::server::AppState;

/// A pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Context,
    ForwardedHeaders,
    ErrorHandler,
    RateLimiting,
    Compression,
    TimeLogging,
}

/// Stages in request order.
pub const PIPELINE: [Stage; 6] = [
    Stage::Context,
    Stage::ForwardedHeaders,
    Stage::ErrorHandler,
    Stage::RateLimiting,
    Stage::Compression,
    Stage::TimeLogging,
];

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Context => "context",
            Stage::ForwardedHeaders => "forwarded_headers",
            Stage::ErrorHandler => "error_handler",
            Stage::RateLimiting => "rate_limiting",
            Stage::Compression => "compression",
            Stage::TimeLogging => "time_logging",
        }
    }

    /// Wrap `router` in this stage.
    fn apply(self, router: Router, state: &AppState) -> Router {
        let state = state.clone();
        match self {
            // Applied inside out: request id is set first.
            Stage::Context => router
                .layer(from_fn_with_state(state, context_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(X_REQUEST_ID.clone()))
                .layer(SetRequestIdLayer::new(
                    X_REQUEST_ID.clone(),
                    UuidRequestIdGenerator,
                )),
            Stage::ForwardedHeaders => {
                router.layer(from_fn_with_state(state, forwarded_headers_middleware))
            }
            Stage::ErrorHandler => router.layer(from_fn_with_state(state, error_handler_middleware)),
            Stage::RateLimiting => router.layer(from_fn_with_state(state, rate_limit_middleware)),
            Stage::Compression => router.layer(from_fn_with_state(state, compression_middleware)),
            Stage::TimeLogging => router.layer(from_fn_with_state(state, time_logging_middleware)),
        }
    }
}

/// Wrap the application routes in every stage of [`PIPELINE`].
///
/// Layers added later sit further out, so stages are applied in reverse.
pub fn build_pipeline(router: Router, state: &AppState) -> Router {
    PIPELINE
        .iter()
        .rev()
        .fold(router, |router, stage| stage.apply(router, state))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_is_fixed() {
        let names: Vec<_> = PIPELINE.iter().map(Stage::name).collect();
        assert_eq!(
            names,
            [
                "context",
                "forwarded_headers",
                "error_handler",
                "rate_limiting",
                "compression",
                "time_logging"
            ]
        );
    }
}
