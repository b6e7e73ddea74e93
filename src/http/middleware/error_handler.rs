//! Error handler stage.
//!
//! Renders every fault raised further down the pipeline, including panics
//! and requests that outlive the request timeout, as a problem document
//! carrying the node id and correlation id.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;

use crate::health::aggregator::panic_message;
use crate::http::request::RequestContext;
use crate::http::response::{AppError, Fault};
use crate::http::server::AppState;

pub async fn error_handler_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let correlation_id = req
        .extensions()
        .get::<RequestContext>()
        .map(|context| context.correlation_id().clone());
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let handled = AssertUnwindSafe(next.run(req)).catch_unwind();
    let outcome = match tokio::time::timeout(state.request_timeout, handled).await {
        Ok(outcome) => outcome,
        // Dropping the inner future also withdraws a queued rate limit waiter.
        Err(_) => Ok(AppError::Timeout(state.request_timeout).into_response()),
    };

    match outcome {
        Ok(mut response) => match response.extensions_mut().remove::<Fault>() {
            Some(fault) => {
                if fault.status.is_server_error() {
                    tracing::error!(
                        correlation_id = correlation_id.as_ref().map(|id| id.as_str()),
                        %method,
                        %path,
                        status = fault.status.as_u16(),
                        error = %fault.message,
                        "Request failed"
                    );
                } else {
                    tracing::debug!(
                        correlation_id = correlation_id.as_ref().map(|id| id.as_str()),
                        %method,
                        %path,
                        status = fault.status.as_u16(),
                        error = %fault.message,
                        "Request rejected"
                    );
                }
                state.errors.map(&fault, correlation_id.as_ref()).into_response()
            }
            None => response,
        },
        Err(panic) => {
            let message = panic_message(&*panic);
            tracing::error!(
                correlation_id = correlation_id.as_ref().map(|id| id.as_str()),
                %method,
                %path,
                panic = %message,
                "Unhandled panic while processing request"
            );
            state
                .errors
                .map_panic(&message, correlation_id.as_ref())
                .into_response()
        }
    }
}
