//! Rate limiting stage.
//!
//! Requests whose path is bound to a policy are admitted, queued or rejected
//! per client address. A queued request is held here until its window opens;
//! if the client goes away first the waiter is dropped and leaves the queue.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Duration;

use crate::http::request::{CorrelationId, RequestContext};
use crate::http::response::AppError;
use crate::http::server::AppState;
use crate::security::Admission;

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(policy) = state.rate_limit_routes.policy_for(req.uri().path()) else {
        return next.run(req).await;
    };

    let context = req.extensions().get::<RequestContext>();
    let partition = context
        .map(|context| context.client_address().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let correlation_id = context.map(|context| context.correlation_id().clone());

    match state.rate_limiter.admit(policy, &partition) {
        Ok(Admission::Allowed) => next.run(req).await,
        Ok(Admission::Queued(waiter)) => {
            tracing::debug!(
                correlation_id = correlation_id.as_ref().map(|id| id.as_str()),
                policy,
                partition = %partition,
                "Request queued by rate limiter"
            );
            match waiter.admitted().await {
                Ok(()) => next.run(req).await,
                Err(e) => AppError::from(e).into_response(),
            }
        }
        Ok(Admission::Rejected { retry_after }) => {
            tracing::warn!(
                correlation_id = correlation_id.as_ref().map(|id| id.as_str()),
                policy,
                partition = %partition,
                retry_after_secs = retry_after_secs(retry_after),
                "Rate limit exceeded"
            );
            rejection(&state, retry_after, correlation_id.as_ref())
        }
        Err(e) => AppError::from(e).into_response(),
    }
}

fn rejection(
    state: &AppState,
    retry_after: Duration,
    correlation_id: Option<&CorrelationId>,
) -> Response {
    let seconds = retry_after_secs(retry_after);
    let mut response = state
        .errors
        .problem(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests. Please retry later.",
            correlation_id,
        )
        .into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
    response
}

/// Whole seconds, rounded up, never zero.
fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_millis(1500)), 2);
        assert_eq!(retry_after_secs(Duration::from_secs(10)), 10);
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
    }
}
