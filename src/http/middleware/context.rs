//! Request context creation.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tower_http::request_id::RequestId;

use crate::http::request::{CorrelationId, RequestContext};
use crate::http::server::AppState;

/// Attach a [`RequestContext`] built from the transport connection.
pub async fn context_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    let correlation_id = req
        .extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .map(CorrelationId::new)
        .unwrap_or_else(CorrelationId::generate);

    let context = RequestContext::new(
        peer,
        state.transport_scheme,
        req.uri().path(),
        correlation_id,
    );
    req.extensions_mut().insert(context);

    next.run(req).await
}
