//! Forwarded header stage.
//!
//! The only stage allowed to change the client address and scheme of the
//! request context.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::http::request::RequestContext;
use crate::http::server::AppState;

pub async fn forwarded_headers_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let origin = req.extensions().get::<RequestContext>().map(|context| {
        state
            .forwarded
            .normalize(context.client_address(), context.scheme(), req.headers())
    });

    if let (Some(origin), Some(context)) = (origin, req.extensions_mut().get_mut::<RequestContext>()) {
        if origin.client_address != context.client_address() || origin.scheme != context.scheme() {
            tracing::debug!(
                correlation_id = %context.correlation_id(),
                peer = %context.client_address(),
                client = %origin.client_address,
                scheme = %origin.scheme,
                "Applied forwarded headers"
            );
        }
        context.set_origin(origin.client_address, origin.scheme);
    }

    next.run(req).await
}
