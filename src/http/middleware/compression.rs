//! Response compression stage.

use axum::{
    body::{self, Body},
    extract::State,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::request::RequestContext;
use crate::http::response::AppError;
use crate::http::server::AppState;

pub async fn compression_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let accept_encoding = req
        .headers()
        .get(header::ACCEPT_ENCODING)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let is_https = req
        .extensions()
        .get::<RequestContext>()
        .is_some_and(|context| context.scheme().is_https());

    let response = next.run(req).await;

    let negotiator = &state.compression;
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());

    // Cheap checks first, so ineligible bodies are never buffered.
    if accept_encoding.is_none()
        || !negotiator.allows_transport(is_https)
        || response.headers().contains_key(header::CONTENT_ENCODING)
        || !content_type.is_some_and(|ct| negotiator.is_compressible(ct))
    {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return AppError::Internal(format!("failed to read response body: {e}")).into_response()
        }
    };

    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());
    if !negotiator.should_compress(content_type, bytes.len(), is_https, accept_encoding.as_deref()) {
        return Response::from_parts(parts, Body::from(bytes));
    }

    match negotiator.compress(&bytes) {
        Ok(compressed) => {
            parts
                .headers
                .insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
            parts.headers.remove(header::CONTENT_LENGTH);
            parts
                .headers
                .append(header::VARY, HeaderValue::from_static("accept-encoding"));
            Response::from_parts(parts, Body::from(compressed))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Response compression failed, sending uncompressed body");
            Response::from_parts(parts, Body::from(bytes))
        }
    }
}
