//! Per-request context.
//!
//! # Responsibilities
//! - Assign a correlation id (reuse `X-Request-ID` when the client sent one)
//! - Capture the transport-level peer address and scheme
//! - Carry the request start time for execution-time logging
//!
//! # Design Decisions
//! - The context lives in request extensions and is created by the first stage
//! - Client address and scheme are private; only the forwarded-header stage rewrites them
//! - Correlation ids are shared `Arc<str>` so cloning into log fields is cheap

use axum::http::{header::HeaderValue, HeaderName, Request};
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Correlation header echoed on every response.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Transport scheme as seen by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    /// Parse a scheme token, ignoring case and surrounding whitespace.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("http") {
            Some(Scheme::Http)
        } else if value.eq_ignore_ascii_case("https") {
            Some(Scheme::Https)
        } else {
            None
        }
    }

    pub fn is_https(&self) -> bool {
        matches!(self, Scheme::Https)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier tying together every log line and error report of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(Arc<str>);

impl CorrelationId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn generate() -> Self {
        Self(Arc::from(Uuid::new_v4().to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// UUID v4 generator for tower-http's request id layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestIdGenerator;

impl MakeRequestId for UuidRequestIdGenerator {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        Some(RequestId::new(HeaderValue::from_str(&id).ok()?))
    }
}

/// Per-request state shared by every pipeline stage.
#[derive(Debug, Clone)]
pub struct RequestContext {
    client_address: IpAddr,
    scheme: Scheme,
    path: String,
    correlation_id: CorrelationId,
    start_time: Instant,
}

impl RequestContext {
    pub fn new(
        client_address: IpAddr,
        scheme: Scheme,
        path: impl Into<String>,
        correlation_id: CorrelationId,
    ) -> Self {
        Self {
            client_address,
            scheme,
            path: path.into(),
            correlation_id,
            start_time: Instant::now(),
        }
    }

    pub fn client_address(&self) -> IpAddr {
        self.client_address
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    /// Replace the transport origin with the one reported by a trusted proxy.
    pub(crate) fn set_origin(&mut self, client_address: IpAddr, scheme: Scheme) {
        self.client_address = client_address;
        self.scheme = scheme;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_scheme_parsing() {
        assert_eq!(Scheme::parse("HTTPS"), Some(Scheme::Https));
        assert_eq!(Scheme::parse(" http "), Some(Scheme::Http));
        assert_eq!(Scheme::parse("ftp"), None);
        assert_eq!(Scheme::Https.to_string(), "https");
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = CorrelationId::generate();
        let b = CorrelationId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_origin_override() {
        let mut context = RequestContext::new(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            Scheme::Http,
            "/api",
            CorrelationId::new("abc"),
        );
        context.set_origin("203.0.113.7".parse().unwrap(), Scheme::Https);

        assert_eq!(context.client_address().to_string(), "203.0.113.7");
        assert!(context.scheme().is_https());
        assert_eq!(context.correlation_id().as_str(), "abc");
        assert_eq!(context.path(), "/api");
    }
}
