//! Pipeline stage middleware.
//!
//! Each stage is an `axum::middleware::from_fn_with_state` function over
//! [`AppState`](crate::http::server::AppState). Ordering is owned by
//! [`pipeline`](crate::http::pipeline).

pub mod compression;
pub mod context;
pub mod error_handler;
pub mod forwarded;
pub mod rate_limit;
pub mod time_logging;

pub use compression::compression_middleware;
pub use context::context_middleware;
pub use error_handler::error_handler_middleware;
pub use forwarded::forwarded_headers_middleware;
pub use rate_limit::rate_limit_middleware;
pub use time_logging::time_logging_middleware;
