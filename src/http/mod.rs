//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, connect info, graceful shutdown)
//!     → pipeline.rs (fixed stage order)
//!         → middleware/context.rs         (request.rs: RequestContext)
//!         → middleware/forwarded.rs
//!         → middleware/error_handler.rs   (response.rs: ProblemResponse)
//!         → middleware/rate_limit.rs
//!         → middleware/compression.rs     (compression.rs: negotiation)
//!         → middleware/time_logging.rs
//!     → endpoints.rs / api routes
//!     → Send to client
//! ```

pub mod compression;
pub mod endpoints;
pub mod middleware;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod server;

pub use compression::{CompressionNegotiator, ContentCoding};
pub use pipeline::{Stage, PIPELINE};
pub use request::{CorrelationId, RequestContext, Scheme, X_REQUEST_ID};
pub use response::{AppError, ErrorMapper, Fault, ProblemResponse};
pub use server::{build_router, build_router_with, AppState, HttpServer, ServerError};
