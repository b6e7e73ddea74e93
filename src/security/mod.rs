//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (resolve client address and scheme from trusted proxies)
//!     → rate_limit.rs (admit, queue or reject per client partition)
//!     → Pass to handler
//! ```
//!
//! # Design Decisions
//! - Rate limit partitions are keyed on the normalized client address
//! - No trust in forwarded headers from peers outside the trust policy

pub mod headers;
pub mod rate_limit;

pub use headers::{ForwardedHeaderNormalizer, ForwardedOrigin, ProxyTrust};
pub use rate_limit::{
    Admission, PartitionUsage, PolicyRoutes, RateLimitError, RateLimitPolicy, RateLimiter, Waiter,
};
