//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → handed to the pipeline builder at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; rate limit policies live for the process lifetime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    CompressionConfig, ForwardedHeadersConfig, HealthConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, RateLimitConfig, RateLimitPolicyConfig, RateLimitRouteConfig,
    ServerConfig, ServiceConfig, TimeoutConfig, TlsConfig,
};
