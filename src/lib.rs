//! HTTP service host library.
//!
//! Builds an axum application behind a fixed request pipeline: forwarded
//! header normalization, error mapping, rate limiting, compression and
//! execution-time logging, plus health, liveness and metrics endpoints.

pub mod api;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::ServiceConfig;
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
