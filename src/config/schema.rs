//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service host.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Root configuration for the service host.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Instance identity and error reporting.
    pub server: ServerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Forwarded header handling.
    pub forwarded_headers: ForwardedHeadersConfig,

    /// Response compression settings.
    pub compression: CompressionConfig,

    /// Health probe settings.
    pub health: HealthConfig,

    /// Rate limiting policies and route attachments.
    pub rate_limit: RateLimitConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Instance-level server settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Identity reported in problem responses. Falls back to the host name.
    pub node_id: Option<String>,

    /// Include fault details in 5xx problem responses.
    pub expose_error_details: bool,

    /// Requests slower than this are logged and counted as long executions.
    pub request_log_threshold_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            node_id: None,
            expose_error_details: false,
            request_log_threshold_ms: 10_000,
        }
    }
}

impl ServerConfig {
    /// Resolve the node identity: configured value, then `HOSTNAME`/`COMPUTERNAME`.
    pub fn resolve_node_id(&self) -> String {
        self.node_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .or_else(|| std::env::var("HOSTNAME").ok())
            .or_else(|| std::env::var("COMPUTERNAME").ok())
            .unwrap_or_else(|| "localhost".to_string())
    }

    pub fn request_log_threshold(&self) -> Duration {
        Duration::from_millis(self.request_log_threshold_ms)
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Time allowed for in-flight requests to finish on shutdown, after which
    /// the server stops waiting for them.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            shutdown_grace_secs: 10,
        }
    }
}

impl TimeoutConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Forwarded header (X-Forwarded-*) handling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ForwardedHeadersConfig {
    /// Enable forwarded header normalization.
    pub enabled: bool,

    /// Honor `X-Forwarded-For`.
    pub forward_for: bool,

    /// Honor `X-Forwarded-Proto`.
    pub forward_proto: bool,

    /// Accept forwarded headers from any peer.
    ///
    /// Only safe when a single controlled ingress sits in front of the service.
    pub trust_all_proxies: bool,

    /// Peers whose forwarded headers are honored when `trust_all_proxies` is off.
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for ForwardedHeadersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            forward_for: true,
            forward_proto: true,
            trust_all_proxies: true,
            trusted_proxies: Vec::new(),
        }
    }
}

/// Response compression configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Enable response compression.
    pub enabled: bool,

    /// Allow compression over HTTPS (compression-oracle attacks apply).
    pub enable_for_https: bool,

    /// Responses smaller than this are sent as-is.
    pub min_size_bytes: usize,

    /// MIME types eligible for compression.
    pub mime_types: Vec<String>,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            enable_for_https: false,
            min_size_bytes: 1024,
            mime_types: vec!["application/json".to_string()],
        }
    }
}

/// Health endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Per-probe timeout in milliseconds.
    pub probe_timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 5_000,
        }
    }
}

impl HealthConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Named fixed-window policies.
    pub policies: Vec<RateLimitPolicyConfig>,

    /// Route prefixes bound to a policy.
    pub routes: Vec<RateLimitRouteConfig>,

    /// Partitions idle for this many windows are dropped.
    pub idle_windows: u32,

    /// Interval between idle partition sweeps in seconds.
    pub cleanup_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            policies: Vec::new(),
            routes: Vec::new(),
            idle_windows: 3,
            cleanup_interval_secs: 60,
        }
    }
}

/// A named fixed-window policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitPolicyConfig {
    /// Policy name referenced by routes.
    pub name: String,

    /// Window length in seconds.
    pub window: u64,

    /// Requests admitted per window and partition.
    pub permit_limit: u32,

    /// Requests allowed to wait for the next window.
    #[serde(default)]
    pub queue_limit: u32,
}

/// Binds a path prefix to a policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitRouteConfig {
    /// Request path prefix (e.g., "/api/v1/limit").
    pub path_prefix: String,

    /// Name of the policy to apply.
    pub policy: String,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the `/metrics` scrape endpoint.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
        }
    }
}
