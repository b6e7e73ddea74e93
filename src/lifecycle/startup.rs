//! Startup information.
//!
//! # Responsibilities
//! - Log what is starting, where, and with which notable settings
//! - Warn about configurations that are only safe behind a controlled ingress
//!
//! # Design Decisions
//! - Called once, after logging is initialized and before the listener binds

use crate::config::ServiceConfig;

/// Runtime facts reported at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupInfo {
    pub version: &'static str,
    pub os: &'static str,
    pub arch: &'static str,
    pub working_directory: String,
    pub worker_threads: Option<usize>,
    pub node_id: String,
    pub metrics_enabled: bool,
}

impl StartupInfo {
    pub fn collect(config: &ServiceConfig) -> Self {
        let working_directory = std::env::current_dir()
            .map(|dir| dir.display().to_string())
            .unwrap_or_else(|_| "<unknown>".to_string());
        let worker_threads = tokio::runtime::Handle::try_current()
            .ok()
            .map(|handle| handle.metrics().num_workers());

        Self {
            version: env!("CARGO_PKG_VERSION"),
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            working_directory,
            worker_threads,
            node_id: config.server.resolve_node_id(),
            metrics_enabled: config.observability.metrics_enabled,
        }
    }
}

pub fn log_startup_information(config: &ServiceConfig) {
    let info = StartupInfo::collect(config);

    tracing::info!(
        version = info.version,
        os = info.os,
        arch = info.arch,
        working_directory = %info.working_directory,
        worker_threads = info.worker_threads,
        node_id = %info.node_id,
        metrics_enabled = info.metrics_enabled,
        "service-host starting"
    );

    tracing::info!(
        bind_address = %config.listener.bind_address,
        tls = config.listener.tls.is_some(),
        request_timeout_secs = config.timeouts.request_secs,
        rate_limit_policies = config.rate_limit.policies.len(),
        rate_limit_routes = config.rate_limit.routes.len(),
        compression = config.compression.enabled,
        "Configuration loaded"
    );

    let forwarded = &config.forwarded_headers;
    if forwarded.enabled && forwarded.trust_all_proxies {
        tracing::warn!(
            "Forwarded headers are accepted from every peer; only safe behind a controlled ingress"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collect_reports_runtime() {
        let mut config = ServiceConfig::default();
        config.server.node_id = Some("node-a".into());

        let info = StartupInfo::collect(&config);
        assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(info.node_id, "node-a");
        assert!(info.worker_threads.is_some());
        assert!(info.metrics_enabled);
    }
}
