//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes reference existing policies)
//! - Validate value ranges (windows > 0, permit limits >= 1)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ServiceConfig;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    InvalidBindAddress(String),

    #[error("timeouts.request_secs must be greater than 0")]
    ZeroRequestTimeout,

    #[error("rate limit policy name must not be empty")]
    EmptyPolicyName,

    #[error("rate limit policy '{0}' is defined more than once")]
    DuplicatePolicy(String),

    #[error("rate limit policy '{0}' must have window > 0")]
    ZeroWindow(String),

    #[error("rate limit policy '{0}' must have permit_limit >= 1")]
    ZeroPermitLimit(String),

    #[error("rate limit route '{prefix}' references unknown policy '{policy}'")]
    UnknownPolicy { prefix: String, policy: String },

    #[error("rate limit route prefix '{0}' must start with '/'")]
    InvalidRoutePrefix(String),

    #[error("rate_limit.idle_windows must be greater than 0")]
    ZeroIdleWindows,

    #[error("health.probe_timeout_ms must be greater than 0")]
    ZeroProbeTimeout,

    #[error("forwarded_headers.trusted_proxies is empty while trust_all_proxies is off")]
    NoTrustedProxies,
}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    let mut names = HashSet::new();
    for policy in &config.rate_limit.policies {
        if policy.name.trim().is_empty() {
            errors.push(ValidationError::EmptyPolicyName);
            continue;
        }
        if !names.insert(policy.name.as_str()) {
            errors.push(ValidationError::DuplicatePolicy(policy.name.clone()));
        }
        if policy.window == 0 {
            errors.push(ValidationError::ZeroWindow(policy.name.clone()));
        }
        if policy.permit_limit == 0 {
            errors.push(ValidationError::ZeroPermitLimit(policy.name.clone()));
        }
    }

    for route in &config.rate_limit.routes {
        if !route.path_prefix.starts_with('/') {
            errors.push(ValidationError::InvalidRoutePrefix(route.path_prefix.clone()));
        }
        if !names.contains(route.policy.as_str()) {
            errors.push(ValidationError::UnknownPolicy {
                prefix: route.path_prefix.clone(),
                policy: route.policy.clone(),
            });
        }
    }

    if config.rate_limit.idle_windows == 0 {
        errors.push(ValidationError::ZeroIdleWindows);
    }

    if config.health.probe_timeout_ms == 0 {
        errors.push(ValidationError::ZeroProbeTimeout);
    }

    let forwarded = &config.forwarded_headers;
    if forwarded.enabled && !forwarded.trust_all_proxies && forwarded.trusted_proxies.is_empty() {
        errors.push(ValidationError::NoTrustedProxies);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{RateLimitPolicyConfig, RateLimitRouteConfig};

    fn policy(name: &str, window: u64, permit_limit: u32) -> RateLimitPolicyConfig {
        RateLimitPolicyConfig {
            name: name.to_string(),
            window,
            permit_limit,
            queue_limit: 0,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ServiceConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = ServiceConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.rate_limit.policies.push(policy("default", 0, 0));
        config.rate_limit.routes.push(RateLimitRouteConfig {
            path_prefix: "/api".into(),
            policy: "missing".into(),
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::ZeroWindow("default".into())));
        assert!(errors.contains(&ValidationError::ZeroPermitLimit("default".into())));
        assert!(errors.contains(&ValidationError::UnknownPolicy {
            prefix: "/api".into(),
            policy: "missing".into(),
        }));
    }

    #[test]
    fn test_rejects_duplicate_policies() {
        let mut config = ServiceConfig::default();
        config.rate_limit.policies.push(policy("default", 10, 1));
        config.rate_limit.policies.push(policy("default", 20, 2));

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::DuplicatePolicy("default".into())]);
    }

    #[test]
    fn test_explicit_trust_requires_proxies() {
        let mut config = ServiceConfig::default();
        config.forwarded_headers.trust_all_proxies = false;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::NoTrustedProxies]);

        config.forwarded_headers.trusted_proxies.push("10.0.0.1".parse().unwrap());
        assert!(validate_config(&config).is_ok());
    }
}
