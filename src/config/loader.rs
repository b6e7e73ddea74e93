//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ServiceConfig, ConfigError> {
    let config: ServiceConfig = toml::from_str(content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogFormat;

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert!(config.rate_limit.policies.is_empty());
        assert!(config.forwarded_headers.trust_all_proxies);
        assert_eq!(config.compression.min_size_bytes, 1024);
    }

    #[test]
    fn test_parses_policies_and_routes() {
        let config = parse_config(
            r#"
            [server]
            node_id = "node-a"

            [observability]
            log_format = "json"

            [[rate_limit.policies]]
            name = "default"
            window = 10
            permit_limit = 5
            queue_limit = 2

            [[rate_limit.routes]]
            path_prefix = "/api/v1/limit"
            policy = "default"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.resolve_node_id(), "node-a");
        assert_eq!(config.observability.log_format, LogFormat::Json);
        let policy = &config.rate_limit.policies[0];
        assert_eq!(policy.window, 10);
        assert_eq!(policy.permit_limit, 5);
        assert_eq!(policy.queue_limit, 2);
        assert_eq!(config.rate_limit.routes[0].policy, "default");
    }

    #[test]
    fn test_semantic_errors_are_reported() {
        let err = parse_config(
            r#"
            [[rate_limit.policies]]
            name = "default"
            window = 0
            permit_limit = 1
            "#,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::Validation(ref errors) if errors.len() == 1));
        assert!(err.to_string().contains("window > 0"));
    }

    #[test]
    fn test_syntax_errors_are_reported() {
        let err = parse_config("[listener\nbind_address = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
