//! Health status values and probe results.
//!
//! # States
//! - Healthy: the component works as expected
//! - Degraded: the component works with reduced capability
//! - Unhealthy: the component does not work
//!
//! # Design Decisions
//! - Variants are ordered by severity, so the overall status is simply the maximum
//! - Probe data is an ordered JSON map; values keep their runtime type on the wire

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Severity-ordered health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// The most severe status of a set. An empty set is healthy.
    pub fn worst(statuses: impl IntoIterator<Item = HealthStatus>) -> HealthStatus {
        statuses.into_iter().max().unwrap_or(HealthStatus::Healthy)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "Healthy",
            HealthStatus::Degraded => "Degraded",
            HealthStatus::Unhealthy => "Unhealthy",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a probe reports about its component.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub status: HealthStatus,
    pub description: String,
    pub data: Map<String, Value>,
}

impl ProbeOutcome {
    pub fn new(status: HealthStatus, description: impl Into<String>) -> Self {
        Self {
            status,
            description: description.into(),
            data: Map::new(),
        }
    }

    pub fn healthy(description: impl Into<String>) -> Self {
        Self::new(HealthStatus::Healthy, description)
    }

    pub fn degraded(description: impl Into<String>) -> Self {
        Self::new(HealthStatus::Degraded, description)
    }

    pub fn unhealthy(description: impl Into<String>) -> Self {
        Self::new(HealthStatus::Unhealthy, description)
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// Result of one named probe within a health report.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthProbeResult {
    pub name: String,
    pub status: HealthStatus,
    pub description: String,
    pub data: Map<String, Value>,
}

impl HealthProbeResult {
    pub fn from_outcome(name: impl Into<String>, outcome: ProbeOutcome) -> Self {
        Self {
            name: name.into(),
            status: outcome.status,
            description: outcome.description,
            data: outcome.data,
        }
    }
}
