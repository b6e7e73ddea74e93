//! Health report wire format.
//!
//! ```json
//! {
//!   "status": "Degraded",
//!   "results": {
//!     "self": { "status": "Healthy", "description": "...", "data": {} },
//!     "db":   { "status": "Degraded", "description": "...", "data": { "lag": 3 } }
//!   }
//! }
//! ```
//!
//! `results` is keyed by probe name and preserves registration order in both
//! directions, which is why the (de)serialization is written by hand.

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::health::state::{HealthProbeResult, HealthStatus};

/// Overall health plus one entry per evaluated probe.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub results: Vec<HealthProbeResult>,
}

impl HealthReport {
    /// Build a report whose status is the worst of its results.
    pub fn from_results(results: Vec<HealthProbeResult>) -> Self {
        let status = HealthStatus::worst(results.iter().map(|result| result.status));
        Self { status, results }
    }

    pub fn result(&self, name: &str) -> Option<&HealthProbeResult> {
        self.results.iter().find(|result| result.name == name)
    }

    /// Indented JSON, as served by the health endpoints.
    pub fn to_json_pretty(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

#[derive(Serialize)]
struct ResultBodyRef<'a> {
    status: HealthStatus,
    description: &'a str,
    data: &'a Map<String, Value>,
}

#[derive(Deserialize)]
struct ResultBody {
    status: HealthStatus,
    #[serde(default)]
    description: String,
    #[serde(default)]
    data: Map<String, Value>,
}

struct ResultsByName<'a>(&'a [HealthProbeResult]);

impl Serialize for ResultsByName<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for result in self.0 {
            map.serialize_entry(
                &result.name,
                &ResultBodyRef {
                    status: result.status,
                    description: &result.description,
                    data: &result.data,
                },
            )?;
        }
        map.end()
    }
}

impl Serialize for HealthReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("status", &self.status)?;
        map.serialize_entry("results", &ResultsByName(&self.results))?;
        map.end()
    }
}

struct ResultsVisitor;

impl<'de> Visitor<'de> for ResultsVisitor {
    type Value = Vec<HealthProbeResult>;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a map of probe name to probe result")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut results = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((name, body)) = access.next_entry::<String, ResultBody>()? {
            results.push(HealthProbeResult {
                name,
                status: body.status,
                description: body.description,
                data: body.data,
            });
        }
        Ok(results)
    }
}

fn deserialize_results<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<HealthProbeResult>, D::Error> {
    deserializer.deserialize_map(ResultsVisitor)
}

#[derive(Deserialize)]
struct WireReport {
    status: HealthStatus,
    #[serde(default, deserialize_with = "deserialize_results")]
    results: Vec<HealthProbeResult>,
}

impl<'de> Deserialize<'de> for HealthReport {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WireReport::deserialize(deserializer)?;
        Ok(Self {
            status: wire.status,
            results: wire.results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::state::ProbeOutcome;

    fn sample() -> HealthReport {
        HealthReport::from_results(vec![
            HealthProbeResult::from_outcome("self", ProbeOutcome::healthy("running")),
            HealthProbeResult::from_outcome(
                "db",
                ProbeOutcome::degraded("replica lag").with_data("lag", 3).with_data("primary", "a"),
            ),
        ])
    }

    #[test]
    fn test_wire_shape() {
        let value: Value = serde_json::to_value(sample()).unwrap();

        assert_eq!(value["status"], "Degraded");
        assert_eq!(value["results"]["self"]["status"], "Healthy");
        assert_eq!(value["results"]["self"]["description"], "running");
        assert_eq!(value["results"]["db"]["data"]["lag"], 3);
        assert_eq!(value["results"]["db"]["data"]["primary"], "a");
    }

    #[test]
    fn test_result_order_survives_round_trip() {
        let report = sample();
        let parsed = HealthReport::from_json(&report.to_json_pretty().unwrap()).unwrap();

        assert_eq!(parsed, report);
        let names: Vec<_> = parsed.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["self", "db"]);
    }

    #[test]
    fn test_empty_report_is_healthy() {
        let report = HealthReport::from_results(Vec::new());
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(json, r#"{"status":"Healthy","results":{}}"#);
    }

    #[test]
    fn test_missing_optional_fields() {
        let report =
            HealthReport::from_json(br#"{"status":"Unhealthy","results":{"x":{"status":"Unhealthy"}}}"#)
                .unwrap();
        assert_eq!(report.results[0].description, "");
        assert!(report.results[0].data.is_empty());
    }
}
