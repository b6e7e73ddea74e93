//! Application metrics.
//!
//! # Responsibilities
//! - Count requests per endpoint (area, controller, action)
//! - Count requests exceeding the execution-time threshold
//! - Report process uptime, sampled when the metrics are read
//! - Expose everything through a Prometheus recorder
//!
//! # Metrics
//! - `api_request_execution_total` (counter): requests by area, controller, action
//! - `api_request_long_execution_total` (counter): requests over the threshold
//! - `application_uptime_seconds` (counter): seconds since process start
//! - `rate_limit_rejected_total`, `rate_limit_queued_total` (counter): by policy
//!
//! # Design Decisions
//! - Recording after [`MetricsInstrument::dispose`] is a silent no-op
//! - Local atomic totals mirror the exported counters for in-process inspection

use arc_swap::ArcSwapOption;
use metrics::{counter, describe_counter, Counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

pub const REQUEST_EXECUTION_TOTAL: &str = "api_request_execution_total";
pub const REQUEST_LONG_EXECUTION_TOTAL: &str = "api_request_long_execution_total";
pub const APPLICATION_UPTIME_SECONDS: &str = "application_uptime_seconds";

static PROCESS_STARTED_AT: OnceLock<Instant> = OnceLock::new();
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Instant the process started. The first call pins it, so call it early in `main`.
pub fn process_started_at() -> Instant {
    *PROCESS_STARTED_AT.get_or_init(Instant::now)
}

/// Install the global Prometheus recorder once and return its handle.
///
/// When another recorder is already installed a detached recorder is used,
/// which renders an empty exposition.
pub fn init_prometheus_recorder() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install Prometheus recorder, using detached recorder");
                PrometheusBuilder::new().build_recorder().handle()
            }
        })
        .clone()
}

/// Metric labels derived from a route template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointTags {
    pub area: String,
    pub controller: String,
    pub action: String,
}

impl EndpointTags {
    /// `/api/v1/limit/daily` → area `api/v1`, controller `limit`, action `daily`.
    pub fn from_route(route: &str) -> Self {
        let mut segments: Vec<&str> = route.split('/').filter(|s| !s.is_empty()).collect();
        let action = segments.pop().unwrap_or("index").to_string();
        let controller = segments.pop().unwrap_or_default().to_string();
        Self {
            area: segments.join("/"),
            controller,
            action,
        }
    }
}

struct Registrations {
    long_execution: Counter,
    uptime: Counter,
}

/// Point-in-time view of the instrument's local totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstrumentSnapshot {
    pub requests: u64,
    pub long_requests: u64,
    pub uptime_secs: u64,
}

/// Request and uptime counters owned by the service.
pub struct MetricsInstrument {
    started_at: Instant,
    registrations: ArcSwapOption<Registrations>,
    requests: AtomicU64,
    long_requests: AtomicU64,
}

impl MetricsInstrument {
    pub fn new() -> Self {
        Self::with_start(process_started_at())
    }

    pub fn with_start(started_at: Instant) -> Self {
        describe_counter!(REQUEST_EXECUTION_TOTAL, "API request count");
        describe_counter!(REQUEST_LONG_EXECUTION_TOTAL, "API long execution request count");
        describe_counter!(APPLICATION_UPTIME_SECONDS, "Application uptime in seconds");

        let registrations = Registrations {
            long_execution: counter!(REQUEST_LONG_EXECUTION_TOTAL),
            uptime: counter!(APPLICATION_UPTIME_SECONDS),
        };

        Self {
            started_at,
            registrations: ArcSwapOption::from(Some(Arc::new(registrations))),
            requests: AtomicU64::new(0),
            long_requests: AtomicU64::new(0),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.registrations.load().is_none()
    }

    /// Count one request against its endpoint.
    pub fn record_request(&self, area: &str, controller: &str, action: &str) {
        if self.is_disposed() {
            return;
        }
        self.requests.fetch_add(1, Ordering::Relaxed);
        counter!(
            REQUEST_EXECUTION_TOTAL,
            "area" => area.to_owned(),
            "controller" => controller.to_owned(),
            "action" => action.to_owned()
        )
        .increment(1);
    }

    /// Count one request that exceeded the execution threshold.
    pub fn record_long_request(&self) {
        let guard = self.registrations.load();
        let Some(registrations) = guard.as_ref() else {
            return;
        };
        self.long_requests.fetch_add(1, Ordering::Relaxed);
        registrations.long_execution.increment(1);
    }

    /// Publish the current uptime and return it in whole seconds.
    pub fn sample_uptime(&self) -> u64 {
        let uptime = self.started_at.elapsed().as_secs();
        if let Some(registrations) = self.registrations.load().as_ref() {
            registrations.uptime.absolute(uptime);
        }
        uptime
    }

    pub fn snapshot(&self) -> InstrumentSnapshot {
        InstrumentSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            long_requests: self.long_requests.load(Ordering::Relaxed),
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }

    /// Release the registrations. Returns `true` only for the call that released them.
    pub fn dispose(&self) -> bool {
        let released = self.registrations.swap(None).is_some();
        if released {
            tracing::debug!("Metrics instrument disposed");
        }
        released
    }
}

impl Default for MetricsInstrument {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MetricsInstrument {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_endpoint_tags_from_route() {
        let tags = EndpointTags::from_route("/api/v1/limit/daily");
        assert_eq!(tags.area, "api/v1");
        assert_eq!(tags.controller, "limit");
        assert_eq!(tags.action, "daily");

        let tags = EndpointTags::from_route("/test/execute");
        assert_eq!((tags.area.as_str(), tags.controller.as_str()), ("", "test"));
        assert_eq!(tags.action, "execute");

        assert_eq!(EndpointTags::from_route("/").action, "index");
    }

    #[test]
    fn test_records_requests() {
        let instrument = MetricsInstrument::new();
        instrument.record_request("api/v1", "limit", "daily");
        instrument.record_request("api/v1", "limit", "daily");
        instrument.record_long_request();

        let snapshot = instrument.snapshot();
        assert_eq!(snapshot.requests, 2);
        assert_eq!(snapshot.long_requests, 1);
    }

    #[test]
    fn test_uptime_counts_from_start() {
        let started = Instant::now()
            .checked_sub(Duration::from_secs(90))
            .unwrap();
        let instrument = MetricsInstrument::with_start(started);
        assert!(instrument.sample_uptime() >= 90);
    }

    #[test]
    fn test_dispose_is_idempotent_and_silences_recording() {
        let instrument = MetricsInstrument::new();
        assert!(instrument.dispose());
        assert!(!instrument.dispose());
        assert!(instrument.is_disposed());

        instrument.record_request("", "test", "execute");
        instrument.record_long_request();
        assert_eq!(instrument.snapshot().requests, 0);
        assert_eq!(instrument.snapshot().long_requests, 0);
    }
}
