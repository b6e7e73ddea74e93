//! Health probe aggregation.
//!
//! # Responsibilities
//! - Hold the registered probes and their tags in registration order
//! - Run a selection of probes concurrently, each under its own timeout
//! - Turn failures, panics and timeouts into unhealthy results
//!
//! # Design Decisions
//! - Evaluation never fails; a broken probe only affects its own entry
//! - Probes are shared behind `Arc`, so the aggregator clones cheaply into handlers

use futures_util::future::join_all;
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use crate::health::probes::{HealthProbe, ProbeError};
use crate::health::report::HealthReport;
use crate::health::state::{HealthProbeResult, ProbeOutcome};

/// Tag carried by probes that answer liveness checks.
pub const LIVE_TAG: &str = "live";

/// A probe with its name and tags.
#[derive(Clone)]
pub struct ProbeRegistration {
    name: String,
    tags: Vec<String>,
    probe: Arc<dyn HealthProbe>,
}

impl ProbeRegistration {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Evaluates registered probes into a [`HealthReport`].
#[derive(Clone)]
pub struct HealthAggregator {
    probes: Vec<ProbeRegistration>,
    probe_timeout: Duration,
}

impl HealthAggregator {
    pub fn new(probe_timeout: Duration) -> Self {
        Self {
            probes: Vec::new(),
            probe_timeout,
        }
    }

    /// Register a probe. A probe with the same name is replaced in place.
    pub fn register<P>(&mut self, name: impl Into<String>, tags: &[&str], probe: P) -> &mut Self
    where
        P: HealthProbe + 'static,
    {
        let registration = ProbeRegistration {
            name: name.into(),
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
            probe: Arc::new(probe),
        };

        match self.probes.iter_mut().find(|p| p.name == registration.name) {
            Some(existing) => *existing = registration,
            None => self.probes.push(registration),
        }
        self
    }

    pub fn probes(&self) -> &[ProbeRegistration] {
        &self.probes
    }

    /// Run every registered probe.
    pub async fn evaluate(&self) -> HealthReport {
        evaluate(self.probes.iter(), self.probe_timeout).await
    }

    /// Run only the probes carrying `tag`.
    pub async fn evaluate_filtered(&self, tag: &str) -> HealthReport {
        evaluate(self.probes.iter().filter(|p| p.has_tag(tag)), self.probe_timeout).await
    }
}

/// Run a set of probes concurrently. Results keep the order of `probes`.
pub async fn evaluate<'a>(
    probes: impl IntoIterator<Item = &'a ProbeRegistration>,
    probe_timeout: Duration,
) -> HealthReport {
    let results = join_all(
        probes
            .into_iter()
            .map(|registration| run_probe(registration, probe_timeout)),
    )
    .await;

    HealthReport::from_results(results)
}

async fn run_probe(registration: &ProbeRegistration, probe_timeout: Duration) -> HealthProbeResult {
    let check = AssertUnwindSafe(registration.probe.check()).catch_unwind();

    let outcome = match tokio::time::timeout(probe_timeout, check).await {
        Ok(Ok(Ok(outcome))) => outcome,
        Ok(Ok(Err(err))) => failure(&registration.name, err),
        Ok(Err(panic)) => failure(&registration.name, ProbeError::Panicked(panic_message(&*panic))),
        Err(_) => failure(&registration.name, ProbeError::TimedOut(probe_timeout)),
    };

    HealthProbeResult::from_outcome(registration.name.clone(), outcome)
}

fn failure(name: &str, err: ProbeError) -> ProbeOutcome {
    tracing::warn!(probe = %name, error = %err, "Health probe failed");

    let description = err.to_string();
    if description.is_empty() {
        ProbeOutcome::unhealthy("probe failed")
    } else {
        ProbeOutcome::unhealthy(description)
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::probes::FnProbe;
    use crate::health::state::HealthStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn aggregator() -> HealthAggregator {
        HealthAggregator::new(Duration::from_millis(100))
    }

    #[tokio::test]
    async fn test_overall_status_is_worst_probe() {
        let mut health = aggregator();
        health
            .register("a", &[], FnProbe::new(|| async { Ok(ProbeOutcome::healthy("ok")) }))
            .register("b", &[], FnProbe::new(|| async { Ok(ProbeOutcome::degraded("slow")) }));

        let report = health.evaluate().await;
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.results[0].name, "a");
        assert_eq!(report.results[1].name, "b");
    }

    #[tokio::test]
    async fn test_no_probes_is_healthy() {
        let report = aggregator().evaluate().await;
        assert_eq!(report.status, HealthStatus::Healthy);
        assert!(report.results.is_empty());
    }

    #[tokio::test]
    async fn test_failing_probe_is_unhealthy_with_description() {
        let mut health = aggregator();
        health
            .register("ok", &[], FnProbe::new(|| async { Ok(ProbeOutcome::healthy("ok")) }))
            .register(
                "broken",
                &[],
                FnProbe::new(|| async { Err(ProbeError::Failed("connection refused".into())) }),
            );

        let report = health.evaluate().await;
        assert_eq!(report.status, HealthStatus::Unhealthy);
        let broken = report.result("broken").unwrap();
        assert_eq!(broken.status, HealthStatus::Unhealthy);
        assert_eq!(broken.description, "connection refused");
        assert_eq!(report.result("ok").unwrap().status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_panicking_probe_is_contained() {
        let mut health = aggregator();
        health.register(
            "panics",
            &[],
            FnProbe::new(|| async {
                if true {
                    panic!("probe exploded");
                }
                Ok(ProbeOutcome::healthy("unreachable"))
            }),
        );

        let report = health.evaluate().await;
        let result = report.result("panics").unwrap();
        assert_eq!(result.status, HealthStatus::Unhealthy);
        assert!(result.description.contains("probe exploded"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_probe_times_out() {
        let mut health = aggregator();
        health.register(
            "slow",
            &[],
            FnProbe::new(|| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(ProbeOutcome::healthy("late"))
            }),
        );

        let report = health.evaluate().await;
        let result = report.result("slow").unwrap();
        assert_eq!(result.status, HealthStatus::Unhealthy);
        assert!(result.description.contains("timed out"));
    }

    #[tokio::test]
    async fn test_tag_filter() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut health = aggregator();
        health
            .register(
                "self",
                &[LIVE_TAG],
                FnProbe::new(|| async { Ok(ProbeOutcome::healthy("up")) }),
            )
            .register(
                "db",
                &["ready"],
                FnProbe::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Ok(ProbeOutcome::unhealthy("down")) }
                }),
            );

        let live = health.evaluate_filtered(LIVE_TAG).await;
        assert_eq!(live.status, HealthStatus::Healthy);
        assert_eq!(live.results.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let all = health.evaluate().await;
        assert_eq!(all.status, HealthStatus::Unhealthy);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_repeated_evaluation_is_stable() {
        let mut health = aggregator();
        health.register("a", &[], FnProbe::new(|| async { Ok(ProbeOutcome::degraded("x")) }));

        let first = health.evaluate().await;
        let second = health.evaluate().await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_register_replaces_same_name() {
        let mut health = aggregator();
        health
            .register("a", &[], FnProbe::new(|| async { Ok(ProbeOutcome::degraded("old")) }))
            .register("a", &[], FnProbe::new(|| async { Ok(ProbeOutcome::healthy("new")) }));

        assert_eq!(health.probes().len(), 1);
        assert_eq!(health.evaluate().await.results[0].description, "new");
    }
}
