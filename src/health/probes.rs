//! Health probe abstraction and built-in probes.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::health::state::ProbeOutcome;
use crate::security::RateLimiter;

/// Why a probe could not produce an outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("{0}")]
    Failed(String),

    #[error("probe timed out after {0:?}")]
    TimedOut(Duration),

    #[error("probe panicked: {0}")]
    Panicked(String),
}

/// A check contributing to the service health report.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> Result<ProbeOutcome, ProbeError>;
}

/// Adapts an async closure into a probe.
pub struct FnProbe<F>(F);

impl<F> FnProbe<F> {
    pub fn new<Fut>(check: F) -> Self
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<ProbeOutcome, ProbeError>>,
    {
        Self(check)
    }
}

#[async_trait]
impl<F, Fut> HealthProbe for FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<ProbeOutcome, ProbeError>> + Send,
{
    async fn check(&self) -> Result<ProbeOutcome, ProbeError> {
        (self.0)().await
    }
}

/// Reports healthy whenever the process can answer at all.
pub struct SelfProbe;

#[async_trait]
impl HealthProbe for SelfProbe {
    async fn check(&self) -> Result<ProbeOutcome, ProbeError> {
        Ok(ProbeOutcome::healthy("service is running"))
    }
}

/// Exposes rate limiter bookkeeping in the health report.
pub struct RateLimiterProbe {
    limiter: Arc<RateLimiter>,
}

impl RateLimiterProbe {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

#[async_trait]
impl HealthProbe for RateLimiterProbe {
    async fn check(&self) -> Result<ProbeOutcome, ProbeError> {
        Ok(ProbeOutcome::healthy("rate limiter is accepting requests")
            .with_data("policies", self.limiter.policy_count())
            .with_data("partitions", self.limiter.tracked_partitions()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::state::HealthStatus;
    use crate::security::RateLimitPolicy;

    #[tokio::test]
    async fn test_fn_probe() {
        let probe = FnProbe::new(|| async { Err(ProbeError::Failed("disk full".into())) });
        assert_eq!(probe.check().await, Err(ProbeError::Failed("disk full".into())));
    }

    #[tokio::test]
    async fn test_rate_limiter_probe_reports_counts() {
        let policy = RateLimitPolicy::new("default", Duration::from_secs(10), 1, 0).unwrap();
        let limiter = Arc::new(RateLimiter::new([policy], 3));
        limiter.admit("default", "10.0.0.1").unwrap();

        let outcome = RateLimiterProbe::new(limiter).check().await.unwrap();
        assert_eq!(outcome.status, HealthStatus::Healthy);
        assert_eq!(outcome.data["policies"], 1);
        assert_eq!(outcome.data["partitions"], 1);
    }
}
