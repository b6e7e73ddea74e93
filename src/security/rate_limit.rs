//! Fixed-window rate limiting with bounded FIFO queues.
//!
//! Every (policy, partition key) pair owns a [`PartitionState`] stored in a
//! sharded [`DashMap`]; all admission decisions for a key happen under that
//! shard's lock, so two requests never race on the same counter.
//!
//! ```text
//! admit(policy, key)
//!     → window elapsed?  reset counter, hand new permits to queued waiters (FIFO)
//!     → permit free?     Allowed
//!     → queue room?      Queued(Waiter)   (task suspends until a permit arrives)
//!     → otherwise        Rejected { retry_after }
//! ```

use dashmap::DashMap;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::{RateLimitConfig, RateLimitPolicyConfig, RateLimitRouteConfig};

/// Errors raised by the rate limiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateLimitError {
    #[error("unknown rate limit policy '{0}'")]
    UnknownPolicy(String),

    #[error("invalid rate limit policy '{name}': {reason}")]
    InvalidPolicy { name: String, reason: &'static str },

    #[error("queued request was dropped before admission")]
    QueueClosed,
}

/// A named fixed-window policy. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    name: String,
    window: Duration,
    permit_limit: u32,
    queue_limit: u32,
}

impl RateLimitPolicy {
    pub fn new(
        name: impl Into<String>,
        window: Duration,
        permit_limit: u32,
        queue_limit: u32,
    ) -> Result<Self, RateLimitError> {
        let name = name.into();
        if window.is_zero() {
            return Err(RateLimitError::InvalidPolicy {
                name,
                reason: "window must be greater than zero",
            });
        }
        if permit_limit == 0 {
            return Err(RateLimitError::InvalidPolicy {
                name,
                reason: "permit_limit must be at least 1",
            });
        }
        Ok(Self {
            name,
            window,
            permit_limit,
            queue_limit,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn permit_limit(&self) -> u32 {
        self.permit_limit
    }

    pub fn queue_limit(&self) -> u32 {
        self.queue_limit
    }
}

impl TryFrom<&RateLimitPolicyConfig> for RateLimitPolicy {
    type Error = RateLimitError;

    fn try_from(config: &RateLimitPolicyConfig) -> Result<Self, Self::Error> {
        Self::new(
            config.name.clone(),
            Duration::from_secs(config.window),
            config.permit_limit,
            config.queue_limit,
        )
    }
}

/// Outcome of an admission attempt.
#[derive(Debug)]
pub enum Admission {
    /// A permit was taken from the current window.
    Allowed,
    /// No permit left; the request holds a place in the queue.
    Queued(Waiter),
    /// No permit and no queue room. Terminal for the request.
    Rejected { retry_after: Duration },
}

struct QueuedWaiter {
    id: u64,
    tx: oneshot::Sender<Instant>,
}

/// Counter state for one partition key.
struct PartitionState {
    window_start: Instant,
    permits_used: u32,
    queue: VecDeque<QueuedWaiter>,
    last_seen: Instant,
}

impl PartitionState {
    fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            permits_used: 0,
            queue: VecDeque::new(),
            last_seen: now,
        }
    }

    fn window_end(&self, policy: &RateLimitPolicy) -> Instant {
        self.window_start + policy.window
    }

    /// Open a new window if the current one has elapsed.
    fn roll(&mut self, now: Instant, policy: &RateLimitPolicy) {
        if now < self.window_end(policy) {
            return;
        }
        self.window_start = now;
        self.permits_used = 0;
        self.release_queued(policy);
    }

    /// Hand free permits to queued waiters, oldest first.
    ///
    /// A waiter whose receiver is gone does not consume a permit.
    fn release_queued(&mut self, policy: &RateLimitPolicy) {
        while self.permits_used < policy.permit_limit {
            let Some(waiter) = self.queue.pop_front() else {
                break;
            };
            if waiter.tx.send(self.window_start).is_ok() {
                self.permits_used += 1;
            }
        }
    }
}

/// Limiter for a single policy.
struct PolicyLimiter {
    policy: RateLimitPolicy,
    partitions: DashMap<String, PartitionState>,
    next_waiter_id: AtomicU64,
}

impl PolicyLimiter {
    fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            partitions: DashMap::new(),
            next_waiter_id: AtomicU64::new(1),
        }
    }

    fn admit(self: &Arc<Self>, key: &str) -> Admission {
        let now = Instant::now();
        let mut state = self
            .partitions
            .entry(key.to_string())
            .or_insert_with(|| PartitionState::new(now));

        state.last_seen = now;
        state.roll(now, &self.policy);

        if state.permits_used < self.policy.permit_limit {
            state.permits_used += 1;
            return Admission::Allowed;
        }

        let window_end = state.window_end(&self.policy);

        if state.queue.len() < self.policy.queue_limit as usize {
            let id = self.next_waiter_id.fetch_add(1, Ordering::Relaxed);
            let (tx, rx) = oneshot::channel();
            state.queue.push_back(QueuedWaiter { id, tx });
            metrics::counter!("rate_limit_queued_total", "policy" => self.policy.name.clone())
                .increment(1);

            return Admission::Queued(Waiter {
                limiter: Arc::clone(self),
                key: key.to_string(),
                id,
                rx,
                window_end,
                settled: false,
            });
        }

        metrics::counter!("rate_limit_rejected_total", "policy" => self.policy.name.clone())
            .increment(1);

        Admission::Rejected {
            retry_after: window_end.saturating_duration_since(now),
        }
    }

    /// Roll the window for `key` if due. Returns the end of the current window.
    fn replenish(&self, key: &str) -> Option<Instant> {
        let now = Instant::now();
        let mut state = self.partitions.get_mut(key)?;
        state.roll(now, &self.policy);
        Some(state.window_end(&self.policy))
    }

    fn withdraw(&self, key: &str, id: u64) {
        if let Some(mut state) = self.partitions.get_mut(key) {
            state.queue.retain(|waiter| waiter.id != id);
        }
    }

    /// Give back a permit that was granted but never used.
    fn refund(&self, key: &str, granted_in: Instant) {
        if let Some(mut state) = self.partitions.get_mut(key) {
            if state.window_start == granted_in && state.permits_used > 0 {
                state.permits_used -= 1;
                state.release_queued(&self.policy);
            }
        }
    }

    fn sweep(&self, now: Instant, idle_windows: u32) -> usize {
        let idle_after = self.policy.window.saturating_mul(idle_windows);
        let before = self.partitions.len();
        self.partitions.retain(|_, state| {
            !state.queue.is_empty() || now.saturating_duration_since(state.last_seen) < idle_after
        });
        before.saturating_sub(self.partitions.len())
    }
}

/// A queued admission.
///
/// Dropping a waiter before it is admitted removes it from the queue, so a
/// cancelled request never consumes a permit later.
pub struct Waiter {
    limiter: Arc<PolicyLimiter>,
    key: String,
    id: u64,
    rx: oneshot::Receiver<Instant>,
    window_end: Instant,
    settled: bool,
}

impl Waiter {
    /// Suspend until a permit is granted in a later window.
    pub async fn admitted(mut self) -> Result<(), RateLimitError> {
        loop {
            tokio::select! {
                granted = &mut self.rx => {
                    self.settled = true;
                    return granted.map(|_| ()).map_err(|_| RateLimitError::QueueClosed);
                }
                _ = tokio::time::sleep_until(self.window_end) => {
                    match self.limiter.replenish(&self.key) {
                        Some(window_end) => self.window_end = window_end,
                        None => {
                            self.settled = true;
                            return Err(RateLimitError::QueueClosed);
                        }
                    }
                }
            }
        }
    }
}

impl fmt::Debug for Waiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waiter")
            .field("policy", &self.limiter.policy.name)
            .field("key", &self.key)
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        // Closing first makes any later release skip this waiter.
        self.rx.close();
        match self.rx.try_recv() {
            Ok(granted_in) => self.limiter.refund(&self.key, granted_in),
            Err(_) => self.limiter.withdraw(&self.key, self.id),
        }
    }
}

/// Per-partition usage, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionUsage {
    pub permits_used: u32,
    pub queued: usize,
}

/// Fixed-window rate limiter holding every configured policy.
pub struct RateLimiter {
    policies: HashMap<String, Arc<PolicyLimiter>>,
    idle_windows: u32,
}

impl RateLimiter {
    pub fn new(policies: impl IntoIterator<Item = RateLimitPolicy>, idle_windows: u32) -> Self {
        let policies = policies
            .into_iter()
            .map(|policy| (policy.name.clone(), Arc::new(PolicyLimiter::new(policy))))
            .collect();
        Self {
            policies,
            idle_windows: idle_windows.max(1),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Result<Self, RateLimitError> {
        let policies = config
            .policies
            .iter()
            .map(RateLimitPolicy::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(policies, config.idle_windows))
    }

    /// Attempt to admit one request for `key` under `policy`.
    pub fn admit(&self, policy: &str, key: &str) -> Result<Admission, RateLimitError> {
        let limiter = self
            .policies
            .get(policy)
            .ok_or_else(|| RateLimitError::UnknownPolicy(policy.to_string()))?;
        Ok(limiter.admit(key))
    }

    pub fn policy(&self, name: &str) -> Option<&RateLimitPolicy> {
        self.policies.get(name).map(|limiter| &limiter.policy)
    }

    pub fn policy_count(&self) -> usize {
        self.policies.len()
    }

    /// Number of partitions currently tracked across all policies.
    pub fn tracked_partitions(&self) -> usize {
        self.policies
            .values()
            .map(|limiter| limiter.partitions.len())
            .sum()
    }

    pub fn usage(&self, policy: &str, key: &str) -> Option<PartitionUsage> {
        let limiter = self.policies.get(policy)?;
        let state = limiter.partitions.get(key)?;
        Some(PartitionUsage {
            permits_used: state.permits_used,
            queued: state.queue.len(),
        })
    }

    /// Drop partitions idle for `idle_windows` windows. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        self.policies
            .values()
            .map(|limiter| limiter.sweep(now, self.idle_windows))
            .sum()
    }

    /// Periodically sweep idle partitions until shutdown.
    pub fn start_cleanup_task(
        self: &Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = limiter.sweep();
                        if removed > 0 {
                            tracing::debug!(removed, "Swept idle rate limit partitions");
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!("Rate limit cleanup task stopping");
                        break;
                    }
                }
            }
        })
    }
}

/// Path prefixes bound to policies. Longest matching prefix wins.
#[derive(Debug, Clone, Default)]
pub struct PolicyRoutes {
    routes: Vec<(String, String)>,
}

impl PolicyRoutes {
    pub fn new(routes: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut routes: Vec<_> = routes
            .into_iter()
            .map(|(prefix, policy)| (prefix.trim_end_matches('/').to_string(), policy))
            .collect();
        routes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self { routes }
    }

    pub fn from_config(routes: &[RateLimitRouteConfig]) -> Self {
        Self::new(
            routes
                .iter()
                .map(|route| (route.path_prefix.clone(), route.policy.clone())),
        )
    }

    pub fn policy_for(&self, path: &str) -> Option<&str> {
        self.routes
            .iter()
            .find(|(prefix, _)| prefix_matches(prefix, path))
            .map(|(_, policy)| policy.as_str())
    }
}

fn prefix_matches(prefix: &str, path: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
