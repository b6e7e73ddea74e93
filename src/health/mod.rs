//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! GET /health  → aggregator.rs evaluate()             (every probe)
//! GET /alive   → aggregator.rs evaluate_filtered(live) (liveness probes only)
//!     → probes.rs (each probe under its own timeout)
//!     → state.rs  (status per probe, worst status overall)
//!     → report.rs (JSON body)
//! ```
//!
//! # Design Decisions
//! - The endpoints always answer 200; the body carries the status
//! - A failing probe never fails the evaluation

pub mod aggregator;
pub mod probes;
pub mod report;
pub mod state;

pub use aggregator::{HealthAggregator, ProbeRegistration, LIVE_TAG};
pub use probes::{FnProbe, HealthProbe, ProbeError, RateLimiterProbe, SelfProbe};
pub use report::HealthReport;
pub use state::{HealthProbeResult, HealthStatus, ProbeOutcome};
