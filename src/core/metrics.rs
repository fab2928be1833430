//! Emission metrics.
//!
//! Metrics are reported through the `metrics` crate facade. The host owns
//! the backend by installing a recorder; without one every call is a no-op.
//!
//! | Metric | Type | Description |
//! |--------|------|-------------|
//! | `lineage.emit.attempts` | Histogram | Duration of every dispatch attempt (seconds) |
//! | `lineage.emit.attempts.{event_type}.{transport}` | Histogram | Attempts by event type and transport |
//! | `lineage.emit.failed` | Counter | Dispatch attempts that errored |

use std::time::{Duration, Instant};

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    /// Histogram: every emission attempt.
    pub const EMIT_ATTEMPTS: &str = "lineage.emit.attempts";
    /// Counter: failed emission attempts.
    pub const EMIT_FAILED: &str = "lineage.emit.failed";

    /// Histogram: emission attempts keyed by event type and transport kind.
    pub fn emit_attempts_for(event_type: &str, transport_kind: &str) -> String {
        format!("{}.{}.{}", EMIT_ATTEMPTS, event_type, transport_kind)
    }
}

/// Guard that hands the elapsed time to `on_drop` when it goes out of scope
pub struct TimingGuard<F>
where
    F: FnOnce(Duration),
{
    start: Instant,
    on_drop: Option<F>,
}

impl<F> TimingGuard<F>
where
    F: FnOnce(Duration),
{
    pub fn new(on_drop: F) -> Self {
        Self {
            start: Instant::now(),
            on_drop: Some(on_drop),
        }
    }
}

impl<F> Drop for TimingGuard<F>
where
    F: FnOnce(Duration),
{
    fn drop(&mut self) {
        if let Some(f) = self.on_drop.take() {
            f(self.start.elapsed());
        }
    }
}

/// Time one emission attempt into the histogram `name`
pub fn time_emit_attempt(name: impl Into<String>) -> TimingGuard<impl FnOnce(Duration)> {
    let name = name.into();
    TimingGuard::new(move |elapsed| histogram!(name).record(elapsed.as_secs_f64()))
}

/// Count one failed emission attempt
pub fn record_emit_failure() {
    counter!(names::EMIT_FAILED).increment(1);
}
