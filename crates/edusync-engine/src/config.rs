use std::time::Duration;

/// Tuning knobs for the reconciliation engine.
///
/// Back-reference writes race with the owning service's own write path, so
/// compare-and-set conflicts are expected under load. The engine retries a
/// conflicted write a bounded number of times with linear backoff before
/// giving the whole event back to the transport for redelivery.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileConfig {
    /// How many times a conflicted compare-and-set is retried in-process
    /// before the event is surfaced for redelivery.
    pub cas_retry_budget: u32,
    /// Base backoff between retries; attempt `n` sleeps `n * backoff`.
    pub cas_retry_backoff: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            cas_retry_budget: 4,
            cas_retry_backoff: Duration::from_millis(25),
        }
    }
}
