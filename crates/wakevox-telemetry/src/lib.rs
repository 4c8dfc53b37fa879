use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared counters for cross-thread engine monitoring.
///
/// Cloning is cheap; all clones observe the same counters. Writers use
/// relaxed ordering — these are diagnostics, not synchronization.
#[derive(Clone, Default)]
pub struct EngineMetrics {
    /// Capture sessions that reached the ready state.
    pub sessions_started: Arc<AtomicU64>,
    /// Frames pulled off the capture source.
    pub frames_read: Arc<AtomicU64>,
    /// Finalized candidate phrases emitted by the recognizer.
    pub candidates: Arc<AtomicU64>,
    /// Wake phrases matched and handed off.
    pub hotwords_fired: Arc<AtomicU64>,
    /// Capture worker terminations via fault.
    pub capture_faults: Arc<AtomicU64>,
    /// Backoff retries scheduled after capture faults.
    pub retries_scheduled: Arc<AtomicU64>,
    /// Forced resumes after a stuck handoff.
    pub watchdog_fires: Arc<AtomicU64>,
}

impl EngineMetrics {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_counters() {
        let metrics = EngineMetrics::default();
        let clone = metrics.clone();
        EngineMetrics::incr(&clone.hotwords_fired);
        assert_eq!(EngineMetrics::get(&metrics.hotwords_fired), 1);
    }
}
