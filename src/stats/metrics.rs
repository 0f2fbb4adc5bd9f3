//! Service-level counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide matching counters
///
/// Updated lock-free from request paths; reads are monotonic snapshots.
#[derive(Debug, Default)]
pub struct ServiceStats {
    sends: AtomicU64,
    receives: AtomicU64,
    send_timeouts: AtomicU64,
    receive_timeouts: AtomicU64,
    stopped_hits: AtomicU64,
}

impl ServiceStats {
    /// Create a zeroed stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_send(&self) {
        self.sends.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_receive(&self) {
        self.receives.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_send_timeout(&self) {
        self.send_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_receive_timeout(&self) {
        self.receive_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stopped_hit(&self) {
        self.stopped_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Outputs accepted (buffered, handed off, or persisted)
    pub fn sends(&self) -> u64 {
        self.sends.load(Ordering::Relaxed)
    }

    /// Outputs delivered to consumers
    pub fn receives(&self) -> u64 {
        self.receives.load(Ordering::Relaxed)
    }

    /// Bounded-blocking sends that found no space in their window
    pub fn send_timeouts(&self) -> u64 {
        self.send_timeouts.load(Ordering::Relaxed)
    }

    /// Receives that found no entry in their window
    pub fn receive_timeouts(&self) -> u64 {
        self.receive_timeouts.load(Ordering::Relaxed)
    }

    /// Calls that landed on a stopped stream
    pub fn stopped_hits(&self) -> u64 {
        self.stopped_hits.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let stats = ServiceStats::new();

        assert_eq!(stats.sends(), 0);
        assert_eq!(stats.receives(), 0);
        assert_eq!(stats.send_timeouts(), 0);
        assert_eq!(stats.receive_timeouts(), 0);
        assert_eq!(stats.stopped_hits(), 0);
    }

    #[test]
    fn test_counters_accumulate() {
        let stats = ServiceStats::new();

        stats.record_send();
        stats.record_send();
        stats.record_receive();
        stats.record_send_timeout();
        stats.record_receive_timeout();
        stats.record_stopped_hit();

        assert_eq!(stats.sends(), 2);
        assert_eq!(stats.receives(), 1);
        assert_eq!(stats.send_timeouts(), 1);
        assert_eq!(stats.receive_timeouts(), 1);
        assert_eq!(stats.stopped_hits(), 1);
    }
}
