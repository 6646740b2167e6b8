//! Dispatch counters
//!
//! Plain relaxed atomics, safe to bump from the audio thread. Overflow and
//! blocked-drop counts are the main health signal: "the UI didn't update"
//! is diagnosed from these, since the dispatch path never reports errors.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct DispatchStats {
    enqueued: AtomicU64,
    overflowed: AtomicU64,
    dropped_blocked: AtomicU64,
    flushed: AtomicU64,
    drained: AtomicU64,
    coalesced: AtomicU64,
    delivered: AtomicU64,
    pruned: AtomicU64,
    drains: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Messages accepted by `enqueue` (ring or overflow)
    pub enqueued: u64,
    /// Of those, messages that went to the overflow queue
    pub overflowed: u64,
    /// Messages ignored because the dispatcher was blocked
    pub dropped_blocked: u64,
    /// Messages discarded by a block/unblock flush
    pub flushed: u64,
    /// Messages pulled out of the channels by `drain`
    pub drained: u64,
    /// Messages skipped because an earlier one had the same source and symbol
    pub coalesced: u64,
    /// Listener callbacks invoked
    pub delivered: u64,
    /// Expired listener registrations removed
    pub pruned: u64,
    /// Number of `drain` calls
    pub drains: u64,
}

impl DispatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_enqueued(&self, overflowed: bool) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        if overflowed {
            self.overflowed.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub(crate) fn record_dropped_blocked(&self) {
        self.dropped_blocked.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flushed(&self, count: usize) {
        self.flushed.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_drain(&self, report: &DrainReport) {
        self.drains.fetch_add(1, Ordering::Relaxed);
        self.drained.fetch_add(report.drained as u64, Ordering::Relaxed);
        self.coalesced.fetch_add(report.coalesced as u64, Ordering::Relaxed);
        self.delivered.fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.pruned.fetch_add(report.pruned as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            overflowed: self.overflowed.load(Ordering::Relaxed),
            dropped_blocked: self.dropped_blocked.load(Ordering::Relaxed),
            flushed: self.flushed.load(Ordering::Relaxed),
            drained: self.drained.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            pruned: self.pruned.load(Ordering::Relaxed),
            drains: self.drains.load(Ordering::Relaxed),
        }
    }
}

/// What a single `drain` call did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Messages pulled from the ring and the overflow queue
    pub drained: usize,
    /// Of those, messages that came from the overflow queue
    pub overflowed: usize,
    /// Messages dropped by first-wins coalescing
    pub coalesced: usize,
    /// Listener callbacks invoked
    pub delivered: usize,
    /// Expired registrations pruned after delivery
    pub pruned: usize,
}

impl DrainReport {
    pub fn is_empty(&self) -> bool {
        self.drained == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_accumulates_drains() {
        let stats = DispatchStats::new();
        stats.record_enqueued(false);
        stats.record_enqueued(true);
        stats.record_dropped_blocked();

        let report = DrainReport {
            drained: 2,
            overflowed: 1,
            coalesced: 1,
            delivered: 3,
            pruned: 0,
        };
        stats.record_drain(&report);
        stats.record_drain(&DrainReport::default());

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.enqueued, 2);
        assert_eq!(snapshot.overflowed, 1);
        assert_eq!(snapshot.dropped_blocked, 1);
        assert_eq!(snapshot.drained, 2);
        assert_eq!(snapshot.delivered, 3);
        assert_eq!(snapshot.drains, 2);
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_string(&StatsSnapshot::default()).unwrap();
        assert!(json.contains("\"overflowed\":0"));
    }
}
