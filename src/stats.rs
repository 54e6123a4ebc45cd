use crate::resolver::Outcome;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters collected during one extraction pass
#[derive(Default)]
pub struct RunStats {
    pub pages_seen: AtomicU64,
    pub pages_skipped: AtomicU64,
    pub pages_unclassified: AtomicU64,
    pub primaries_found: AtomicU64,
    pub satellites_attached: AtomicU64,
    pub satellites_deferred: AtomicU64,
    pub satellites_claimed: AtomicU64,
    pub satellites_orphaned: AtomicU64,
    pub records_written: AtomicU64,
    pub records_unrouted: AtomicU64,
    pub shards_written: AtomicU64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_pages(&self) {
        self.pages_seen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_skipped(&self) {
        self.pages_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts what the resolver did with one page.
    pub fn record_outcome(&self, outcome: Outcome) {
        match outcome {
            Outcome::Primary { claimed, .. } => {
                self.primaries_found.fetch_add(1, Ordering::Relaxed);
                self.satellites_claimed
                    .fetch_add(claimed as u64, Ordering::Relaxed);
            }
            Outcome::Attached(_) => {
                self.satellites_attached.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Deferred(_) => {
                self.satellites_deferred.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Unclassified => {
                self.pages_unclassified.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn add_orphans(&self, count: u64) {
        self.satellites_orphaned.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_records(&self, count: u64) {
        self.records_written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_unrouted(&self, count: u64) {
        self.records_unrouted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_shards(&self, count: u64) {
        self.shards_written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn pages(&self) -> u64 {
        self.pages_seen.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u64 {
        self.pages_skipped.load(Ordering::Relaxed)
    }

    pub fn unclassified(&self) -> u64 {
        self.pages_unclassified.load(Ordering::Relaxed)
    }

    pub fn primaries(&self) -> u64 {
        self.primaries_found.load(Ordering::Relaxed)
    }

    pub fn attached(&self) -> u64 {
        self.satellites_attached.load(Ordering::Relaxed)
    }

    pub fn deferred(&self) -> u64 {
        self.satellites_deferred.load(Ordering::Relaxed)
    }

    pub fn claimed(&self) -> u64 {
        self.satellites_claimed.load(Ordering::Relaxed)
    }

    pub fn orphans(&self) -> u64 {
        self.satellites_orphaned.load(Ordering::Relaxed)
    }

    pub fn records(&self) -> u64 {
        self.records_written.load(Ordering::Relaxed)
    }

    pub fn unrouted(&self) -> u64 {
        self.records_unrouted.load(Ordering::Relaxed)
    }

    pub fn shards(&self) -> u64 {
        self.shards_written.load(Ordering::Relaxed)
    }
}
