//! 📊 Writer statistics: "Are we there yet?", but as five monotonic counters.
//!
//! The counters are atomics because bulk calls complete on their own tasks and
//! bump `inserted`/`failed` from there. Nothing is ever reset. Nothing ever goes down.
//! Like technical debt.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// 🔢 The live counters, shared between the writer and its in-flight bulk tasks.
#[derive(Debug, Default)]
pub(crate) struct WriterStats {
    written: AtomicU64,
    inserted: AtomicU64,
    failed: AtomicU64,
    ok: AtomicU64,
    error: AtomicU64,
}

impl WriterStats {
    pub(crate) fn record_ok(&self) {
        self.ok.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.error.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_written(&self, records: u64) {
        self.written.fetch_add(records, Ordering::Relaxed);
    }

    pub(crate) fn record_inserted(&self, records: u64) {
        self.inserted.fetch_add(records, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self, records: u64) {
        self.failed.fetch_add(records, Ordering::Relaxed);
    }

    /// 📸 A point-in-time copy. Counters may move between loads; it's an approximation
    /// of in-flight state, not a ledger.
    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            written: self.written.load(Ordering::Relaxed),
            inserted: self.inserted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            ok: self.ok.load(Ordering::Relaxed),
            error: self.error.load(Ordering::Relaxed),
        }
    }
}

/// 📸 Frozen copy of the writer counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatsSnapshot {
    /// 📡 Records handed to a downstream `bulk()` call.
    pub written: u64,
    /// ✅ Records whose `bulk()` call came back without an error.
    pub inserted: u64,
    /// 💀 Records whose `bulk()` call came back with an error. Gone for good.
    pub failed: u64,
    /// 🛂 Chunks that passed validation.
    pub ok: u64,
    /// 🚫 Chunks rejected by parsing or validation.
    pub error: u64,
}

impl StatsSnapshot {
    /// ⏳ `written - inserted`: in flight, plus anything that failed. Never negative.
    pub fn queued(&self) -> u64 {
        self.written.saturating_sub(self.inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_queued_is_whatever_has_not_landed_yet() {
        let stats = WriterStats::default();
        stats.record_ok();
        stats.record_ok();
        stats.record_error();
        stats.record_written(2);
        stats.record_inserted(1);
        stats.record_failed(1);

        let snapshot = stats.snapshot();
        assert_eq!(
            snapshot,
            StatsSnapshot {
                written: 2,
                inserted: 1,
                failed: 1,
                ok: 2,
                error: 1,
            }
        );
        assert_eq!(snapshot.queued(), 1, "failed records never count as inserted");
    }
}
