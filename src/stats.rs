use std::sync::atomic::{AtomicU64, Ordering};

use crate::foundation::core::TaskKind;

#[derive(Default)]
struct KindCounters {
    created: AtomicU64,
    deduplicated: AtomicU64,
    simplified: AtomicU64,
    launched: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
}

/// Run-scoped statistics shared by the builder, every task and the driver.
#[derive(Default)]
pub struct PackStats {
    kinds: [KindCounters; TaskKind::ALL.len()],
}

impl PackStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self, kind: TaskKind) -> &KindCounters {
        &self.kinds[kind.index()]
    }

    pub(crate) fn record_created(&self, kind: TaskKind) {
        self.counters(kind).created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deduplicated(&self, kind: TaskKind) {
        self.counters(kind)
            .deduplicated
            .fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_simplified(&self, kind: TaskKind) {
        self.counters(kind).simplified.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_launched(&self, kind: TaskKind) {
        self.counters(kind).launched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self, kind: TaskKind) {
        self.counters(kind).failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cancelled(&self, kind: TaskKind) {
        self.counters(kind).cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let kinds = TaskKind::ALL.map(|kind| {
            let c = self.counters(kind);
            KindStats {
                created: c.created.load(Ordering::Relaxed),
                deduplicated: c.deduplicated.load(Ordering::Relaxed),
                simplified: c.simplified.load(Ordering::Relaxed),
                launched: c.launched.load(Ordering::Relaxed),
                failed: c.failed.load(Ordering::Relaxed),
                cancelled: c.cancelled.load(Ordering::Relaxed),
            }
        });
        StatsSnapshot { kinds }
    }
}

/// Counters for one [`TaskKind`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KindStats {
    /// Canonical tasks created by the builder.
    pub created: u64,
    /// Requests answered by an existing canonical task.
    pub deduplicated: u64,
    /// Requests rewritten by an algebraic simplification.
    pub simplified: u64,
    /// Computations started.
    pub launched: u64,
    /// Computations that ended in failure.
    pub failed: u64,
    /// Computations cancelled.
    pub cancelled: u64,
}

impl std::ops::Add for KindStats {
    type Output = KindStats;

    fn add(self, rhs: KindStats) -> KindStats {
        KindStats {
            created: self.created + rhs.created,
            deduplicated: self.deduplicated + rhs.deduplicated,
            simplified: self.simplified + rhs.simplified,
            launched: self.launched + rhs.launched,
            failed: self.failed + rhs.failed,
            cancelled: self.cancelled + rhs.cancelled,
        }
    }
}

/// Point-in-time copy of [`PackStats`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatsSnapshot {
    kinds: [KindStats; TaskKind::ALL.len()],
}

impl StatsSnapshot {
    pub fn kind(&self, kind: TaskKind) -> KindStats {
        self.kinds[kind.index()]
    }

    pub fn total(&self) -> KindStats {
        self.kinds
            .iter()
            .copied()
            .fold(KindStats::default(), |acc, k| acc + k)
    }

    /// Emit one `info` line per kind that saw any activity.
    pub fn log(&self) {
        for kind in TaskKind::ALL {
            let s = self.kind(kind);
            if s == KindStats::default() {
                continue;
            }
            tracing::info!(
                kind = %kind,
                created = s.created,
                deduplicated = s.deduplicated,
                simplified = s.simplified,
                launched = s.launched,
                failed = s.failed,
                cancelled = s.cancelled,
                "task statistics"
            );
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/stats.rs"]
mod tests;
