//! Counters kept by the limiter front.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Default)]
pub struct LimiterStats {
    admitted_immediately: AtomicU64,
    admitted_after_wait: AtomicU64,
    rejected: AtomicU64,
    queue_wait_micros: AtomicU64,
}

/// Serializable copy of [`LimiterStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub admitted_immediately: u64,
    pub admitted_after_wait: u64,
    pub rejected: u64,
    pub queue_wait_micros: u64,
}

impl StatsSnapshot {
    pub fn admitted(&self) -> u64 {
        self.admitted_immediately + self.admitted_after_wait
    }

    /// Mean time spent in line by callers admitted after waiting.
    pub fn mean_queue_wait(&self) -> Option<Duration> {
        let waited = self.queue_wait_micros;
        let count = self.admitted_after_wait;
        (count > 0).then(|| Duration::from_micros(waited / count))
    }
}

impl LimiterStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_admitted(&self, waited: Option<Duration>) {
        match waited {
            None => {
                self.admitted_immediately.fetch_add(1, Ordering::Relaxed);
            }
            Some(waited) => {
                self.admitted_after_wait.fetch_add(1, Ordering::Relaxed);
                self.record_wait(waited);
            }
        }
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    fn record_wait(&self, waited: Duration) {
        self.queue_wait_micros
            .fetch_add(saturating_micros(waited), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            admitted_immediately: self.admitted_immediately.load(Ordering::Relaxed),
            admitted_after_wait: self.admitted_after_wait.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            queue_wait_micros: self.queue_wait_micros.load(Ordering::Relaxed),
        }
    }
}

pub(crate) fn saturating_micros(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}

pub(crate) fn saturating_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_admissions_and_rejections() {
        let stats = LimiterStats::new();
        stats.record_admitted(None);
        stats.record_admitted(Some(Duration::from_micros(300)));
        stats.record_admitted(Some(Duration::from_micros(100)));
        stats.record_rejected();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.admitted(), 3);
        assert_eq!(snapshot.admitted_after_wait, 2);
        assert_eq!(snapshot.rejected, 1);
        assert_eq!(snapshot.mean_queue_wait(), Some(Duration::from_micros(200)));
    }

    #[test]
    fn mean_wait_is_none_without_waiters() {
        let stats = LimiterStats::new();
        stats.record_admitted(None);
        assert_eq!(stats.snapshot().mean_queue_wait(), None);
    }

    #[test]
    fn duration_conversions_saturate() {
        assert_eq!(saturating_micros(Duration::from_millis(3)), 3_000);
        assert_eq!(saturating_millis(Duration::from_micros(2_500)), 2);
        assert_eq!(saturating_micros(Duration::MAX), u64::MAX);
        assert_eq!(saturating_millis(Duration::MAX), u64::MAX);
    }
}
