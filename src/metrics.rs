//! Request counting and a monotonic id generator, the Rust shape of the
//! original core's tiny `struct dqlite__metrics` and `id_generate()`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Snapshot of accumulated request counts and total handling time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub duration_nanos: u64,
}

/// Request counters, safe to share across gateway sessions via `Arc`.
#[derive(Debug, Default)]
pub struct Metrics {
    requests: AtomicU64,
    duration_nanos: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, elapsed: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.duration_nanos
            .fetch_add(u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            duration_nanos: self.duration_nanos.load(Ordering::Relaxed),
        }
    }
}

/// Process-wide monotonically increasing id generator, starting at 1.
#[derive(Debug, Default)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self { next: AtomicU64::new(0) }
    }

    pub fn generate(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_accumulate_across_calls() {
        let m = Metrics::new();
        m.record(Duration::from_millis(10));
        m.record(Duration::from_millis(5));
        let snap = m.snapshot();
        assert_eq!(snap.requests, 2);
        assert_eq!(snap.duration_nanos, Duration::from_millis(15).as_nanos() as u64);
    }

    #[test]
    fn ids_are_monotonic_and_start_at_one() {
        let gen = IdGenerator::new();
        assert_eq!(gen.generate(), 1);
        assert_eq!(gen.generate(), 2);
        assert_eq!(gen.generate(), 3);
    }
}
