use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

#[derive(Debug, Default)]
pub struct SubmissionStats {
    pub dispatched: AtomicU64,
    pub failed: AtomicU64,
    pub cancelled: AtomicU64,

    // Gauge-like, last observed value only
    pub last_wait_ms: AtomicU64,
    pub last_dispatch_latency_ms: AtomicU64,
}

impl SubmissionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_wait(&self, ms: u64) {
        self.last_wait_ms.store(ms, Ordering::Relaxed);
    }

    pub fn update_dispatch_latency(&self, ms: u64) {
        self.last_dispatch_latency_ms.store(ms, Ordering::Relaxed);
    }

    pub fn log_stats(&self) {
        let dispatched = self.dispatched.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let cancelled = self.cancelled.load(Ordering::Relaxed);
        let wait = self.last_wait_ms.load(Ordering::Relaxed);
        let latency = self.last_dispatch_latency_ms.load(Ordering::Relaxed);

        info!(
            "STATS: Submissions: {} Dispatched, {} Failed, {} Cancelled | Last wait {}ms, Dispatch {}ms",
            dispatched, failed, cancelled, wait, latency
        );
    }
}
