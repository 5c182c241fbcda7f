use std::future::Future;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::{AppError, Result};
use crate::utils::time::TimeUnit;

/// Gap-based admission gate.
///
/// Enforces a minimum spacing of `window / max_requests` between consecutive
/// admissions, which averages out to at most `max_requests` per window. A caller
/// arriving after a long idle gap is admitted at once, so bursts after idle periods
/// are possible.
///
/// The gate lock is held by the returned [`AdmissionPermit`] until the caller
/// records completion or drops it, so the whole wait, dispatch and record sequence
/// is serialized across callers.
#[derive(Debug)]
pub struct AdmissionGate {
    window: Duration,
    max_requests: u32,
    max_rate_per_ms: f64,
    sleep_quantum: Duration,
    state: Mutex<GateState>,
}

#[derive(Debug, Default)]
struct GateState {
    // None until the first admitted request completes.
    last_admitted: Option<Instant>,
}

impl GateState {
    fn record(&mut self, at: Instant) {
        self.last_admitted = Some(match self.last_admitted {
            Some(prev) => prev.max(at),
            None => at,
        });
    }
}

impl AdmissionGate {
    pub fn new(time_unit: TimeUnit, request_limit: u32) -> Result<Self> {
        if request_limit == 0 {
            return Err(AppError::Init("Request limit must be positive".into()));
        }

        let window_ms = time_unit.millis_per_unit();
        if window_ms == 0 {
            return Err(AppError::Init(format!(
                "Time unit {} is shorter than one millisecond",
                time_unit
            )));
        }

        let max_rate_per_ms = request_limit as f64 / window_ms as f64;
        // Clamped to 1ms so very high limits never spin on a zero-length sleep.
        let quantum_ms = ((window_ms as f64 / request_limit as f64).round() as u64).max(1);

        Ok(Self {
            window: Duration::from_millis(window_ms),
            max_requests: request_limit,
            max_rate_per_ms,
            sleep_quantum: Duration::from_millis(quantum_ms),
            state: Mutex::new(GateState::default()),
        })
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Maximum allowed instantaneous rate, in requests per millisecond.
    pub fn max_rate_per_ms(&self) -> f64 {
        self.max_rate_per_ms
    }

    pub fn sleep_quantum(&self) -> Duration {
        self.sleep_quantum
    }

    /// Timestamp of the most recent completed admission.
    /// Waits for the gate lock, so it blocks while a permit is outstanding.
    pub async fn last_admitted(&self) -> Option<Instant> {
        self.state.lock().await.last_admitted
    }

    /// Returns true if admitting a request at `now` would exceed the configured rate.
    pub fn exceeds_limit(&self, now: Instant, last_admitted: Option<Instant>) -> bool {
        let Some(last) = last_admitted else {
            return false;
        };

        let gap_ms = now.saturating_duration_since(last).as_millis();
        if gap_ms == 0 {
            // Two requests in the same millisecond: infinite instantaneous rate.
            return true;
        }

        let actual_rate = 1.0 / gap_ms as f64;
        actual_rate > self.max_rate_per_ms
    }

    /// Waits until the caller may be admitted and returns an exclusive permit.
    ///
    /// Dropping the returned future cancels the wait without touching gate state.
    pub async fn acquire(&self) -> AdmissionPermit<'_> {
        let state = self.state.lock().await;
        let mut now = Instant::now();

        if self.exceeds_limit(now, state.last_admitted) {
            debug!(
                quantum_ms = self.sleep_quantum.as_millis() as u64,
                "Rate limit reached, waiting for admission"
            );
            while self.exceeds_limit(now, state.last_admitted) {
                tokio::time::sleep(self.sleep_quantum).await;
                now = Instant::now();
                trace!("Re-checking admission");
            }
        }

        trace!("Request admitted");
        AdmissionPermit {
            state,
            admitted_at: now,
        }
    }

    /// Like [`acquire`](Self::acquire), but aborts with [`AppError::CancelledWait`]
    /// as soon as `cancel` resolves.
    pub async fn acquire_until<F>(&self, cancel: F) -> Result<AdmissionPermit<'_>>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            permit = self.acquire() => Ok(permit),
            _ = cancel => {
                debug!("Admission wait cancelled");
                Err(AppError::CancelledWait)
            }
        }
    }
}

/// Exclusive admission rights. Holds the gate lock until consumed or dropped.
#[derive(Debug)]
pub struct AdmissionPermit<'a> {
    state: MutexGuard<'a, GateState>,
    admitted_at: Instant,
}

impl AdmissionPermit<'_> {
    /// The instant the admission check passed.
    pub fn admitted_at(&self) -> Instant {
        self.admitted_at
    }

    /// Stores `at` as the latest admission and releases the gate.
    /// Timestamps older than the stored one are ignored.
    pub fn record_completion(mut self, at: Instant) {
        self.state.record(at);
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn per_minute(limit: u32) -> AdmissionGate {
        AdmissionGate::new(TimeUnit::Minutes, limit).unwrap()
    }

    #[test]
    fn test_derived_constants() {
        let gate = per_minute(10);

        assert_eq!(gate.window(), Duration::from_secs(60));
        assert_eq!(gate.max_requests(), 10);
        assert_eq!(gate.sleep_quantum(), Duration::from_millis(6000));
        assert!((gate.max_rate_per_ms() - 10.0 / 60_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_quantum_rounding() {
        // 1000 / 3 = 333.33 -> 333
        let gate = AdmissionGate::new(TimeUnit::Seconds, 3).unwrap();
        assert_eq!(gate.sleep_quantum(), Duration::from_millis(333));

        // 1000 / 5000 rounds to 0, clamped to 1ms
        let gate = AdmissionGate::new(TimeUnit::Seconds, 5000).unwrap();
        assert_eq!(gate.sleep_quantum(), Duration::from_millis(1));
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(matches!(
            AdmissionGate::new(TimeUnit::Minutes, 0),
            Err(AppError::Init(_))
        ));
        assert!(matches!(
            AdmissionGate::new(TimeUnit::Microseconds, 10),
            Err(AppError::Init(_))
        ));
    }

    #[test]
    fn test_exceeds_limit() {
        let gate = per_minute(10);
        let last = Instant::now();

        // Never admitted
        assert!(!gate.exceeds_limit(last, None));

        // Same millisecond is treated as infinite rate
        assert!(gate.exceeds_limit(last, Some(last)));

        assert!(gate.exceeds_limit(last + Duration::from_millis(5999), Some(last)));
        assert!(!gate.exceeds_limit(last + Duration::from_millis(6000), Some(last)));

        // Clock behind the last admission
        assert!(gate.exceeds_limit(last, Some(last + Duration::from_millis(10))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_acquire_does_not_wait() {
        let gate = per_minute(10);
        let start = Instant::now();

        let permit = gate.acquire().await;

        assert_eq!(permit.admitted_at(), start);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_acquire_waits_for_quantum() {
        let gate = per_minute(10);

        let first = gate.acquire().await;
        let first_at = first.admitted_at();
        first.record_completion(first_at);

        tokio::time::advance(Duration::from_millis(100)).await;

        let second = gate.acquire().await;
        assert!(second.admitted_at() - first_at >= Duration::from_millis(6000));
        let second_at = second.admitted_at();
        second.record_completion(second_at);

        assert!(gate.last_admitted().await.unwrap() - first_at >= Duration::from_millis(6000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_after_idle() {
        let gate = per_minute(10);

        let permit = gate.acquire().await;
        let at = permit.admitted_at();
        permit.record_completion(at);

        tokio::time::advance(Duration::from_secs(3600)).await;

        let before = Instant::now();
        let permit = gate.acquire().await;
        assert_eq!(permit.admitted_at(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_completion_is_monotonic() {
        let gate = per_minute(10);

        let permit = gate.acquire().await;
        let first_at = permit.admitted_at();
        permit.record_completion(first_at + Duration::from_millis(10));

        let permit = gate.acquire().await;
        permit.record_completion(first_at);

        assert_eq!(
            gate.last_admitted().await,
            Some(first_at + Duration::from_millis(10))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_wait_leaves_state_untouched() {
        let gate = per_minute(10);

        let permit = gate.acquire().await;
        let first_at = permit.admitted_at();
        permit.record_completion(first_at);

        let result = gate
            .acquire_until(tokio::time::sleep(Duration::from_millis(100)))
            .await;
        assert!(matches!(result, Err(AppError::CancelledWait)));
        assert_eq!(gate.last_admitted().await, Some(first_at));

        // Later callers are not blocked by the cancelled one
        let permit = gate.acquire().await;
        assert!(permit.admitted_at() - first_at >= Duration::from_millis(6000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_lock_held() {
        let gate = Arc::new(per_minute(10));

        let held = gate.acquire().await;

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move {
                gate.acquire_until(tokio::time::sleep(Duration::from_millis(50)))
                    .await
                    .map(|_| ())
            })
        };

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(AppError::CancelledWait)));

        drop(held);
        assert_eq!(gate.last_admitted().await, None);

        // Dropped permit released the lock without recording
        let permit = gate.acquire().await;
        assert_eq!(permit.admitted_at(), Instant::now());
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_admissions_are_spaced() {
        let gate = Arc::new(AdmissionGate::new(TimeUnit::Seconds, 4).unwrap());
        let mut handles = vec![];

        for _ in 0..8 {
            let gate = gate.clone();
            handles.push(tokio::spawn(async move {
                let permit = gate.acquire().await;
                let at = permit.admitted_at();
                permit.record_completion(at);
                at
            }));
        }

        let mut admitted = vec![];
        for h in handles {
            admitted.push(h.await.unwrap());
        }
        admitted.sort();

        for pair in admitted.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(250));
        }
    }
}
