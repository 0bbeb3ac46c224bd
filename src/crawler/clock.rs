//! Time source for the scheduler loop
//!
//! Scheduling decisions and sleeps go through [`Clock`] so the loop can run
//! against virtual time.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Wall-clock time and sleeping
pub trait Clock {
    /// Current time
    fn now(&self) -> DateTime<Utc>;

    /// Waits for `duration` to pass
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// The real clock: `Utc::now` and `tokio::time::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

/// A clock that only moves when told to
///
/// `sleep` advances the virtual time by the requested duration and yields to
/// the runtime once. Every requested sleep is recorded.
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualClockState>>,
}

#[derive(Debug)]
struct ManualClockState {
    now: DateTime<Utc>,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManualClockState {
                now: start,
                sleeps: Vec::new(),
            })),
        }
    }

    /// Moves the clock forward
    pub fn advance(&self, duration: Duration) {
        let delta =
            chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero());
        let mut state = self.lock();
        state.now += delta;
    }

    /// Sets the clock to an absolute time
    pub fn set(&self, now: DateTime<Utc>) {
        self.lock().now = now;
    }

    /// Durations passed to `sleep` so far, in call order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.lock().sleeps.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualClockState> {
        // A poisoned lock still holds a usable timestamp
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.lock().now
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        self.lock().sleeps.push(duration);
        self.advance(duration);
        tokio::task::yield_now()
    }
}
