//! Leaky-bucket rate limiter.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Nanoseconds since the Unix epoch.
fn epoch_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

/// The bucket's state: the deadline timestamp (nanoseconds since the epoch)
/// of the most recently admitted step.
///
/// Reads and writes are atomic; mutation happens only under the owning
/// limiter's mutex.
#[derive(Debug, Default)]
pub struct LeakyBucketState {
    current: AtomicI64,
}

impl LeakyBucketState {
    /// The current step deadline in nanoseconds.
    #[must_use]
    pub fn step(&self) -> i64 {
        self.current.load(Ordering::Acquire)
    }

    /// Set the step deadline in nanoseconds.
    pub fn set_step(&self, deadline: i64) {
        self.current.store(deadline, Ordering::Release);
    }
}

/// The outcome of a limiter check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitDecision {
    /// Whether the request was admitted.
    pub admitted: bool,
    /// Wait before the request's nominal slot. On overflow this is the
    /// projected wait had the request been queued.
    pub wait: Duration,
}

impl LimitDecision {
    /// The wait in whole seconds, for retry-after style messages.
    #[must_use]
    pub fn wait_secs(&self) -> u64 {
        self.wait.as_secs()
    }
}

/// A leaky-bucket limiter over a single deadline state.
#[derive(Debug)]
pub struct LeakyBucketLimiter {
    state: LeakyBucketState,
    /// Steps of burst allowed.
    capacity: i64,
    /// Nanoseconds per admitted step.
    rate: i64,
    lock: Mutex<()>,
}

impl LeakyBucketLimiter {
    /// Create a limiter admitting one request per `rate` with `capacity`
    /// steps of burst.
    #[must_use]
    pub fn new(capacity: i64, rate: Duration) -> Self {
        Self {
            state: LeakyBucketState::default(),
            capacity,
            // a zero rate would divide by zero below
            rate: (rate.as_nanos() as i64).max(1),
            lock: Mutex::new(()),
        }
    }

    /// The configured burst capacity in steps.
    #[must_use]
    pub fn capacity(&self) -> i64 {
        self.capacity
    }

    /// Direct access to the deadline state.
    #[must_use]
    pub fn state(&self) -> &LeakyBucketState {
        &self.state
    }

    /// Decide whether the next request is admitted.
    ///
    /// Successive admitted calls produce strictly increasing deadlines. An
    /// overflow leaves the deadline unchanged but still reports the
    /// projected wait.
    pub fn next(&self) -> LimitDecision {
        let _guard = self.lock.lock().expect("limiter lock poisoned");
        let mut step = self.state.step();
        let now = epoch_nanos();
        if now < step {
            // Outstanding steps have not drained yet; queue behind them.
            step += self.rate;
        } else {
            let since = now - step;
            step = now;
            if since < self.rate {
                // The last step landed inside the current interval; keep the
                // inter-step gap.
                step += self.rate - since;
            }
        }
        let next = step - now;
        if next / self.rate <= self.capacity {
            self.state.set_step(step);
            return LimitDecision {
                admitted: true,
                wait: Duration::from_nanos(next.max(0) as u64),
            };
        }
        LimitDecision {
            admitted: false,
            wait: Duration::from_nanos(next.max(0) as u64),
        }
    }
}
