//! TTL-keyed registry of per-IP limiters.

use super::limiter::LeakyBucketLimiter;
use crate::shutdown::StopHandle;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

struct Entry {
    limiter: Arc<LeakyBucketLimiter>,
    deadline: Instant,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    // Expiry-ordered queue of (deadline, key). Refreshes push a new pair and
    // leave the stale one behind; the sweep revalidates against the map.
    expirations: BinaryHeap<Reverse<(Instant, String)>>,
}

/// Maps client IPs to their rate limiters, forgetting entries that go
/// unused for one TTL. Both `get` and `set` refresh the entry's TTL.
pub struct IpRegistry {
    ttl: Duration,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for IpRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpRegistry")
            .field("ttl", &self.ttl)
            .field("len", &self.len())
            .finish()
    }
}

impl IpRegistry {
    /// Create a registry whose entries live for `ttl` past their last use.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// The registry's entry TTL.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The limiter for the given IP, or `None` once its TTL has elapsed.
    /// A hit refreshes the TTL and returns the same limiter instance.
    #[must_use]
    pub fn get(&self, ip: IpAddr) -> Option<Arc<LeakyBucketLimiter>> {
        let key = ip.to_string();
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("registry lock poisoned");

        let expired = match inner.entries.get(&key) {
            Some(entry) => entry.deadline <= now,
            None => return None,
        };
        if expired {
            inner.entries.remove(&key);
            return None;
        }

        let deadline = now + self.ttl;
        let limiter = {
            let entry = inner.entries.get_mut(&key).expect("entry checked above");
            entry.deadline = deadline;
            Arc::clone(&entry.limiter)
        };
        inner.expirations.push(Reverse((deadline, key)));
        Some(limiter)
    }

    /// Register the limiter for the given IP.
    pub fn set(&self, ip: IpAddr, limiter: Arc<LeakyBucketLimiter>) {
        let key = ip.to_string();
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        let deadline = now + self.ttl;
        inner.entries.insert(
            key.clone(),
            Entry { limiter, deadline },
        );
        inner.expirations.push(Reverse((deadline, key)));
    }

    /// Drop every entry whose TTL elapsed at or before `now`.
    pub fn delete_expired(&self, now: Instant) {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        let mut removed = 0usize;
        while let Some(Reverse((deadline, _))) = inner.expirations.peek() {
            if *deadline > now {
                break;
            }
            let Some(Reverse((_, key))) = inner.expirations.pop() else {
                break;
            };
            // A refresh may have superseded this queue entry.
            if let Some(entry) = inner.entries.get(&key) {
                if entry.deadline <= now {
                    inner.entries.remove(&key);
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            debug!(removed, "expired rate limiters removed");
        }
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("registry lock poisoned").entries.len()
    }

    /// True when the registry holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start the garbage collection sweep, ticking once per TTL.
    #[must_use]
    pub fn gc(self: &Arc<Self>) -> StopHandle {
        let registry = Arc::clone(self);
        let (tx, mut rx) = StopHandle::channel();
        // A zero TTL would busy-spin the sweeper.
        let period = if self.ttl.is_zero() {
            Duration::from_secs(1)
        } else {
            self.ttl
        };
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick of a tokio interval fires immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = ticker.tick() => registry.delete_expired(Instant::now()),
                }
            }
        });
        StopHandle::new(tx, task)
    }
}
