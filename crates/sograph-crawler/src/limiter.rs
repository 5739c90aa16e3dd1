use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::{sleep, Instant};

/// Enforces a minimum interval between consecutive requests.
///
/// Clones share the same "last request" timestamp, so a single limiter
/// governs every request issued against the API quota.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    /// Waits until a request may be sent.
    ///
    /// The returned permit keeps other callers waiting until it is released
    /// or dropped.
    pub async fn acquire(&self) -> Permit {
        let guard = self.last_request.clone().lock_owned().await;
        if let Some(last) = *guard {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                sleep(self.interval - elapsed).await;
            }
        }
        Permit { guard }
    }
}

pub struct Permit {
    guard: OwnedMutexGuard<Option<Instant>>,
}

impl Permit {
    /// Records that a request was just completed.
    ///
    /// A permit dropped without being released leaves the timestamp
    /// untouched.
    pub fn release(mut self) {
        *self.guard = Some(Instant::now());
    }
}

impl fmt::Debug for Permit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permit")
            .field("last_request", &*self.guard)
            .finish()
    }
}
