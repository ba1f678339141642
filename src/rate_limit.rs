use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Window for login attempts.
pub const LOGIN_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Every this many recorded attempts, keys with no live attempts are dropped.
const SWEEP_EVERY: u64 = 256;

/// In-memory sliding-window limiter keyed by strings such as `login:<ip_hash>`.
pub struct RateLimiter {
    entries: Mutex<HashMap<String, Vec<Instant>>>,
    calls: AtomicU64,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

fn prune(map: &mut HashMap<String, Vec<Instant>>, now: Instant, max_age: Duration) {
    map.retain(|_, attempts| {
        attempts.retain(|t| now.duration_since(*t) < max_age);
        !attempts.is_empty()
    });
}

impl RateLimiter {
    pub fn new() -> Self {
        RateLimiter {
            entries: Mutex::new(HashMap::new()),
            calls: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Instant>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record an attempt; false once `max_attempts` fall inside `window`.
    /// Client addresses come from proxy headers, so keys are swept as they expire.
    pub fn check_and_record(&self, key: &str, max_attempts: u64, window: Duration) -> bool {
        let mut map = self.lock();
        let now = Instant::now();

        if self.calls.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            prune(&mut map, now, window);
        }

        let attempts = map.entry(key.to_string()).or_default();
        attempts.retain(|t| now.duration_since(*t) < window);

        if (attempts.len() as u64) < max_attempts {
            attempts.push(now);
            true
        } else {
            false
        }
    }

    /// Forget a key, e.g. after a successful login.
    pub fn reset(&self, key: &str) {
        self.lock().remove(key);
    }

    /// Drop attempts older than `max_age` and any key left empty.
    pub fn cleanup(&self, max_age: Duration) {
        prune(&mut self.lock(), Instant::now(), max_age);
    }

    /// Number of tracked keys.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().len()
    }
}
