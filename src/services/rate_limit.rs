use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub const MAX_LOGIN_ATTEMPTS: usize = 5;
pub const LOGIN_WINDOW: Duration = Duration::from_secs(300);

/// Sliding-window counter of login attempts per identifier.
///
/// Every admitted attempt is counted up front; a successful login clears the history
/// with [`reset`](Self::reset), so only failures accumulate.
#[derive(Clone)]
pub struct LoginRateLimiter {
    attempts: Arc<Mutex<HashMap<String, Vec<Instant>>>>,
    max_attempts: usize,
    window: Duration,
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new(MAX_LOGIN_ATTEMPTS, LOGIN_WINDOW)
    }
}

impl LoginRateLimiter {
    pub fn new(max_attempts: usize, window: Duration) -> Self {
        Self {
            attempts: Arc::new(Mutex::new(HashMap::new())),
            max_attempts,
            window,
        }
    }

    /// Returns `true` and counts the attempt if `identifier` is still under the limit.
    /// Counting and deciding happen under one lock, so concurrent callers cannot all
    /// slip past the limit.
    pub async fn try_acquire(&self, identifier: &str) -> bool {
        let mut attempts = self.attempts.lock().await;
        let now = Instant::now();
        let history = attempts.entry(identifier.to_owned()).or_default();
        history.retain(|t| now.duration_since(*t) < self.window);

        if history.len() >= self.max_attempts {
            return false;
        }
        history.push(now);
        true
    }

    pub async fn reset(&self, identifier: &str) {
        self.attempts.lock().await.remove(identifier);
    }

    /// Drops expired timestamps and empty identifiers; returns how many identifiers remain.
    pub async fn prune(&self) -> usize {
        let mut attempts = self.attempts.lock().await;
        let now = Instant::now();
        attempts.retain(|_, history| {
            history.retain(|t| now.duration_since(*t) < self.window);
            !history.is_empty()
        });
        attempts.len()
    }
}
