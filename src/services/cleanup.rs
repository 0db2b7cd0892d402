use std::time::Duration;

use crate::services::rate_limit::LoginRateLimiter;

pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Periodic housekeeping for in-memory state.
pub struct CleanupService {
    login_limiter: LoginRateLimiter,
    interval: Duration,
}

impl CleanupService {
    pub fn new(login_limiter: LoginRateLimiter) -> Self {
        Self {
            login_limiter,
            interval: CLEANUP_INTERVAL,
        }
    }

    pub async fn run_scheduler(self) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Cleanup scheduler started");
        let mut interval = tokio::time::interval(self.interval);
        // The first tick fires immediately; there is nothing to prune yet.
        interval.tick().await;

        loop {
            interval.tick().await;
            self.run_once().await;
        }
    }

    /// Prunes once; returns how many identifiers are still tracked.
    pub async fn run_once(&self) -> usize {
        let tracked = self.login_limiter.prune().await;
        tracing::debug!(tracked, "Login limiter pruned");
        tracked
    }
}
