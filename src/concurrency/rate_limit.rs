use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, error};

use crate::error::{AppError, Result};

/// Fixed-window rate limiter for the refresh entrypoint.
///
/// One counter per user per window; the window boundary is aligned to
/// the epoch so every instance computes the same key. The counter key
/// expires with the window, so entries are recreated at each boundary.
///
/// Key format: `rate_limit:matching_refresh:{user_id}:{window_start}`.
#[derive(Clone)]
pub struct RefreshRateLimiter {
    redis: ConnectionManager,
    window_seconds: u64,
    max_requests: u32,
}

#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    /// Unix timestamp at which the current window resets.
    pub reset_at: i64,
    pub retry_after: u64,
}

impl RefreshRateLimiter {
    pub fn new(redis: ConnectionManager, window_seconds: u64, max_requests: u32) -> Self {
        Self {
            redis,
            window_seconds,
            max_requests,
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Count this request against the caller's window.
    ///
    /// Store errors propagate as `StoreUnavailable` (fail closed): an
    /// unverifiable request is rejected, never waved through.
    pub async fn check(&self, user_id: &str) -> Result<RateLimitDecision> {
        let now = Utc::now().timestamp();
        let window = self.window_seconds as i64;
        let window_start = (now / window) * window;
        let reset_at = window_start + window;

        let key = format!(
            "rate_limit:matching_refresh:{}:{}",
            user_id, window_start
        );
        let mut conn = self.redis.clone();

        let count: u32 = conn.incr(&key, 1).await.map_err(|e| {
            error!("Rate limit INCR failed for {}: {}", key, e);
            AppError::StoreUnavailable(e.to_string())
        })?;

        // First hit in the window owns setting the expiry; the key dies
        // with the window plus slack for clock skew.
        if count == 1 {
            let () = conn
                .expire(&key, window + 60)
                .await
                .map_err(|e| {
                    error!("Rate limit EXPIRE failed for {}: {}", key, e);
                    AppError::StoreUnavailable(e.to_string())
                })?;
        }

        let allowed = count <= self.max_requests;
        let remaining = self.max_requests.saturating_sub(count);
        let retry_after = if allowed {
            0
        } else {
            (reset_at - now).max(1) as u64
        };

        debug!(
            user_id,
            count, allowed, retry_after, "Rate limit check for refresh"
        );

        Ok(RateLimitDecision {
            allowed,
            remaining,
            reset_at,
            retry_after,
        })
    }
}
