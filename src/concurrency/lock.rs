use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, error, warn};

use crate::error::{AppError, Result};

/// Distributed per-user mutual exclusion for the refresh operation.
///
/// Uses Redis SET with NX for an atomic check-and-set and EX for
/// automatic expiry. The TTL is the only recovery mechanism if a
/// holder crashes before releasing, and doubles as the upper bound on
/// run duration.
///
/// Key format: `matching_refresh:{user_id}`.
#[derive(Clone)]
pub struct RefreshLock {
    redis: ConnectionManager,
    ttl_seconds: u64,
}

pub struct LockGuardState {
    pub acquired: bool,
    /// Remaining TTL of the holder's key when contention was detected.
    pub retry_after: u64,
}

impl RefreshLock {
    pub fn new(redis: ConnectionManager, ttl_seconds: u64) -> Self {
        Self { redis, ttl_seconds }
    }

    fn key(user_id: &str) -> String {
        format!("matching_refresh:{}", user_id)
    }

    /// Try to acquire the lock for one user.
    ///
    /// Store errors propagate as `StoreUnavailable` (fail closed): we
    /// never run a refresh we cannot prove is exclusive.
    pub async fn acquire(&self, user_id: &str) -> Result<LockGuardState> {
        let key = Self::key(user_id);
        let mut conn = self.redis.clone();

        let ttl = usize::try_from(self.ttl_seconds)
            .map_err(|_| AppError::Internal("lock TTL exceeds platform limits".to_string()))?;

        let was_set: bool = conn
            .set_options(
                &key,
                "locked",
                redis::SetOptions::default()
                    .conditional_set(redis::ExistenceCheck::NX)
                    .with_expiration(redis::SetExpiry::EX(ttl)),
            )
            .await
            .map_err(|e| {
                error!("Failed to acquire refresh lock {}: {}", key, e);
                AppError::StoreUnavailable(e.to_string())
            })?;

        if was_set {
            debug!("Acquired refresh lock {} (TTL {}s)", key, self.ttl_seconds);
            return Ok(LockGuardState {
                acquired: true,
                retry_after: 0,
            });
        }

        // Contention: read the holder's remaining TTL so the caller can
        // return a retry hint.
        let remaining: i64 = conn.ttl(&key).await.map_err(|e| {
            error!("Failed to read TTL for held lock {}: {}", key, e);
            AppError::StoreUnavailable(e.to_string())
        })?;

        let retry_after = if remaining > 0 {
            remaining as u64
        } else {
            // Key expired between SET NX and TTL; the caller retries
            // immediately rather than waiting a full window.
            1
        };

        debug!("Refresh lock {} held, retry after {}s", key, retry_after);
        Ok(LockGuardState {
            acquired: false,
            retry_after,
        })
    }

    /// Release the lock. Errors are logged but swallowed: the TTL will
    /// reclaim the key, and failing the whole request over a release
    /// error would hide a successful run from the caller.
    pub async fn release(&self, user_id: &str) {
        let key = Self::key(user_id);
        let mut conn = self.redis.clone();

        match conn.del::<_, u32>(&key).await {
            Ok(deleted) if deleted > 0 => debug!("Released refresh lock {}", key),
            Ok(_) => debug!("Refresh lock {} already expired", key),
            Err(e) => warn!("Failed to release refresh lock {} (TTL will reclaim): {}", key, e),
        }
    }

    /// Whether a lock is currently held (monitoring/tests).
    pub async fn is_held(&self, user_id: &str) -> Result<bool> {
        let key = Self::key(user_id);
        let mut conn = self.redis.clone();
        let exists: bool = conn.exists(&key).await?;
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn create_test_lock(ttl: u64) -> RefreshLock {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let client = redis::Client::open(redis_url).expect("Failed to create Redis client");
        let manager = ConnectionManager::new(client)
            .await
            .expect("Failed to create connection manager");
        RefreshLock::new(manager, ttl)
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_lock_lifecycle() {
        let lock = create_test_lock(60).await;
        let user = format!("lock-test-{}", uuid::Uuid::new_v4());

        let first = lock.acquire(&user).await.unwrap();
        assert!(first.acquired);
        assert!(lock.is_held(&user).await.unwrap());

        let second = lock.acquire(&user).await.unwrap();
        assert!(!second.acquired);
        assert!(second.retry_after > 0);
        assert!(second.retry_after <= 60);

        lock.release(&user).await;
        assert!(!lock.is_held(&user).await.unwrap());

        let third = lock.acquire(&user).await.unwrap();
        assert!(third.acquired);
        lock.release(&user).await;
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_concurrent_acquire_exactly_one_wins() {
        let lock = create_test_lock(60).await;
        let user = format!("lock-race-{}", uuid::Uuid::new_v4());

        let lock1 = lock.clone();
        let lock2 = lock.clone();
        let user1 = user.clone();
        let user2 = user.clone();

        let handle1 = tokio::spawn(async move { lock1.acquire(&user1).await.unwrap().acquired });
        let handle2 = tokio::spawn(async move { lock2.acquire(&user2).await.unwrap().acquired });

        let result1 = handle1.await.unwrap();
        let result2 = handle2.await.unwrap();

        assert_ne!(result1, result2);
        assert!(result1 || result2);

        lock.release(&user).await;
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_ttl_reclaims_crashed_holder() {
        let lock = create_test_lock(1).await;
        let user = format!("lock-ttl-{}", uuid::Uuid::new_v4());

        assert!(lock.acquire(&user).await.unwrap().acquired);
        // Simulate a crashed holder: no release.
        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;

        assert!(!lock.is_held(&user).await.unwrap());
        assert!(lock.acquire(&user).await.unwrap().acquired);
        lock.release(&user).await;
    }
}
