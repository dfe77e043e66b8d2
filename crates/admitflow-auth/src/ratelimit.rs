//! Per-principal request rate limiting.
//!
//! Counters live behind the [`RateLimitStore`] trait so the limiter can be
//! backed by a shared cache when the gateway runs as several replicas. The
//! in-process [`InMemoryRateLimitStore`] is owned by whoever constructs it;
//! there is no global state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{AuthError, Result};

/// Snapshot of a counter after an increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    /// Requests counted in the current window, including this one.
    pub count: u64,
    /// Time until the window resets.
    pub resets_in: Duration,
}

/// Key → counter store with a TTL per key.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Increment the counter for `key`, starting a fresh window of length
    /// `window` if none is open.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store is unavailable.
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount>;
}

#[derive(Debug)]
struct Window {
    count: u64,
    expires_at: Instant,
}

/// Entries beyond which expired windows are swept on write.
const SWEEP_THRESHOLD: usize = 1024;

/// Process-local rate-limit store.
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    windows: Mutex<HashMap<String, Window>>,
}

impl InMemoryRateLimitStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked keys, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.windows.lock().len()
    }

    /// Returns true if no keys are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.windows.lock().is_empty()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount> {
        let now = Instant::now();
        let mut windows = self.windows.lock();

        if windows.len() >= SWEEP_THRESHOLD {
            windows.retain(|_, w| w.expires_at > now);
        }

        let entry = windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            expires_at: now + window,
        });
        if entry.expires_at <= now {
            entry.count = 0;
            entry.expires_at = now + window;
        }
        entry.count += 1;

        Ok(WindowCount {
            count: entry.count,
            resets_in: entry.expires_at.saturating_duration_since(now),
        })
    }
}

/// Fixed-window rate limiter over an injected store.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    limit: u64,
    window: Duration,
}

impl RateLimiter {
    /// Create a limiter admitting `limit` requests per `window` per key.
    #[must_use]
    pub fn new(store: Arc<dyn RateLimitStore>, limit: u64, window: Duration) -> Self {
        Self {
            store,
            limit,
            window,
        }
    }

    /// Create a limiter admitting `limit` requests per minute per key.
    #[must_use]
    pub fn per_minute(store: Arc<dyn RateLimitStore>, limit: u64) -> Self {
        Self::new(store, limit, Duration::from_secs(60))
    }

    /// Count a request for `key` and decide whether to admit it.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::RateLimited` once the window's budget is spent, or
    /// the store's error if counting fails.
    pub async fn check(&self, key: &str) -> Result<()> {
        let current = self.store.increment(key, self.window).await?;
        if current.count > self.limit {
            tracing::debug!(key, count = current.count, limit = self.limit, "Rate limit exceeded");
            return Err(AuthError::RateLimited {
                retry_after_secs: current.resets_in.as_secs().max(1),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("limit", &self.limit)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admits_up_to_limit() {
        let limiter = RateLimiter::per_minute(Arc::new(InMemoryRateLimitStore::new()), 3);

        for _ in 0..3 {
            limiter.check("user-a").await.unwrap();
        }
        let result = limiter.check("user-a").await;
        assert!(matches!(
            result,
            Err(AuthError::RateLimited { retry_after_secs }) if retry_after_secs > 0
        ));
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let limiter = RateLimiter::per_minute(Arc::new(InMemoryRateLimitStore::new()), 1);

        limiter.check("user-a").await.unwrap();
        limiter.check("user-b").await.unwrap();
        assert!(limiter.check("user-a").await.is_err());
    }

    #[tokio::test]
    async fn window_resets_after_ttl() {
        let store = Arc::new(InMemoryRateLimitStore::new());
        let limiter = RateLimiter::new(store.clone(), 1, Duration::from_millis(20));

        limiter.check("user-a").await.unwrap();
        assert!(limiter.check("user-a").await.is_err());

        tokio::time::sleep(Duration::from_millis(40)).await;
        limiter.check("user-a").await.unwrap();
        assert_eq!(store.len(), 1);
    }
}
