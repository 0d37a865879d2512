//! Per-client login failure tracking with a fixed lockout window.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::{get_json, set_json, KvStore, StoreError};
use crate::db::models::LoginAttempts;

const RATE_LIMIT_PREFIX: &str = "ratelimit:login:";

/// Failures allowed inside one window before the client is locked out.
pub const MAX_ATTEMPTS: u32 = 5;

/// Length of both the counting window and the lockout.
pub const WINDOW_MINUTES: i64 = 15;

fn window() -> Duration {
    Duration::minutes(WINDOW_MINUTES)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    pub allowed: bool,
    pub remaining_attempts: u32,
    pub lockout_until: Option<DateTime<Utc>>,
}

impl RateLimitStatus {
    /// Whole minutes until the lockout ends, rounded up.
    pub fn minutes_remaining(&self, now: DateTime<Utc>) -> i64 {
        match self.lockout_until {
            Some(until) if until > now => {
                let seconds = (until - now).num_seconds();
                (seconds + 59) / 60
            }
            _ => 0,
        }
    }
}

#[derive(Clone)]
pub struct LoginRateLimiter {
    store: Arc<dyn KvStore>,
}

/// Drops an elapsed lockout and a stale counter.
fn normalize(mut attempts: LoginAttempts, now: DateTime<Utc>) -> LoginAttempts {
    if let Some(until) = attempts.locked_until {
        if until <= now {
            attempts.count = 0;
            attempts.locked_until = None;
        }
    }
    if attempts.locked_until.is_none() && now - attempts.last_attempt > window() {
        attempts.count = 0;
    }
    attempts
}

impl LoginRateLimiter {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    fn key(client: &str) -> String {
        format!("{RATE_LIMIT_PREFIX}{client}")
    }

    async fn load(&self, client: &str, now: DateTime<Utc>) -> Result<Option<LoginAttempts>, StoreError> {
        Ok(get_json::<LoginAttempts>(self.store.as_ref(), &Self::key(client))
            .await?
            .map(|attempts| normalize(attempts, now)))
    }

    pub async fn check(&self, client: &str, now: DateTime<Utc>) -> Result<RateLimitStatus, StoreError> {
        let Some(attempts) = self.load(client, now).await? else {
            return Ok(RateLimitStatus {
                allowed: true,
                remaining_attempts: MAX_ATTEMPTS,
                lockout_until: None,
            });
        };

        if let Some(until) = attempts.locked_until {
            return Ok(RateLimitStatus {
                allowed: false,
                remaining_attempts: 0,
                lockout_until: Some(until),
            });
        }

        Ok(RateLimitStatus {
            allowed: attempts.count < MAX_ATTEMPTS,
            remaining_attempts: MAX_ATTEMPTS.saturating_sub(attempts.count),
            lockout_until: None,
        })
    }

    /// Counts a failed login and locks the client out on the last allowed failure.
    pub async fn record_failure(
        &self,
        client: &str,
        now: DateTime<Utc>,
    ) -> Result<RateLimitStatus, StoreError> {
        let mut attempts = self.load(client, now).await?.unwrap_or(LoginAttempts {
            count: 0,
            last_attempt: now,
            locked_until: None,
        });

        attempts.count += 1;
        attempts.last_attempt = now;
        if attempts.count >= MAX_ATTEMPTS {
            attempts.locked_until = Some(now + window());
            tracing::warn!(client = %client, attempts = attempts.count, "login locked out");
        }

        set_json(
            self.store.as_ref(),
            &Self::key(client),
            &attempts,
            Some(window()),
        )
        .await?;

        Ok(RateLimitStatus {
            allowed: attempts.locked_until.is_none(),
            remaining_attempts: MAX_ATTEMPTS.saturating_sub(attempts.count),
            lockout_until: attempts.locked_until,
        })
    }

    pub async fn clear(&self, client: &str) -> Result<(), StoreError> {
        self.store.delete(&Self::key(client)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn limiter() -> LoginRateLimiter {
        LoginRateLimiter::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_fresh_client_is_allowed() {
        let status = limiter().check("10.0.0.1", Utc::now()).await.unwrap();
        assert!(status.allowed);
        assert_eq!(status.remaining_attempts, MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_fifth_failure_locks_client() {
        let limiter = limiter();
        let now = Utc::now();

        for attempt in 1..MAX_ATTEMPTS {
            let status = limiter.record_failure("10.0.0.1", now).await.unwrap();
            assert!(status.allowed);
            assert_eq!(status.remaining_attempts, MAX_ATTEMPTS - attempt);
        }
        let status = limiter.record_failure("10.0.0.1", now).await.unwrap();
        assert!(!status.allowed);

        let status = limiter.check("10.0.0.1", now).await.unwrap();
        assert!(!status.allowed);
        assert_eq!(status.lockout_until, Some(now + window()));
        assert_eq!(status.minutes_remaining(now), WINDOW_MINUTES);

        // other clients are unaffected
        assert!(limiter.check("10.0.0.2", now).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_clear_resets_counter() {
        let limiter = limiter();
        let now = Utc::now();
        for _ in 0..MAX_ATTEMPTS - 1 {
            limiter.record_failure("10.0.0.1", now).await.unwrap();
        }
        limiter.clear("10.0.0.1").await.unwrap();

        let status = limiter.check("10.0.0.1", now).await.unwrap();
        assert_eq!(status.remaining_attempts, MAX_ATTEMPTS);
    }

    #[test]
    fn test_normalize_expires_lockout_and_stale_counter() {
        let now = Utc::now();
        let locked = LoginAttempts {
            count: MAX_ATTEMPTS,
            last_attempt: now - Duration::minutes(20),
            locked_until: Some(now - Duration::minutes(1)),
        };
        let reset = normalize(locked, now);
        assert_eq!(reset.count, 0);
        assert!(reset.locked_until.is_none());

        let stale = LoginAttempts {
            count: 3,
            last_attempt: now - Duration::minutes(16),
            locked_until: None,
        };
        assert_eq!(normalize(stale, now).count, 0);

        let recent = LoginAttempts {
            count: 3,
            last_attempt: now - Duration::minutes(5),
            locked_until: None,
        };
        assert_eq!(normalize(recent, now).count, 3);
    }
}
