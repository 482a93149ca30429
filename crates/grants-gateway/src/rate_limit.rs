/// Inbound limit on routes that spend the Simpler Grants.gov API key's quota.
///
/// Implemented as a generic cell rate: each admitted request pushes a theoretical
/// arrival time forward by one emission interval, and a request is refused while that
/// time runs more than a burst's worth of intervals ahead of now.
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::error::AppError;

#[derive(Clone)]
pub struct RateLimiter {
    rps: u32,
    interval: Duration,
    tolerance: Duration,
    next_free: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    /// `None` or zero disables limiting. Bursts of up to `rps` requests are admitted.
    pub fn from_rps(rps: Option<u32>) -> Option<Self> {
        let rps = rps.filter(|&n| n > 0)?;
        let interval = Duration::from_secs(1) / rps;
        Some(Self {
            rps,
            interval,
            tolerance: interval * (rps - 1),
            next_free: Arc::new(Mutex::new(None)),
        })
    }

    pub async fn check(&self) -> Result<(), AppError> {
        self.check_at(Instant::now()).await
    }

    async fn check_at(&self, now: Instant) -> Result<(), AppError> {
        let mut next_free = self.next_free.lock().await;
        let arrival = next_free.map_or(now, |t| t.max(now));
        let ahead = arrival.saturating_duration_since(now);
        if ahead > self.tolerance {
            return Err(AppError::RateLimited {
                rps: self.rps,
                retry_after: ahead - self.tolerance,
            });
        }
        *next_free = Some(arrival + self.interval);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_or_absent_disables_limiter() {
        assert!(RateLimiter::from_rps(None).is_none());
        assert!(RateLimiter::from_rps(Some(0)).is_none());
        assert!(RateLimiter::from_rps(Some(3)).is_some());
    }

    #[tokio::test]
    async fn burst_beyond_capacity_is_rejected() {
        let limiter = RateLimiter::from_rps(Some(2)).unwrap();
        assert!(limiter.check().await.is_ok());
        assert!(limiter.check().await.is_ok());
        let err = limiter.check().await.unwrap_err();
        assert!(matches!(err, AppError::RateLimited { rps: 2, .. }));
    }

    #[tokio::test]
    async fn capacity_returns_after_one_interval() {
        let limiter = RateLimiter::from_rps(Some(4)).unwrap();
        let start = Instant::now();
        for _ in 0..4 {
            limiter.check_at(start).await.unwrap();
        }
        match limiter.check_at(start).await {
            Err(AppError::RateLimited { retry_after, .. }) => {
                assert_eq!(retry_after, Duration::from_millis(250));
            }
            other => panic!("expected rate limit, got {other:?}"),
        }
        assert!(limiter
            .check_at(start + Duration::from_millis(250))
            .await
            .is_ok());
        assert!(limiter
            .check_at(start + Duration::from_millis(250))
            .await
            .is_err());
    }
}
