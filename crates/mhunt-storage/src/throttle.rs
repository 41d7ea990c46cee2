//! Pacing strategies for calls against the shared provider quota.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Wait until the caller may issue its next request.
    async fn acquire(&self);
}

/// Grants one permit per `interval`; the first grant is immediate.
#[derive(Debug)]
pub struct FixedIntervalGate {
    interval: Duration,
    last_grant: Mutex<Option<Instant>>,
}

impl FixedIntervalGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_grant: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[async_trait]
impl RateLimiter for FixedIntervalGate {
    async fn acquire(&self) {
        let mut last = self.last_grant.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.interval;
            if Instant::now() < ready_at {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[derive(Debug)]
pub struct SimpleTokenBucket {
    capacity: u32,
    refill_every: Duration,
    state: Mutex<TokenBucketState>,
}

#[derive(Debug, Clone, Copy)]
struct TokenBucketState {
    tokens: u32,
    last_refill: Instant,
}

impl SimpleTokenBucket {
    pub fn new(capacity: u32, refill_every: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            refill_every,
            state: Mutex::new(TokenBucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }
}

#[async_trait]
impl RateLimiter for SimpleTokenBucket {
    /// A zero refill interval means no limit.
    async fn acquire(&self) {
        if self.refill_every.is_zero() {
            return;
        }
        loop {
            let mut state = self.state.lock().await;
            let elapsed = state.last_refill.elapsed();
            let refills = (elapsed.as_nanos() / self.refill_every.as_nanos()).min(u128::from(u32::MAX)) as u32;
            if refills > 0 {
                state.tokens = state.tokens.saturating_add(refills).min(self.capacity);
                // Advance by whole intervals so partial progress carries over.
                state.last_refill += self.refill_every * refills;
            }

            if state.tokens > 0 {
                state.tokens -= 1;
                return;
            }

            let next_refill = state.last_refill + self.refill_every;
            drop(state);
            tokio::time::sleep_until(next_refill).await;
        }
    }
}
