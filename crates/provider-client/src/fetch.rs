use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// Result of one attempt against a rate-limited collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    Success(T),
    RateLimited,
    Failed(String),
}

impl<T> FetchOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }
}

/// Injected sleep so retry loops can be tested without waiting.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real clock backed by `tokio::time::sleep`. Narrative callers pass it to
/// `generate_with_retry`; tests substitute a recording clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Run `attempt` up to `max_attempts` times, sleeping `delay` between tries.
/// Only `RateLimited` is retried; `Success` and `Failed` return immediately.
pub async fn retry_with_clock<T, F, Fut>(
    clock: &dyn Clock,
    max_attempts: u32,
    delay: Duration,
    mut attempt: F,
) -> FetchOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = FetchOutcome<T>>,
{
    for n in 0..max_attempts {
        match attempt(n).await {
            FetchOutcome::RateLimited => {
                tracing::warn!("Rate limited, attempt {}/{}", n + 1, max_attempts);
                if n + 1 < max_attempts {
                    clock.sleep(delay).await;
                }
            }
            other => return other,
        }
    }
    FetchOutcome::RateLimited
}
