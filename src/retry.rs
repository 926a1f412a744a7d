//! Bounded fixed-interval retry around a completion call.
//!
//! Only [`CompletionError::RateLimited`] is retried; every other failure
//! propagates immediately. Exhaustion is an explicit, user-visible outcome
//! ([`RetryError::Exhausted`]) rather than a silently dropped reply.
//!
//! Fixed interval, no jitter — acceptable for the small attempt budget.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::llm::CompletionError;

/// Default maximum attempt count.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default back-off between rate-limited attempts.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum RetryError {
    /// Every attempt was rate-limited; the attempt budget is spent.
    #[error("rate limited — retry budget exhausted after {attempts} attempts")]
    Exhausted { attempts: u32 },

    /// A non-retryable failure, surfaced from the first attempt that hit it.
    #[error("completion failed: {0}")]
    Fatal(CompletionError),
}

/// Retry parameters, resolved from config at startup.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: DEFAULT_MAX_ATTEMPTS, backoff: DEFAULT_BACKOFF }
    }
}

/// Run `op` up to `policy.max_attempts` times.
///
/// Sleeps `policy.backoff` between rate-limited attempts; the sleep only
/// ever happens on a background worker, never on the synchronous inbound
/// path.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CompletionError>>,
{
    for attempt in 1..=policy.max_attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(CompletionError::RateLimited) => {
                warn!(attempt, max_attempts = policy.max_attempts, "rate limited");
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.backoff).await;
                }
            }
            Err(e) => return Err(RetryError::Fatal(e)),
        }
    }
    Err(RetryError::Exhausted { attempts: policy.max_attempts })
}
