// Retry coordination: wraps one logical provider operation with
// backoff-governed repetition across the endpoint pool.
//
// Implements exponential backoff with jitter, max delay cap, and error
// classification via `ResolveError::is_retryable`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::RngExt;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::endpoint::{EndpointHandle, EndpointPool};
use crate::error::ResolveError;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retry budget per endpoint; the global attempt ceiling is
    /// `endpoints * attempts_per_endpoint`.
    pub attempts_per_endpoint: u32,
    /// Base delay between attempts. Actual delay = base * 2^attempt + jitter.
    pub base_delay: Duration,
    /// Hard cap on the computed delay to prevent unbounded growth.
    pub max_delay: Duration,
    /// When true, adds random jitter of [0, base_delay/2) to prevent
    /// hammering a recovering mirror in lockstep.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts_per_endpoint: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(15),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Compute the delay for a given attempt number (0-indexed).
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        // Avoid `Duration` overflow and keep this O(1) even for misconfigured
        // `attempt`. 2^attempt is computed with a checked shift so attempts
        // >= 32 saturate.
        let multiplier = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let exp_delay = self
            .base_delay
            .checked_mul(multiplier)
            .unwrap_or(self.max_delay);
        let capped = exp_delay.min(self.max_delay);

        if !self.jitter {
            return capped;
        }

        // Jitter is limited so the final delay never exceeds `max_delay`.
        let jitter_range_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX) / 2;
        if jitter_range_ms == 0 {
            return capped;
        }

        let remaining_ms =
            u64::try_from(self.max_delay.saturating_sub(capped).as_millis()).unwrap_or(0);
        let jitter_limit_ms = jitter_range_ms.min(remaining_ms);
        if jitter_limit_ms == 0 {
            return capped;
        }

        let jitter_ms = rand::rng().random_range(0..jitter_limit_ms);
        (capped + Duration::from_millis(jitter_ms)).min(self.max_delay)
    }
}

/// Drives one logical request (resolve, search, stream fetch, transfer)
/// through the pool until it succeeds, fails fatally, or the attempt budget
/// runs out.
#[derive(Clone)]
pub struct RetryCoordinator {
    pool: Arc<EndpointPool>,
    policy: RetryPolicy,
    token: CancellationToken,
}

impl RetryCoordinator {
    pub fn new(pool: Arc<EndpointPool>, policy: RetryPolicy, token: CancellationToken) -> Self {
        Self {
            pool,
            policy,
            token,
        }
    }

    pub fn pool(&self) -> &Arc<EndpointPool> {
        &self.pool
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Execute `operation` against pool-selected endpoints.
    ///
    /// Transient failures report to the pool and back off before the next
    /// attempt. Fatal failures propagate immediately; a semantic miss
    /// (`NotFound`) still counts as a healthy exchange for the endpoint
    /// that answered it.
    pub async fn execute<F, Fut, T>(
        &self,
        operation_name: &'static str,
        operation: F,
    ) -> Result<T, ResolveError>
    where
        F: Fn(EndpointHandle) -> Fut,
        Fut: Future<Output = Result<T, ResolveError>>,
    {
        let ceiling = (self.pool.len() as u32)
            .saturating_mul(self.policy.attempts_per_endpoint)
            .max(1);

        for attempt in 0..ceiling {
            if self.token.is_cancelled() {
                return Err(ResolveError::Cancelled);
            }

            let Some(endpoint) = self.pool.next_candidate() else {
                warn!(operation = operation_name, "every endpoint is cooling down");
                return Err(ResolveError::PoolExhausted);
            };

            match operation(endpoint.clone()).await {
                Ok(value) => {
                    self.pool.report_success(endpoint.id);
                    return Ok(value);
                }
                Err(err) if err.is_retryable() => {
                    self.pool.report_failure(endpoint.id);
                    if attempt + 1 >= ceiling {
                        warn!(
                            operation = operation_name,
                            attempts = ceiling,
                            error = %err,
                            "retry budget exhausted"
                        );
                        return Err(ResolveError::Exhausted { attempts: ceiling });
                    }
                    let delay = self.policy.delay_for_attempt(attempt);
                    warn!(
                        operation = operation_name,
                        endpoint = %endpoint.base_url,
                        attempt = attempt + 1,
                        max = ceiling,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after transient error"
                    );
                    tokio::select! {
                        _ = self.token.cancelled() => {
                            return Err(ResolveError::Cancelled);
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(err) => {
                    // The endpoint answered; the miss is about the track,
                    // not the mirror.
                    if err.is_not_found() {
                        self.pool.report_success(endpoint.id);
                    }
                    return Err(err);
                }
            }
        }

        Err(ResolveError::Exhausted { attempts: ceiling })
    }
}
