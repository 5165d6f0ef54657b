//! Endpoint pool: health tracking and rotation over the mirror list.
//!
//! Selection is round-robin over endpoints not currently in cooldown. An
//! endpoint accumulates consecutive failures; once the configured threshold
//! is crossed it cools down for a bounded-exponential window. A single
//! successful exchange fully rehabilitates it.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::PoolConfig;

/// Stable handle to one endpoint in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointId(usize);

/// A selected endpoint, detached from the pool's internal state so callers
/// never hold the pool lock across a request.
#[derive(Debug, Clone)]
pub struct EndpointHandle {
    pub id: EndpointId,
    pub base_url: String,
}

#[derive(Debug)]
struct EndpointState {
    base_url: String,
    consecutive_failures: u32,
    cooldown_until: Option<Instant>,
}

impl EndpointState {
    fn in_cooldown(&self, now: Instant) -> bool {
        self.cooldown_until.is_some_and(|until| until > now)
    }
}

/// Aggregate exchange counters, reported in the session summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub successes: u64,
    pub failures: u64,
}

impl PoolStats {
    pub fn total(&self) -> u64 {
        self.successes + self.failures
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.successes as f64 / total as f64 * 100.0
    }
}

struct PoolInner {
    endpoints: Vec<EndpointState>,
    cursor: usize,
    stats: PoolStats,
}

/// The set of interchangeable backend endpoints with per-endpoint health.
///
/// All state lives behind a single mutex so selection and reporting stay
/// atomic should callers ever run concurrently.
pub struct EndpointPool {
    config: PoolConfig,
    inner: Mutex<PoolInner>,
}

impl EndpointPool {
    pub fn new(base_urls: impl IntoIterator<Item = String>, config: PoolConfig) -> Self {
        let endpoints = base_urls
            .into_iter()
            .map(|url| EndpointState {
                base_url: url.trim_end_matches('/').to_string(),
                consecutive_failures: 0,
                cooldown_until: None,
            })
            .collect();
        Self {
            config,
            inner: Mutex::new(PoolInner {
                endpoints,
                cursor: 0,
                stats: PoolStats::default(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Round-robin selection over endpoints not in cooldown. `None` means
    /// the whole pool is cooling down and the caller must surface a
    /// pool-exhausted condition instead of blocking.
    pub fn next_candidate(&self) -> Option<EndpointHandle> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let len = inner.endpoints.len();
        for offset in 0..len {
            let idx = (inner.cursor + offset) % len;
            if inner.endpoints[idx].in_cooldown(now) {
                continue;
            }
            inner.cursor = (idx + 1) % len;
            return Some(EndpointHandle {
                id: EndpointId(idx),
                base_url: inner.endpoints[idx].base_url.clone(),
            });
        }
        None
    }

    /// One good exchange fully rehabilitates the endpoint.
    pub fn report_success(&self, id: EndpointId) {
        let mut inner = self.inner.lock();
        inner.stats.successes += 1;
        if let Some(ep) = inner.endpoints.get_mut(id.0) {
            ep.consecutive_failures = 0;
            ep.cooldown_until = None;
        }
    }

    /// Record a transport-level failure. Crossing the threshold puts the
    /// endpoint in cooldown; the window doubles with further failures,
    /// bounded by the configured exponent cap.
    pub fn report_failure(&self, id: EndpointId) {
        let mut inner = self.inner.lock();
        inner.stats.failures += 1;
        let threshold = self.config.failure_threshold;
        let base = self.config.cooldown_base;
        let exponent_cap = self.config.cooldown_exponent_cap;
        let Some(ep) = inner.endpoints.get_mut(id.0) else {
            return;
        };
        ep.consecutive_failures = ep.consecutive_failures.saturating_add(1);
        if ep.consecutive_failures < threshold {
            debug!(
                endpoint = %ep.base_url,
                failures = ep.consecutive_failures,
                "endpoint failure recorded"
            );
            return;
        }
        let excess = ep.consecutive_failures - threshold;
        let multiplier = 1u32.checked_shl(excess.min(exponent_cap)).unwrap_or(u32::MAX);
        let cooldown = base.checked_mul(multiplier).unwrap_or(Duration::MAX);
        ep.cooldown_until = Some(Instant::now() + cooldown);
        warn!(
            endpoint = %ep.base_url,
            failures = ep.consecutive_failures,
            cooldown_secs = cooldown.as_secs(),
            "endpoint entering cooldown"
        );
    }

    pub fn stats(&self) -> PoolStats {
        self.inner.lock().stats
    }

    #[cfg(test)]
    fn failure_count(&self, id: EndpointId) -> u32 {
        self.inner.lock().endpoints[id.0].consecutive_failures
    }

    #[cfg(test)]
    fn is_cooling(&self, id: EndpointId) -> bool {
        self.inner.lock().endpoints[id.0].in_cooldown(Instant::now())
    }
}

impl std::fmt::Debug for EndpointPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("EndpointPool")
            .field("endpoints", &inner.endpoints.len())
            .field("stats", &inner.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_of(n: usize, config: PoolConfig) -> EndpointPool {
        EndpointPool::new(
            (0..n).map(|i| format!("https://mirror{i}.example")),
            config,
        )
    }

    #[test]
    fn selection_rotates_round_robin() {
        let pool = pool_of(3, PoolConfig::default());
        let first = pool.next_candidate().unwrap();
        let second = pool.next_candidate().unwrap();
        let third = pool.next_candidate().unwrap();
        let fourth = pool.next_candidate().unwrap();
        assert_eq!(first.base_url, "https://mirror0.example");
        assert_eq!(second.base_url, "https://mirror1.example");
        assert_eq!(third.base_url, "https://mirror2.example");
        assert_eq!(fourth.base_url, first.base_url);
    }

    #[test]
    fn cooling_endpoint_is_skipped_but_others_rotate() {
        let config = PoolConfig {
            failure_threshold: 1,
            cooldown_base: Duration::from_secs(60),
            ..PoolConfig::default()
        };
        let pool = pool_of(3, config);
        let first = pool.next_candidate().unwrap();
        pool.report_failure(first.id);
        assert!(pool.is_cooling(first.id));

        // Repeated failures on mirror0 never starve the others.
        let seen: Vec<String> = (0..4)
            .map(|_| pool.next_candidate().unwrap().base_url)
            .collect();
        assert!(seen.iter().all(|url| url != &first.base_url));
        assert!(seen.contains(&"https://mirror1.example".to_string()));
        assert!(seen.contains(&"https://mirror2.example".to_string()));
    }

    #[test]
    fn all_cooling_yields_none() {
        let config = PoolConfig {
            failure_threshold: 1,
            cooldown_base: Duration::from_secs(60),
            ..PoolConfig::default()
        };
        let pool = pool_of(2, config);
        for _ in 0..2 {
            let ep = pool.next_candidate().unwrap();
            pool.report_failure(ep.id);
        }
        assert!(pool.next_candidate().is_none());
    }

    #[test]
    fn success_fully_rehabilitates() {
        let config = PoolConfig {
            failure_threshold: 1,
            cooldown_base: Duration::from_secs(60),
            ..PoolConfig::default()
        };
        let pool = pool_of(1, config);
        let ep = pool.next_candidate().unwrap();
        pool.report_failure(ep.id);
        assert!(pool.next_candidate().is_none());

        pool.report_success(ep.id);
        assert_eq!(pool.failure_count(ep.id), 0);
        assert!(!pool.is_cooling(ep.id));
        assert!(pool.next_candidate().is_some());
    }

    #[test]
    fn failures_below_threshold_do_not_cool() {
        // 3 endpoints, all fail twice, then one succeeds: the survivor's
        // counter resets, the other two sit at 2 with threshold 3.
        let pool = pool_of(3, PoolConfig::default());
        let handles: Vec<_> = (0..3).map(|_| pool.next_candidate().unwrap()).collect();
        for ep in &handles {
            pool.report_failure(ep.id);
            pool.report_failure(ep.id);
        }
        pool.report_success(handles[1].id);

        assert_eq!(pool.failure_count(handles[0].id), 2);
        assert_eq!(pool.failure_count(handles[1].id), 0);
        assert_eq!(pool.failure_count(handles[2].id), 2);
        for ep in &handles {
            assert!(!pool.is_cooling(ep.id));
        }
    }

    #[test]
    fn counter_is_not_reset_by_cooldown_expiry() {
        let config = PoolConfig {
            failure_threshold: 2,
            cooldown_base: Duration::from_millis(0),
            ..PoolConfig::default()
        };
        let pool = pool_of(1, config);
        let ep = pool.next_candidate().unwrap();
        pool.report_failure(ep.id);
        pool.report_failure(ep.id);
        // Zero-length cooldown expired immediately, but the counter persists
        // until a success.
        assert_eq!(pool.failure_count(ep.id), 2);
        assert!(pool.next_candidate().is_some());
    }

    #[test]
    fn stats_count_reports() {
        let pool = pool_of(2, PoolConfig::default());
        let ep = pool.next_candidate().unwrap();
        pool.report_success(ep.id);
        pool.report_failure(ep.id);
        pool.report_success(ep.id);
        let stats = pool.stats();
        assert_eq!(stats.successes, 2);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.total(), 3);
    }
}
