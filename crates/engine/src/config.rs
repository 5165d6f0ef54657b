use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::retry::RetryPolicy;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Public mirrors of the resolution API. Interchangeable and individually
/// unreliable; the pool rotates across them.
pub const DEFAULT_ENDPOINTS: &[&str] = &[
    "https://kraken.squid.wtf",
    "https://triton.squid.wtf",
    "https://zeus.squid.wtf",
    "https://aether.squid.wtf",
    "https://phoenix.squid.wtf",
    "https://shiva.squid.wtf",
    "https://chaos.squid.wtf",
    "https://california.monochrome.tf",
    "https://london.monochrome.tf",
    "https://hund.qqdl.site",
    "https://katze.qqdl.site",
    "https://maus.qqdl.site",
    "https://vogel.qqdl.site",
    "https://wolf.qqdl.site",
];

/// HTTP-level configuration for the provider client.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URLs of the interchangeable resolution mirrors.
    pub endpoints: Vec<String>,

    /// Uniform per-request timeout for API exchanges.
    pub request_timeout: Duration,

    /// Timeout for the audio stream transfer itself.
    pub download_timeout: Duration,

    /// User agent string
    pub user_agent: String,

    /// Custom HTTP headers for requests
    pub headers: HeaderMap,

    /// Target quality tag sent with stream lookups. Fixed per run; there is
    /// no quality negotiation.
    pub quality: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoints: DEFAULT_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
            request_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(120),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: ProviderConfig::get_default_headers(),
            quality: "LOSSLESS".to_owned(),
        }
    }
}

impl ProviderConfig {
    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );

        default_headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.9,fr;q=0.8"),
        );

        default_headers.insert(
            reqwest::header::ORIGIN,
            HeaderValue::from_static("https://tidal.squid.wtf"),
        );

        default_headers.insert(
            reqwest::header::REFERER,
            HeaderValue::from_static("https://tidal.squid.wtf/"),
        );

        default_headers
    }
}

/// Health/cooldown behavior of the endpoint pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Consecutive failures before an endpoint enters cooldown.
    pub failure_threshold: u32,
    /// Cooldown for the first threshold crossing; doubles per further
    /// failure, bounded by `cooldown_exponent_cap`.
    pub cooldown_base: Duration,
    /// Cap on the doubling exponent so cooldowns stay bounded.
    pub cooldown_exponent_cap: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_base: Duration::from_secs(30),
            cooldown_exponent_cap: 4,
        }
    }
}

/// Similarity scoring knobs for the search-and-match strategy.
///
/// The threshold and weights are empirically chosen defaults carried over
/// from operating the tool, not a verified optimum.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Minimum combined score for a candidate to be accepted.
    pub acceptance_threshold: f64,
    /// Weight of normalized-title overlap in the combined score.
    pub title_weight: f64,
    /// Weight of normalized-artist overlap in the combined score.
    pub artist_weight: f64,
    /// Upper bound on candidates parsed from one search response.
    pub max_candidates: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: 0.3,
            title_weight: 0.6,
            artist_weight: 0.4,
            max_candidates: 10,
        }
    }
}

/// Aggregated engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub provider: ProviderConfig,
    pub pool: PoolConfig,
    pub retry: RetryPolicy,
    pub matching: MatchConfig,
    /// Pause between consecutive tracks, to be polite to the mirrors.
    pub inter_track_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            pool: PoolConfig::default(),
            retry: RetryPolicy::default(),
            matching: MatchConfig::default(),
            inter_track_delay: Duration::from_millis(500),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), crate::error::ResolveError> {
        if self.provider.endpoints.is_empty() {
            return Err(crate::error::ResolveError::InvalidConfig {
                reason: "endpoint list is empty".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.matching.acceptance_threshold) {
            return Err(crate::error::ResolveError::InvalidConfig {
                reason: format!(
                    "acceptance threshold {} outside [0, 1]",
                    self.matching.acceptance_threshold
                ),
            });
        }
        Ok(())
    }
}
