//! [`CacheConfig`]: every tunable named in spec §6, with the documented
//! defaults. Passed by value into [`crate::executor::CachingExecutor`] at
//! construction time rather than read from a global singleton (spec §9
//! Design Note "Global singletons for policy/clock").

use std::time::Duration;

use http::{Method, StatusCode};

use crate::cacheability::DEFAULT_CACHEABLE_STATUSES;
use crate::freshness::{DEFAULT_HEURISTIC_CAP, DEFAULT_HEURISTIC_FACTOR};

/// Construction-time configuration for a [`crate::executor::CachingExecutor`].
///
/// Invalid combinations (e.g. an empty `cacheable_statuses` with heuristic
/// caching also disabled) are rejected by [`CacheConfig::validate`], which
/// the executor calls once at construction — per spec §7,
/// `ConfigurationError` is always surfaced at construction, never at
/// request time.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Whether this cache is shared (affects `private`/`s-maxage`/
    /// `Authorization` handling). Default `false` (private cache).
    pub shared_cache: bool,
    /// Whether a missing explicit freshness lifetime may be estimated
    /// heuristically from `Last-Modified`. Default `true`.
    pub heuristic_caching_enabled: bool,
    /// Heuristic freshness factor applied to `date_value - Last-Modified`.
    /// Default `0.1`.
    pub heuristic_factor: f64,
    /// Upper bound on a heuristically-computed freshness lifetime. Default
    /// 24 hours.
    pub heuristic_cap: Duration,
    /// Responses whose body exceeds this size are not stored. Default 8
    /// MiB.
    pub max_object_size_bytes: u64,
    /// Advisory entry-count ceiling; storage backends with their own
    /// eviction policy (e.g. `moka`) may ignore this. Default 1024.
    pub max_cache_entries: u64,
    /// Whether `stale-while-revalidate` triggers a background refresh
    /// (serving stale immediately to the caller that triggered it).
    /// Default `true`.
    pub asynchronous_validation_enabled: bool,
    /// Request methods (beyond GET, which is always eligible) admitted to
    /// use the cache. Default `{GET}` — GET is implicit and always
    /// included even if omitted here.
    pub cache_methods: Vec<Method>,
    /// Status codes storable without an explicit expiration header.
    /// Default: the set in spec §4.3(b).
    pub cacheable_statuses: Vec<StatusCode>,
    /// Whether 206 Partial Content responses may be stored (spec §1
    /// Non-goals: range-request assembly is optional and may be refused).
    /// Default `false`.
    pub range_caching_enabled: bool,
    /// Maximum number of CAS retries before an update is surfaced as a
    /// failure. Default 3.
    pub max_update_retries: u32,
    /// Bounds a single origin revalidation. Default 30s.
    pub revalidation_timeout: Duration,
    /// Bounds how long a non-leader `SingleFlight` waiter waits for the
    /// leader. Default 30s.
    pub singleflight_wait_timeout: Duration,
    /// Bounds a single `Storage` operation. Default 5s.
    pub storage_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            shared_cache: false,
            heuristic_caching_enabled: true,
            heuristic_factor: DEFAULT_HEURISTIC_FACTOR,
            heuristic_cap: DEFAULT_HEURISTIC_CAP,
            max_object_size_bytes: 8 * 1024 * 1024,
            max_cache_entries: 1024,
            asynchronous_validation_enabled: true,
            cache_methods: vec![Method::GET],
            cacheable_statuses: DEFAULT_CACHEABLE_STATUSES.to_vec(),
            range_caching_enabled: false,
            max_update_retries: 3,
            revalidation_timeout: Duration::from_secs(30),
            singleflight_wait_timeout: Duration::from_secs(30),
            storage_timeout: Duration::from_secs(5),
        }
    }
}

impl CacheConfig {
    /// Validate internal consistency. Called once, at
    /// [`crate::executor::CachingExecutor`] construction — per spec §7 a
    /// `ConfigurationError` must surface immediately, never at request time.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.heuristic_factor < 0.0 {
            return Err(crate::error::CacheError::ConfigurationError(
                "heuristic_factor must be non-negative".to_string(),
            ));
        }
        if self.max_update_retries == 0 {
            return Err(crate::error::CacheError::ConfigurationError(
                "max_update_retries must be at least 1".to_string(),
            ));
        }
        if self.range_caching_enabled
            && !self.cacheable_statuses.contains(&StatusCode::PARTIAL_CONTENT)
        {
            return Err(crate::error::CacheError::ConfigurationError(
                "range_caching_enabled requires 206 in cacheable_statuses"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// The effective set of methods eligible to use the cache: the
    /// configured `cache_methods` plus GET/HEAD, which are always eligible
    /// per spec §4.3(a) (HEAD responses have no body to store, but a HEAD
    /// request may still be served a cached GET's headers by a caller that
    /// chooses to; this crate does not do that implicitly).
    pub fn effective_cache_methods(&self) -> Vec<Method> {
        let mut methods = self.cache_methods.clone();
        if !methods.contains(&Method::GET) {
            methods.push(Method::GET);
        }
        methods
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = CacheConfig::default();
        assert!(!cfg.shared_cache);
        assert!(cfg.heuristic_caching_enabled);
        assert_eq!(cfg.heuristic_factor, 0.1);
        assert_eq!(cfg.heuristic_cap, Duration::from_secs(24 * 3600));
        assert_eq!(cfg.max_object_size_bytes, 8 * 1024 * 1024);
        assert_eq!(cfg.max_cache_entries, 1024);
        assert!(cfg.asynchronous_validation_enabled);
        assert_eq!(cfg.cache_methods, vec![Method::GET]);
        assert_eq!(cfg.max_update_retries, 3);
    }

    #[test]
    fn range_caching_without_206_in_statuses_is_invalid() {
        let cfg = CacheConfig {
            range_caching_enabled: true,
            cacheable_statuses: vec![StatusCode::OK],
            ..CacheConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_retries_is_invalid() {
        let cfg = CacheConfig { max_update_retries: 0, ..CacheConfig::default() };
        assert!(cfg.validate().is_err());
    }
}
