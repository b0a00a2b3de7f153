//! [`FreshnessCalculator`]: age and freshness-lifetime arithmetic per
//! RFC 7234 §4.2.
//!
//! Ported from the age/freshness formulas in
//! `examples/kornelski-rusty-http-cache-semantics` (`CachePolicy::age`,
//! `max_age`, `is_stale`), restructured into the named quantities and
//! three-way classification this crate's spec calls for instead of that
//! crate's boolean `is_stale`.

use std::time::{Duration, SystemTime};

use http::HeaderMap;

use crate::cache_control::CacheControl;
use crate::entry::CacheEntry;

/// Default heuristic freshness factor (§4.4 item 4): `0.1`.
pub const DEFAULT_HEURISTIC_FACTOR: f64 = 0.1;
/// Default heuristic freshness cap (§4.4 item 4): 24 hours.
pub const DEFAULT_HEURISTIC_CAP: Duration = Duration::from_secs(24 * 3600);

/// Result of classifying a [`CacheEntry`] against the current instant and
/// the request's directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// May be served without revalidation.
    Fresh,
    /// Stale, but servable under a `max-stale` allowance.
    StaleButUsable,
    /// Must be revalidated (or refetched) before being served.
    MustRevalidate,
}

/// Tunables consulted by freshness classification; a subset of
/// [`crate::config::CacheConfig`].
#[derive(Debug, Clone, Copy)]
pub struct FreshnessOptions {
    pub shared_cache: bool,
    pub heuristic_caching_enabled: bool,
    pub heuristic_factor: f64,
    pub heuristic_cap: Duration,
}

impl Default for FreshnessOptions {
    fn default() -> Self {
        Self {
            shared_cache: false,
            heuristic_caching_enabled: true,
            heuristic_factor: DEFAULT_HEURISTIC_FACTOR,
            heuristic_cap: DEFAULT_HEURISTIC_CAP,
        }
    }
}

/// Whether heuristic freshness was used to compute the lifetime, and
/// whether the 24h-elapsed warning threshold applies (§4.4 item 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessLifetime {
    pub lifetime: Duration,
    pub heuristic: bool,
}

/// Pure RFC 7234 §4.2 age/freshness arithmetic.
#[derive(Debug, Clone, Copy, Default)]
pub struct FreshnessCalculator;

impl FreshnessCalculator {
    /// `date_value`: the response's `Date` header parsed as an instant, or
    /// `response_time` if absent/unparseable.
    pub fn date_value(&self, entry: &CacheEntry) -> SystemTime {
        parse_http_date(&entry.response_headers).unwrap_or(entry.response_time)
    }

    /// `current_age` at instant `now` (§4.4).
    pub fn current_age(&self, entry: &CacheEntry, now: SystemTime) -> Duration {
        let date_value = self.date_value(entry);
        let apparent_age = entry
            .response_time
            .duration_since(date_value)
            .unwrap_or(Duration::ZERO);
        let response_delay = entry
            .response_time
            .duration_since(entry.request_time)
            .unwrap_or(Duration::ZERO);
        let age_header_secs = age_header_seconds(&entry.response_headers).unwrap_or(0);
        let corrected_age_value =
            Duration::from_secs(age_header_secs) + response_delay;
        let corrected_initial_age = apparent_age.max(corrected_age_value);
        let resident_time =
            now.duration_since(entry.response_time).unwrap_or(Duration::ZERO);
        corrected_initial_age + resident_time
    }

    /// Freshness lifetime, first-defined-wins per §4.4.
    pub fn freshness_lifetime(
        &self,
        entry: &CacheEntry,
        opts: &FreshnessOptions,
    ) -> FreshnessLifetime {
        let cc = CacheControl::parse(&entry.response_headers);

        if opts.shared_cache {
            if let Some(s_maxage) = cc.s_maxage() {
                return FreshnessLifetime { lifetime: s_maxage, heuristic: false };
            }
        }
        if let Some(max_age) = cc.max_age() {
            return FreshnessLifetime { lifetime: max_age, heuristic: false };
        }
        if let Some(expires) = entry.response_headers.get(http::header::EXPIRES) {
            return match expires.to_str().ok().and_then(httpdate::parse_http_date_str) {
                Some(expires_at) => {
                    let date_value = self.date_value(entry);
                    let lifetime = expires_at
                        .duration_since(date_value)
                        .unwrap_or(Duration::ZERO);
                    FreshnessLifetime { lifetime, heuristic: false }
                }
                // Malformed Expires => already stale (§8 boundary behavior).
                None => FreshnessLifetime { lifetime: Duration::ZERO, heuristic: false },
            };
        }
        if opts.heuristic_caching_enabled {
            if let Some(last_modified) =
                entry.response_headers.get(http::header::LAST_MODIFIED)
            {
                if let Some(last_modified) =
                    last_modified.to_str().ok().and_then(httpdate::parse_http_date_str)
                {
                    let date_value = self.date_value(entry);
                    if let Ok(age) = date_value.duration_since(last_modified) {
                        let heuristic_secs = age.as_secs_f64() * opts.heuristic_factor;
                        let lifetime = Duration::from_secs_f64(heuristic_secs.max(0.0))
                            .min(opts.heuristic_cap);
                        return FreshnessLifetime { lifetime, heuristic: true };
                    }
                }
            }
        }
        FreshnessLifetime { lifetime: Duration::ZERO, heuristic: false }
    }

    /// Classify `entry` at instant `now` given the request's directives.
    pub fn classify(
        &self,
        entry: &CacheEntry,
        now: SystemTime,
        request_headers: &HeaderMap,
        opts: &FreshnessOptions,
    ) -> Freshness {
        let response_cc = CacheControl::parse(&entry.response_headers);
        let request_cc = CacheControl::parse(request_headers);

        let current_age = self.current_age(entry, now);
        let FreshnessLifetime { lifetime, .. } =
            self.freshness_lifetime(entry, opts);

        let min_fresh = request_cc.min_fresh().unwrap_or(Duration::ZERO);
        let max_stale_request = request_cc.max_stale();

        // `no-cache` (either side) and request `max-age=0` force revalidation
        // even of an otherwise-fresh entry (spec §4.9 tie-breaks). Unlike
        // those, `must-revalidate`/`proxy-revalidate` only matter once the
        // entry is actually stale — they must not prevent serving a fresh
        // response, so they are deliberately not part of this check.
        let forces_revalidation_even_if_fresh = response_cc.no_cache()
            || request_cc.no_cache()
            || request_cc.max_age() == Some(Duration::ZERO);

        let fresh_margin = lifetime.checked_sub(min_fresh).unwrap_or(Duration::ZERO);
        if current_age < fresh_margin {
            if forces_revalidation_even_if_fresh {
                return Freshness::MustRevalidate;
            }
            return Freshness::Fresh;
        }

        // Stale-but-usable under max-stale (request) or stale-while-revalidate
        // (response), unless must-revalidate/proxy-revalidate forbids it.
        let revalidate_forced =
            response_cc.must_revalidate() || response_cc.proxy_revalidate();
        if !revalidate_forced {
            let staleness = current_age.checked_sub(lifetime).unwrap_or(Duration::ZERO);
            let allowance = max_stale_request
                .or_else(|| response_cc.stale_while_revalidate())
                .unwrap_or(Duration::ZERO);
            if staleness <= allowance
                && current_age < fresh_margin.saturating_add(allowance)
            {
                return Freshness::StaleButUsable;
            }
        }

        Freshness::MustRevalidate
    }

    /// Whether this freshness lifetime computation used the heuristic path
    /// and the entry has now been resident long enough (>24h) to warrant a
    /// `Warning: 113` when served without revalidation (§4.4 item 4).
    pub fn needs_heuristic_warning(
        &self,
        entry: &CacheEntry,
        now: SystemTime,
        opts: &FreshnessOptions,
    ) -> bool {
        let fl = self.freshness_lifetime(entry, opts);
        fl.heuristic && self.current_age(entry, now) > Duration::from_secs(24 * 3600)
    }
}

fn parse_http_date(headers: &HeaderMap) -> Option<SystemTime> {
    headers
        .get(http::header::DATE)
        .and_then(|v| v.to_str().ok())
        .and_then(httpdate::parse_http_date_str)
}

fn age_header_seconds(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(http::header::AGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
}

/// Thin wrapper so callers elsewhere in the crate do not need to depend on
/// `httpdate` directly.
mod httpdate {
    use std::time::SystemTime;

    pub fn parse_http_date_str(s: &str) -> Option<SystemTime> {
        ::httpdate::parse_http_date(s).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, Method, StatusCode};
    use std::time::Duration;

    fn entry_with(
        date: &str,
        cache_control: &str,
        request_time: SystemTime,
        response_time: SystemTime,
    ) -> CacheEntry {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::DATE, date.parse().unwrap());
        headers
            .insert(http::header::CACHE_CONTROL, cache_control.parse().unwrap());
        CacheEntry::new(
            request_time,
            response_time,
            Method::GET,
            "http://example.com/".parse().unwrap(),
            HeaderMap::new(),
            StatusCode::OK,
            headers,
            Some(crate::resource::Resource::from_bytes(&b"hello"[..])),
            vec![],
        )
    }

    #[test]
    fn seed_scenario_fresh_hit_age_300() {
        let t0 = httpdate::parse_http_date_str("Mon, 01 Jan 2024 00:00:00 GMT")
            .unwrap();
        let entry = entry_with(
            "Mon, 01 Jan 2024 00:00:00 GMT",
            "max-age=600",
            t0,
            t0,
        );
        let now = t0 + Duration::from_secs(300);
        let calc = FreshnessCalculator;
        assert_eq!(calc.current_age(&entry, now), Duration::from_secs(300));
        let opts = FreshnessOptions::default();
        assert_eq!(
            calc.classify(&entry, now, &HeaderMap::new(), &opts),
            Freshness::Fresh
        );
    }

    #[test]
    fn current_age_monotone_in_now() {
        let t0 = httpdate::parse_http_date_str("Mon, 01 Jan 2024 00:00:00 GMT")
            .unwrap();
        let entry = entry_with("Mon, 01 Jan 2024 00:00:00 GMT", "max-age=600", t0, t0);
        let calc = FreshnessCalculator;
        let a = calc.current_age(&entry, t0 + Duration::from_secs(10));
        let b = calc.current_age(&entry, t0 + Duration::from_secs(20));
        assert!(b >= a);
    }

    #[test]
    fn malformed_expires_treated_as_stale() {
        let t0 = httpdate::parse_http_date_str("Mon, 01 Jan 2024 00:00:00 GMT")
            .unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(http::header::DATE, "Mon, 01 Jan 2024 00:00:00 GMT".parse().unwrap());
        headers.insert(http::header::EXPIRES, "not-a-date".parse().unwrap());
        let entry = CacheEntry::new(
            t0,
            t0,
            Method::GET,
            "http://example.com/".parse().unwrap(),
            HeaderMap::new(),
            StatusCode::OK,
            headers,
            Some(crate::resource::Resource::from_bytes(&b"x"[..])),
            vec![],
        );
        let calc = FreshnessCalculator;
        let fl = calc.freshness_lifetime(&entry, &FreshnessOptions::default());
        assert_eq!(fl.lifetime, Duration::ZERO);
    }

    #[test]
    fn max_stale_without_value_permits_unlimited_staleness() {
        let t0 = httpdate::parse_http_date_str("Mon, 01 Jan 2024 00:00:00 GMT")
            .unwrap();
        let entry = entry_with("Mon, 01 Jan 2024 00:00:00 GMT", "max-age=1", t0, t0);
        let mut req_headers = HeaderMap::new();
        req_headers
            .insert(http::header::CACHE_CONTROL, "max-stale".parse().unwrap());
        let now = t0 + Duration::from_secs(100_000);
        let calc = FreshnessCalculator;
        assert_eq!(
            calc.classify(&entry, now, &req_headers, &FreshnessOptions::default()),
            Freshness::StaleButUsable
        );
    }

    #[test]
    fn fresh_entry_with_request_no_cache_must_revalidate() {
        let t0 = httpdate::parse_http_date_str("Mon, 01 Jan 2024 00:00:00 GMT")
            .unwrap();
        let entry = entry_with("Mon, 01 Jan 2024 00:00:00 GMT", "max-age=600", t0, t0);
        let mut req_headers = HeaderMap::new();
        req_headers.insert(http::header::CACHE_CONTROL, "no-cache".parse().unwrap());
        let now = t0 + Duration::from_secs(300);
        let calc = FreshnessCalculator;
        assert_eq!(
            calc.classify(&entry, now, &req_headers, &FreshnessOptions::default()),
            Freshness::MustRevalidate
        );
    }

    #[test]
    fn fresh_entry_with_request_max_age_zero_must_revalidate() {
        let t0 = httpdate::parse_http_date_str("Mon, 01 Jan 2024 00:00:00 GMT")
            .unwrap();
        let entry = entry_with("Mon, 01 Jan 2024 00:00:00 GMT", "max-age=600", t0, t0);
        let mut req_headers = HeaderMap::new();
        req_headers.insert(http::header::CACHE_CONTROL, "max-age=0".parse().unwrap());
        let now = t0 + Duration::from_secs(300);
        let calc = FreshnessCalculator;
        assert_eq!(
            calc.classify(&entry, now, &req_headers, &FreshnessOptions::default()),
            Freshness::MustRevalidate
        );
    }

    #[test]
    fn fresh_entry_with_response_no_cache_must_revalidate() {
        let t0 = httpdate::parse_http_date_str("Mon, 01 Jan 2024 00:00:00 GMT")
            .unwrap();
        let entry =
            entry_with("Mon, 01 Jan 2024 00:00:00 GMT", "max-age=600, no-cache", t0, t0);
        let now = t0 + Duration::from_secs(300);
        let calc = FreshnessCalculator;
        assert_eq!(
            calc.classify(&entry, now, &HeaderMap::new(), &FreshnessOptions::default()),
            Freshness::MustRevalidate
        );
    }

    #[test]
    fn fresh_entry_with_response_must_revalidate_is_still_served_fresh() {
        let t0 = httpdate::parse_http_date_str("Mon, 01 Jan 2024 00:00:00 GMT")
            .unwrap();
        let entry = entry_with(
            "Mon, 01 Jan 2024 00:00:00 GMT",
            "max-age=600, must-revalidate",
            t0,
            t0,
        );
        let now = t0 + Duration::from_secs(300);
        let calc = FreshnessCalculator;
        assert_eq!(
            calc.classify(&entry, now, &HeaderMap::new(), &FreshnessOptions::default()),
            Freshness::Fresh
        );
    }
}
