//! Parsing of the `Cache-Control` header, shared by [`crate::freshness`],
//! [`crate::cacheability`], and [`crate::executor`].
//!
//! Grounded in `examples/kornelski-rusty-http-cache-semantics`'s
//! `parse_cache_control`: a case-insensitive, comma-separated list of
//! tokens, each optionally carrying a `=value` (quoted or bare).

use std::collections::HashMap;
use std::time::Duration;

use http::HeaderMap;

/// The parsed directives of one `Cache-Control` header (request or
/// response side; both share the same grammar).
#[derive(Debug, Clone, Default)]
pub struct CacheControl {
    directives: HashMap<String, Option<String>>,
}

impl CacheControl {
    /// Parse every `Cache-Control` header present on `headers` (there may
    /// legally be more than one; RFC 7230 §3.2.2 says repeated headers are
    /// equivalent to one comma-joined value).
    pub fn parse(headers: &HeaderMap) -> Self {
        let mut directives = HashMap::new();
        for value in headers.get_all(http::header::CACHE_CONTROL) {
            let Ok(value) = value.to_str() else { continue };
            for part in value.split(',') {
                let part = part.trim();
                if part.is_empty() {
                    continue;
                }
                let (name, val) = match part.split_once('=') {
                    Some((n, v)) => {
                        (n.trim(), Some(v.trim().trim_matches('"').to_string()))
                    }
                    None => (part, None),
                };
                directives.insert(name.to_ascii_lowercase(), val);
            }
        }
        Self { directives }
    }

    /// Whether the bare directive (no value expected) is present.
    pub fn has(&self, name: &str) -> bool {
        self.directives.contains_key(name)
    }

    /// The raw string value of a directive, if it carries one.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.directives.get(name).and_then(|v| v.as_deref())
    }

    /// The value of a directive parsed as a delta-seconds duration.
    pub fn duration(&self, name: &str) -> Option<Duration> {
        self.value(name).and_then(|v| v.parse::<i64>().ok()).map(|secs| {
            Duration::from_secs(secs.max(0) as u64)
        })
    }

    /// `no-cache` optionally carries a field list (`no-cache="x,y"`); an
    /// empty list means "no-cache applies to the whole response".
    pub fn no_cache_fields(&self) -> Option<Vec<String>> {
        self.value("no-cache").map(|v| {
            v.split(',').map(|s| s.trim().to_ascii_lowercase()).collect()
        })
    }

    pub fn no_store(&self) -> bool {
        self.has("no-store")
    }

    pub fn no_cache(&self) -> bool {
        self.has("no-cache")
    }

    pub fn private(&self) -> bool {
        self.has("private")
    }

    pub fn public(&self) -> bool {
        self.has("public")
    }

    pub fn must_revalidate(&self) -> bool {
        self.has("must-revalidate")
    }

    pub fn proxy_revalidate(&self) -> bool {
        self.has("proxy-revalidate")
    }

    pub fn immutable(&self) -> bool {
        self.has("immutable")
    }

    pub fn no_transform(&self) -> bool {
        self.has("no-transform")
    }

    pub fn max_age(&self) -> Option<Duration> {
        self.duration("max-age")
    }

    pub fn s_maxage(&self) -> Option<Duration> {
        self.duration("s-maxage")
    }

    pub fn only_if_cached(&self) -> bool {
        self.has("only-if-cached")
    }

    /// `max-stale` with no value means "unlimited staleness permitted"; we
    /// represent that as `Some(Duration::MAX)`.
    pub fn max_stale(&self) -> Option<Duration> {
        if !self.has("max-stale") {
            return None;
        }
        match self.duration("max-stale") {
            Some(d) => Some(d),
            None => Some(Duration::MAX),
        }
    }

    pub fn min_fresh(&self) -> Option<Duration> {
        self.duration("min-fresh")
    }

    pub fn stale_while_revalidate(&self) -> Option<Duration> {
        self.duration("stale-while-revalidate")
    }

    pub fn stale_if_error(&self) -> Option<Duration> {
        self.duration("stale-if-error")
    }
}

/// `Pragma: no-cache` — HTTP/1.0 compatibility, equivalent in effect to a
/// request `Cache-Control: no-cache` for admission purposes.
pub fn pragma_no_cache(headers: &HeaderMap) -> bool {
    headers.get_all(http::header::PRAGMA).iter().any(|v| {
        v.to_str().map(|s| s.to_ascii_lowercase().contains("no-cache")).unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(http::header::CACHE_CONTROL, value.parse().unwrap());
        h
    }

    #[test]
    fn parses_max_age() {
        let cc = CacheControl::parse(&headers("max-age=600"));
        assert_eq!(cc.max_age(), Some(Duration::from_secs(600)));
    }

    #[test]
    fn parses_bare_directives_case_insensitively() {
        let cc = CacheControl::parse(&headers("No-Store, Must-Revalidate"));
        assert!(cc.no_store());
        assert!(cc.must_revalidate());
    }

    #[test]
    fn max_stale_without_value_is_unlimited() {
        let cc = CacheControl::parse(&headers("max-stale"));
        assert_eq!(cc.max_stale(), Some(Duration::MAX));
    }

    #[test]
    fn no_cache_field_list() {
        let cc = CacheControl::parse(&headers(r#"no-cache="Set-Cookie""#));
        assert_eq!(
            cc.no_cache_fields(),
            Some(vec!["set-cookie".to_string()])
        );
    }
}
