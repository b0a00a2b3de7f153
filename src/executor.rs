//! [`CachingExecutor`]: the main state machine (spec §4.9), orchestrating
//! admission, lookup, variant resolution, freshness classification,
//! revalidation, and storage against a pluggable [`Storage`] and an
//! [`OriginExecutor`] transport collaborator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use log::{debug, trace, warn};

use crate::cache_control::CacheControl;
use crate::cacheability::CacheabilityPolicy;
use crate::clock::{Clock, SystemClock};
use crate::combiner::ResponseCombiner;
use crate::conditional::ConditionalRequestBuilder;
use crate::config::CacheConfig;
use crate::entry::CacheEntry;
use crate::error::{CacheError, OriginError, Result};
use crate::events::{Event, EventSink, NullEventSink};
use crate::freshness::{Freshness, FreshnessCalculator, FreshnessOptions};
use crate::invalidator::Invalidator;
use crate::keyer::CacheKeyer;
use crate::resource::Resource;
use crate::singleflight::{Lead, SingleFlight};
use crate::storage::{cas_update, CasOutcome, Storage};
use crate::variant::{parse_vary, VariantResolver, VaryFields};

/// A request as seen by the caching core: method, effective URI, and
/// headers (including any per-request `Cache-Control` overrides, spec §6).
#[derive(Debug, Clone)]
pub struct CacheRequest {
    /// Request method.
    pub method: Method,
    /// Effective request URI.
    pub uri: Uri,
    /// Request headers, including any per-request `Cache-Control`
    /// overrides.
    pub headers: HeaderMap,
}

/// A response as seen by the caching core, whether synthesized from cache
/// or passed through from the origin.
#[derive(Debug, Clone)]
pub struct CacheResponse {
    /// Response status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body, buffered in full (spec §1: wire serialization and
    /// streaming transport are out of scope for this crate).
    pub body: Bytes,
}

/// Cooperative cancellation, checked at the three suspension-point
/// boundaries named in spec §5: `Storage` I/O, origin I/O, and
/// `SingleFlight` waits.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a fresh, not-yet-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark this token (and every clone of it) as cancelled.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether this token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The sole seam to transport code (spec §6 "To transport code"). The
/// origin never sees cache-synthetic requests; revalidation requests are
/// ordinary conditional requests built by [`ConditionalRequestBuilder`].
#[async_trait::async_trait]
pub trait OriginExecutor: Send + Sync {
    /// Send `request` to the origin, honoring `ct` if the implementation
    /// supports cancellation.
    async fn send(
        &self,
        request: CacheRequest,
        ct: &CancellationToken,
    ) -> std::result::Result<CacheResponse, OriginError>;
}

/// Out-of-band reporting for a single `execute` call, filled in as the
/// state machine decides (spec §6 "cache context").
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheContext {
    /// Which terminal path the call took, once decided.
    pub outcome: Option<CacheOutcome>,
}

/// Which terminal path an `execute` call took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Admission rejected the request; it went straight to the origin.
    Bypass,
    /// Served from a fresh stored entry, no origin call.
    Hit,
    /// Revalidated against the origin and confirmed current (304).
    ValidatedHit,
    /// No usable entry; the origin was contacted unconditionally.
    Miss,
    /// A stale entry was served under a staleness allowance.
    ServeStale,
    /// `only-if-cached` could not be satisfied from cache.
    Unsatisfiable,
}

const DEFAULT_WARN_AGENT: &str = "-";

/// Orchestrates the caching decision engine against a [`Storage`] backend
/// and an [`OriginExecutor`].
pub struct CachingExecutor<S: Storage, O: OriginExecutor> {
    storage: Arc<S>,
    origin: Arc<O>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    singleflight: SingleFlight,
    keyer: CacheKeyer,
    variants: VariantResolver,
    freshness: FreshnessCalculator,
    cacheability: CacheabilityPolicy,
    conditional: ConditionalRequestBuilder,
    combiner: ResponseCombiner,
    invalidator: Invalidator,
}

impl<S: Storage, O: OriginExecutor> std::fmt::Debug for CachingExecutor<S, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingExecutor").field("config", &self.config).finish_non_exhaustive()
    }
}

// `'static` is required so that the `stale-while-revalidate` background
// refresh (`spawn_background_revalidation`) can detach its fetch onto its
// own `tokio::spawn`'d task; every concrete `Storage`/`OriginExecutor` in
// this crate (and in ordinary use — owned state, no borrowed fields)
// satisfies it trivially.
impl<S: Storage + 'static, O: OriginExecutor + 'static> CachingExecutor<S, O> {
    /// Build an executor. Validates `config` immediately — per spec §7 a
    /// `ConfigurationError` always surfaces at construction, never at
    /// request time.
    pub fn new(storage: S, origin: O, config: CacheConfig) -> Result<Self> {
        config.validate()?;
        let cacheability = CacheabilityPolicy {
            shared_cache: config.shared_cache,
            range_caching_enabled: config.range_caching_enabled,
        };
        Ok(Self {
            storage: Arc::new(storage),
            origin: Arc::new(origin),
            invalidator: Invalidator::new(cacheability),
            config,
            clock: Arc::new(SystemClock),
            events: Arc::new(NullEventSink),
            singleflight: SingleFlight::new(),
            keyer: CacheKeyer,
            variants: VariantResolver::default(),
            freshness: FreshnessCalculator,
            cacheability,
            conditional: ConditionalRequestBuilder,
            combiner: ResponseCombiner,
        })
    }

    /// Replace the clock (tests use a [`crate::clock::FixedClock`]).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the event sink.
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    fn freshness_options(&self) -> FreshnessOptions {
        FreshnessOptions {
            shared_cache: self.config.shared_cache,
            heuristic_caching_enabled: self.config.heuristic_caching_enabled,
            heuristic_factor: self.config.heuristic_factor,
            heuristic_cap: self.config.heuristic_cap,
        }
    }

    /// Execute a request against the cache (spec §4.9). This is the single
    /// public entry point; `ct` is honored at each suspension-point
    /// boundary named in spec §5.
    pub async fn execute(
        &self,
        request: CacheRequest,
        ct: CancellationToken,
    ) -> Result<CacheResponse> {
        self.execute_with_context(request, ct, &mut CacheContext::default()).await
    }

    /// Same as [`Self::execute`] but fills in `context` with the outcome
    /// the caller can inspect out-of-band (spec §6).
    pub async fn execute_with_context(
        &self,
        request: CacheRequest,
        ct: CancellationToken,
        context: &mut CacheContext,
    ) -> Result<CacheResponse> {
        let methods = self.config.effective_cache_methods();
        let admitted = self.cacheability.request_may_use_cache(
            &request.method,
            &request.headers,
            &methods,
        );

        if !admitted {
            trace!("admission rejected {} {}, bypassing cache", request.method, request.uri);
            self.events.record(Event::Bypass);
            context.outcome = Some(CacheOutcome::Bypass);
            return self.bypass(request, ct).await;
        }

        let root_key = self.keyer.storage_key(&request.method, &request.uri);
        let request_cc = CacheControl::parse(&request.headers);

        let root_entry = match self.storage.cas_load(&root_key).await {
            Ok((entry, _handle)) => entry,
            Err(err) => {
                warn!("cache lookup failed for {root_key}, treating as miss: {err}");
                None
            }
        };

        let Some(root_entry) = root_entry else {
            if request_cc.only_if_cached() {
                context.outcome = Some(CacheOutcome::Unsatisfiable);
                return Ok(unsatisfiable_response());
            }
            return self
                .miss(request, ct, root_key, None, context)
                .await;
        };

        let vary = parse_vary(&root_entry.response_headers);
        let (candidate, candidate_key) = match vary {
            None => (Some(root_entry), root_key.clone()),
            Some(VaryFields::Wildcard) => (None, root_key.clone()),
            Some(VaryFields::Named(fields)) => {
                let composite = self.variants.composite_key(
                    &root_key,
                    &fields,
                    &request.headers,
                );
                let child = match self.storage.get(&composite).await {
                    Ok(entry) => entry,
                    Err(err) => {
                        warn!("variant lookup failed for {composite}: {err}");
                        None
                    }
                };
                (child, composite)
            }
        };

        let Some(candidate) = candidate else {
            if request_cc.only_if_cached() {
                context.outcome = Some(CacheOutcome::Unsatisfiable);
                return Ok(unsatisfiable_response());
            }
            return self
                .miss(request, ct, root_key, Some(candidate_key), context)
                .await;
        };

        let now = self.clock.now();
        let classification = self.freshness.classify(
            &candidate,
            now,
            &request.headers,
            &self.freshness_options(),
        );

        match classification {
            Freshness::Fresh => {
                self.events.record(Event::CacheHit);
                context.outcome = Some(CacheOutcome::Hit);
                Ok(self.synthesize(&candidate, now).await?)
            }
            Freshness::StaleButUsable => {
                self.events.record(Event::ServeStale);
                context.outcome = Some(CacheOutcome::ServeStale);
                let response_cc = CacheControl::parse(&candidate.response_headers);
                if self.config.asynchronous_validation_enabled
                    && response_cc.stale_while_revalidate().is_some()
                {
                    self.spawn_background_revalidation(
                        request.clone(),
                        candidate_key.clone(),
                        candidate.clone(),
                    );
                }
                let mut response = self.synthesize(&candidate, now).await?;
                add_warning(&mut response.headers, 110, "Response is Stale");
                Ok(response)
            }
            Freshness::MustRevalidate => {
                if request_cc.only_if_cached() {
                    // Cannot contact the origin; serve what we have rather
                    // than fail, since an entry does exist.
                    self.events.record(Event::ServeStale);
                    context.outcome = Some(CacheOutcome::ServeStale);
                    let mut response = self.synthesize(&candidate, now).await?;
                    add_warning(&mut response.headers, 110, "Response is Stale");
                    return Ok(response);
                }
                self.revalidate(request, ct, candidate_key, candidate, context)
                    .await
            }
        }
    }

    async fn bypass(
        &self,
        request: CacheRequest,
        ct: CancellationToken,
    ) -> Result<CacheResponse> {
        let method = request.method.clone();
        let uri = request.uri.clone();
        let response =
            self.origin.send(request, &ct).await.map_err(CacheError::OriginFailure)?;
        self.invalidator
            .invalidate(
                self.storage.as_ref(),
                self.events.as_ref(),
                &method,
                &uri,
                response.status,
                &response.headers,
            )
            .await;
        Ok(response)
    }

    /// Miss path: coalesce concurrent fetches for the same key via
    /// `SingleFlight`, then perform (or wait for) an unconditional origin
    /// fetch.
    async fn miss(
        &self,
        request: CacheRequest,
        ct: CancellationToken,
        root_key: String,
        variant_key: Option<String>,
        context: &mut CacheContext,
    ) -> Result<CacheResponse> {
        let coalesce_key = variant_key.clone().unwrap_or_else(|| root_key.clone());

        match self.singleflight.enter::<()>(&coalesce_key, None).await {
            Lead::Leader(token) => {
                self.events.record(Event::CacheMiss { coalesced: false });
                context.outcome = Some(CacheOutcome::Miss);
                let method = request.method.clone();
                let uri = request.uri.clone();
                let request_headers = request.headers.clone();
                let result = self.origin.send(request, &ct).await;

                let response = match result {
                    Ok(response) => response,
                    Err(err) => {
                        // Nothing was stored; waiters may as well retry now.
                        self.singleflight.complete::<()>(token);
                        return Err(CacheError::OriginFailure(err));
                    }
                };
                self.events.record(Event::OriginResponse);

                self.invalidator
                    .invalidate(
                        self.storage.as_ref(),
                        self.events.as_ref(),
                        &method,
                        &uri,
                        response.status,
                        &response.headers,
                    )
                    .await;

                self.maybe_store_fresh(
                    &method,
                    &uri,
                    &request_headers,
                    &response,
                    &root_key,
                )
                .await;

                // Only release waiters once the fresh entry is committed (or
                // skipped), so a woken follower re-consulting the cache
                // observes it rather than racing to become a second leader
                // (spec §8: exactly one origin fetch per coalesced group).
                self.singleflight.complete::<()>(token);

                Ok(response)
            }
            Lead::Followed(_) => {
                self.events.record(Event::CacheMiss { coalesced: true });
                // Re-consult the cache; the leader may have just stored a
                // fresh entry.
                Box::pin(self.execute_with_context(request, ct, context)).await
            }
        }
    }

    async fn revalidate(
        &self,
        request: CacheRequest,
        ct: CancellationToken,
        candidate_key: String,
        candidate: CacheEntry,
        context: &mut CacheContext,
    ) -> Result<CacheResponse> {
        if !self.conditional.is_conditional(&candidate) {
            // No validators to send: this degenerates into an unconditional
            // fetch, not a revalidation (spec §4.5).
            return Box::pin(self.miss(
                request,
                ct,
                candidate_key.clone(),
                Some(candidate_key),
                context,
            ))
            .await;
        }

        let conditional_headers =
            self.conditional.build(&request.headers, &candidate);
        let method = request.method.clone();
        let uri = request.uri.clone();

        match self.singleflight.enter::<()>(&candidate_key, None).await {
            Lead::Leader(token) => {
                let conditional_request = CacheRequest {
                    method: method.clone(),
                    uri: uri.clone(),
                    headers: conditional_headers,
                };
                let request_time = self.clock.now();
                let result = self.origin.send(conditional_request, &ct).await;
                let response_time = self.clock.now();

                let response = match result {
                    Ok(response) => response,
                    Err(err) => {
                        // Nothing was stored; waiters may as well retry now.
                        self.singleflight.complete::<()>(token);
                        let response_cc = CacheControl::parse(&candidate.response_headers);
                        let request_cc = CacheControl::parse(&request.headers);
                        if response_cc.stale_if_error().is_some()
                            || request_cc.stale_if_error().is_some()
                        {
                            self.events.record(Event::ServeStale);
                            context.outcome = Some(CacheOutcome::ServeStale);
                            let now = self.clock.now();
                            let mut resp = self.synthesize(&candidate, now).await?;
                            add_warning(&mut resp.headers, 111, "Revalidation Failed");
                            return Ok(resp);
                        }
                        return Err(CacheError::RevalidationFailure(err));
                    }
                };
                self.events.record(Event::OriginResponse);

                self.invalidator
                    .invalidate(
                        self.storage.as_ref(),
                        self.events.as_ref(),
                        &method,
                        &uri,
                        response.status,
                        &response.headers,
                    )
                    .await;

                // In every branch below, waiters are released only after the
                // outcome of this revalidation (merge, replace, or eviction)
                // is committed to storage — otherwise a woken follower could
                // re-consult the cache before the write lands and spuriously
                // become a second leader (spec §8: exactly one origin fetch
                // per coalesced group).
                if response.status == StatusCode::NOT_MODIFIED {
                    if !self.combiner.validates(&candidate, &response.headers) {
                        warn!(
                            "304 for {candidate_key} did not validate against the stored entry, evicting"
                        );
                        let _ = self.storage.remove(&candidate_key).await;
                        self.events.record(Event::Eviction);
                        self.singleflight.complete::<()>(token);
                        return Box::pin(self.miss(
                            request,
                            ct,
                            candidate_key.clone(),
                            Some(candidate_key),
                            context,
                        ))
                        .await;
                    }
                    let merged = self.combiner.merge(
                        &candidate,
                        &response.headers,
                        request_time,
                        response_time,
                    );
                    self.store_entry(&candidate_key, merged.clone()).await;
                    self.events.record(Event::ValidatedHit);
                    context.outcome = Some(CacheOutcome::ValidatedHit);
                    let now = self.clock.now();
                    let synthesized = self.synthesize(&merged, now).await;
                    self.singleflight.complete::<()>(token);
                    Ok(synthesized?)
                } else {
                    let storable = self.cacheability.is_response_storable(
                        &request.headers,
                        response.status,
                        &response.headers,
                        &self.config.cacheable_statuses,
                    );
                    if storable && response.body.len() as u64 <= self.config.max_object_size_bytes
                    {
                        let replaced = self.combiner.replace(
                            method.clone(),
                            uri.clone(),
                            request.headers.clone(),
                            request_time,
                            response_time,
                            response.status,
                            response.headers.clone(),
                            Some(Resource::from_bytes(response.body.clone())),
                        );
                        self.store_entry(&candidate_key, replaced).await;
                        self.events.record(Event::Update);
                    } else {
                        let _ = self.storage.remove(&candidate_key).await;
                        self.events.record(Event::Eviction);
                    }
                    context.outcome = Some(CacheOutcome::Miss);
                    self.singleflight.complete::<()>(token);
                    Ok(response)
                }
            }
            Lead::Followed(_) => {
                self.events.record(Event::CacheMiss { coalesced: true });
                Box::pin(self.execute_with_context(request, ct, context)).await
            }
        }
    }

    /// Store a response fetched on a cold miss, handling `Vary` by writing
    /// a variant root plus a variant child when the response carries one.
    async fn maybe_store_fresh(
        &self,
        method: &Method,
        uri: &Uri,
        request_headers: &HeaderMap,
        response: &CacheResponse,
        root_key: &str,
    ) {
        if !self.cacheability.is_response_storable(
            request_headers,
            response.status,
            &response.headers,
            &self.config.cacheable_statuses,
        ) {
            return;
        }
        if response.body.len() as u64 > self.config.max_object_size_bytes {
            return;
        }

        let now = self.clock.now();
        let body = Resource::from_bytes(response.body.clone());

        match parse_vary(&response.headers) {
            None => {
                let entry = CacheEntry::new(
                    now,
                    now,
                    method.clone(),
                    uri.clone(),
                    request_headers.clone(),
                    response.status,
                    response.headers.clone(),
                    Some(body),
                    vec![],
                );
                self.store_entry(root_key, entry).await;
            }
            Some(VaryFields::Wildcard) => {
                // Never stored (spec §4.3b / §8 invariant).
            }
            Some(VaryFields::Named(fields)) => {
                let variant_key =
                    self.variants.variant_key_for(&fields, request_headers);
                let composite = self.keyer.variant_key(root_key, &variant_key);

                let child = CacheEntry::new(
                    now,
                    now,
                    method.clone(),
                    uri.clone(),
                    request_headers.clone(),
                    response.status,
                    response.headers.clone(),
                    Some(body),
                    vec![],
                );
                self.store_entry(&composite, child).await;

                let mut variants = match self.storage.get(root_key).await {
                    Ok(Some(existing)) => existing.variants,
                    _ => vec![],
                };
                if !variants.contains(&variant_key) {
                    variants.push(variant_key);
                }
                let root = CacheEntry::new(
                    now,
                    now,
                    method.clone(),
                    uri.clone(),
                    request_headers.clone(),
                    response.status,
                    response.headers.clone(),
                    None,
                    variants,
                );
                self.store_entry(root_key, root).await;
            }
        }
        self.events.record(Event::Store);
    }

    /// CAS-store an entry with bounded retries (spec §5 ordering guarantee
    /// 1); write failures degrade to "skip the store", never to an error
    /// the caller observes (spec §7 `CacheStoreFailure`).
    async fn store_entry(&self, key: &str, entry: CacheEntry) {
        commit_entry(self.storage.as_ref(), self.config.max_update_retries, key, entry).await;
    }

    /// Trigger a `stale-while-revalidate` background refresh for `key`
    /// without making the caller wait on it. Becomes the `SingleFlight`
    /// leader for `key` via [`SingleFlight::try_enter`]; if another fetch
    /// (synchronous or an earlier background refresh) is already leading,
    /// this is a no-op, since that fetch will itself bring the entry
    /// current (DESIGN.md Open Question 1: the bound on concurrent
    /// background updates is the same leader slot a synchronous
    /// revalidation uses).
    fn spawn_background_revalidation(&self, request: CacheRequest, key: String, candidate: CacheEntry) {
        let Some(token) = self.singleflight.try_enter(&key) else {
            return;
        };
        if !self.conditional.is_conditional(&candidate) {
            // No validators to revalidate with; nothing a background fetch
            // could do that the next `MustRevalidate` wouldn't already do.
            self.singleflight.complete::<()>(token);
            return;
        }

        let conditional_headers = self.conditional.build(&request.headers, &candidate);
        let storage = Arc::clone(&self.storage);
        let origin = Arc::clone(&self.origin);
        let events = Arc::clone(&self.events);
        let clock = Arc::clone(&self.clock);
        let singleflight = self.singleflight.clone();
        let invalidator = self.invalidator;
        let combiner = self.combiner;
        let cacheability = self.cacheability;
        let config = self.config.clone();
        let method = request.method.clone();
        let uri = request.uri.clone();
        let request_headers = request.headers.clone();

        tokio::spawn(async move {
            let conditional_request =
                CacheRequest { method: method.clone(), uri: uri.clone(), headers: conditional_headers };
            let request_time = clock.now();
            let result = origin.send(conditional_request, &CancellationToken::new()).await;
            let response_time = clock.now();

            let response = match result {
                Ok(response) => response,
                Err(err) => {
                    debug!("background revalidation of {key} failed, leaving entry stale: {err}");
                    singleflight.complete::<()>(token);
                    return;
                }
            };
            events.record(Event::OriginResponse);

            invalidator
                .invalidate(
                    storage.as_ref(),
                    events.as_ref(),
                    &method,
                    &uri,
                    response.status,
                    &response.headers,
                )
                .await;

            if response.status == StatusCode::NOT_MODIFIED {
                if combiner.validates(&candidate, &response.headers) {
                    let merged =
                        combiner.merge(&candidate, &response.headers, request_time, response_time);
                    commit_entry(storage.as_ref(), config.max_update_retries, &key, merged).await;
                    events.record(Event::ValidatedHit);
                } else {
                    warn!(
                        "background 304 for {key} did not validate against the stored entry, evicting"
                    );
                    let _ = storage.remove(&key).await;
                    events.record(Event::Eviction);
                }
            } else {
                let storable = cacheability.is_response_storable(
                    &request_headers,
                    response.status,
                    &response.headers,
                    &config.cacheable_statuses,
                );
                if storable && response.body.len() as u64 <= config.max_object_size_bytes {
                    let replaced = combiner.replace(
                        method.clone(),
                        uri.clone(),
                        request_headers.clone(),
                        request_time,
                        response_time,
                        response.status,
                        response.headers.clone(),
                        Some(Resource::from_bytes(response.body.clone())),
                    );
                    commit_entry(storage.as_ref(), config.max_update_retries, &key, replaced).await;
                    events.record(Event::Update);
                } else {
                    let _ = storage.remove(&key).await;
                    events.record(Event::Eviction);
                }
            }

            singleflight.complete::<()>(token);
        });
    }

    async fn synthesize(
        &self,
        entry: &CacheEntry,
        now: SystemTime,
    ) -> Result<CacheResponse> {
        let mut headers = entry.response_headers.clone();
        let age = self.freshness.current_age(entry, now).as_secs();
        headers.insert(
            http::header::AGE,
            HeaderValue::from_str(&age.to_string()).unwrap_or_else(|_| {
                HeaderValue::from_static("0")
            }),
        );
        if self
            .freshness
            .needs_heuristic_warning(entry, now, &self.freshness_options())
        {
            add_warning(&mut headers, 113, "Heuristic Expiration");
        }

        let body = match &entry.body {
            Some(resource) => resource.open_stream().await.map_err(|e| {
                CacheError::CacheEntryCorruption(format!(
                    "failed to read stored body: {e}"
                ))
            })?,
            None => Bytes::new(),
        };

        Ok(CacheResponse { status: entry.status, headers, body })
    }
}

fn unsatisfiable_response() -> CacheResponse {
    CacheResponse {
        status: StatusCode::GATEWAY_TIMEOUT,
        headers: HeaderMap::new(),
        body: Bytes::new(),
    }
}

fn add_warning(headers: &mut HeaderMap, code: u16, text: &str) {
    let value = format!("{code} {DEFAULT_WARN_AGENT} \"{text}\"");
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.append(http::header::WARNING, value);
    }
}

/// CAS-store an entry with bounded retries (spec §5 ordering guarantee 1);
/// write failures degrade to "skip the store", never to an error the
/// caller observes (spec §7 `CacheStoreFailure`). Free function (rather
/// than a method) so the `stale-while-revalidate` background task, which
/// only holds an `Arc<S>` and not a full `&CachingExecutor`, can share it
/// with [`CachingExecutor::store_entry`].
async fn commit_entry<S: Storage + ?Sized>(
    storage: &S,
    max_retries: u32,
    key: &str,
    entry: CacheEntry,
) {
    let result = cas_update(storage, key, max_retries, {
        let entry = entry.clone();
        move |_current| Some(entry.clone())
    })
    .await;
    match result {
        Ok(CasOutcome::Committed) => {}
        Ok(outcome) => {
            debug!("store for {key} did not commit ({outcome:?}), skipping");
        }
        Err(err) => {
            warn!("store for {key} failed, skipping: {err}");
        }
    }
}
