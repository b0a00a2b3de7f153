//! [`EventSink`]: passive counters/observer hooks (spec §4.11).
//!
//! The core never branches on what a sink does with an event; it only
//! guarantees the ordering and the moment each fires, so an implementor can
//! wire these into metrics/tracing without the core depending on either.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// One observable event point fired by [`crate::executor::CachingExecutor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A fresh entry was served without contacting the origin.
    CacheHit,
    /// No usable entry was found; the origin was (or will be) contacted.
    CacheMiss {
        /// Whether this caller coalesced onto another caller's in-flight
        /// fetch rather than itself becoming the `SingleFlight` leader.
        coalesced: bool,
    },
    /// A stale entry was revalidated and confirmed current (304).
    ValidatedHit,
    /// A response was produced by the origin call.
    OriginResponse,
    /// A new entry was written to storage.
    Store,
    /// An existing entry was replaced (304 merge or unconditional refetch).
    Update,
    /// An entry was removed from storage (invalidation or corruption).
    Eviction,
    /// A stale entry was served under `max-stale`/`stale-while-revalidate`/
    /// `stale-if-error`.
    ServeStale,
    /// The request bypassed the cache entirely (admission rejected it).
    Bypass,
}

/// Passive observer of cache decision-engine events. Implementors never
/// influence the decision; they only count or trace it.
pub trait EventSink: Send + Sync + fmt::Debug {
    /// Called once per event point, in the order they occur for a given
    /// request. The default implementation does nothing.
    fn record(&self, event: Event) {
        let _ = event;
    }
}

/// A no-op sink, used when the caller does not care to observe events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {}

/// An [`EventSink`] that keeps atomic counters per event kind, useful for
/// tests and as a minimal operator-facing convenience.
#[derive(Debug, Default)]
pub struct CountingEventSink {
    cache_hit: AtomicU64,
    cache_miss: AtomicU64,
    cache_miss_coalesced: AtomicU64,
    validated_hit: AtomicU64,
    origin_response: AtomicU64,
    store: AtomicU64,
    update: AtomicU64,
    eviction: AtomicU64,
    serve_stale: AtomicU64,
    bypass: AtomicU64,
}

impl CountingEventSink {
    /// Create a fresh, zeroed counter set.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_hit(&self) -> u64 {
        self.cache_hit.load(Ordering::Relaxed)
    }

    pub fn cache_miss(&self) -> u64 {
        self.cache_miss.load(Ordering::Relaxed)
    }

    pub fn cache_miss_coalesced(&self) -> u64 {
        self.cache_miss_coalesced.load(Ordering::Relaxed)
    }

    pub fn validated_hit(&self) -> u64 {
        self.validated_hit.load(Ordering::Relaxed)
    }

    pub fn store(&self) -> u64 {
        self.store.load(Ordering::Relaxed)
    }

    pub fn update(&self) -> u64 {
        self.update.load(Ordering::Relaxed)
    }

    pub fn eviction(&self) -> u64 {
        self.eviction.load(Ordering::Relaxed)
    }

    pub fn serve_stale(&self) -> u64 {
        self.serve_stale.load(Ordering::Relaxed)
    }

    pub fn bypass(&self) -> u64 {
        self.bypass.load(Ordering::Relaxed)
    }
}

impl EventSink for CountingEventSink {
    fn record(&self, event: Event) {
        match event {
            Event::CacheHit => self.cache_hit.fetch_add(1, Ordering::Relaxed),
            Event::CacheMiss { coalesced } => {
                if coalesced {
                    self.cache_miss_coalesced.fetch_add(1, Ordering::Relaxed);
                }
                self.cache_miss.fetch_add(1, Ordering::Relaxed)
            }
            Event::ValidatedHit => {
                self.validated_hit.fetch_add(1, Ordering::Relaxed)
            }
            Event::OriginResponse => {
                self.origin_response.fetch_add(1, Ordering::Relaxed)
            }
            Event::Store => self.store.fetch_add(1, Ordering::Relaxed),
            Event::Update => self.update.fetch_add(1, Ordering::Relaxed),
            Event::Eviction => self.eviction.fetch_add(1, Ordering::Relaxed),
            Event::ServeStale => {
                self.serve_stale.fetch_add(1, Ordering::Relaxed)
            }
            Event::Bypass => self.bypass.fetch_add(1, Ordering::Relaxed),
        };
    }
}
