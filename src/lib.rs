#![forbid(unsafe_code, future_incompatible)]
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    nonstandard_style,
    unused_qualifications,
    unused_import_braces,
    unused_extern_crates,
    trivial_casts,
    trivial_numeric_casts
)]
#![cfg_attr(docsrs, feature(doc_cfg))]
//! An RFC 7234–compliant HTTP/1.1 client-side caching decision engine and
//! storage substrate.
//!
//! This crate is the core that sits between an application and an origin
//! HTTP client, deciding whether a request may be served from cache,
//! whether a stored response is fresh, whether conditional revalidation is
//! required, and how to combine a `304 Not Modified` with a stored entry.
//! It does not do HTTP transport, wire serialization, or request-builder
//! ergonomics — those are external collaborators, named only by the
//! interfaces this crate consumes ([`OriginExecutor`]) or exposes
//! ([`CachingExecutor::execute`]).
//!
//! ## Basic usage
//!
//! ```rust
//! use cache_core::{
//!     CacheConfig, CacheRequest, CachingExecutor, CancellationToken,
//!     MemoryStorage, OriginExecutor, OriginError, CacheResponse,
//! };
//!
//! struct EchoOrigin;
//!
//! #[async_trait::async_trait]
//! impl OriginExecutor for EchoOrigin {
//!     async fn send(
//!         &self,
//!         request: CacheRequest,
//!         _ct: &CancellationToken,
//!     ) -> Result<CacheResponse, OriginError> {
//!         Ok(CacheResponse {
//!             status: http::StatusCode::OK,
//!             headers: http::HeaderMap::new(),
//!             body: bytes::Bytes::from_static(b"hello"),
//!         })
//!     }
//! }
//!
//! # async fn run() -> cache_core::Result<()> {
//! let executor = CachingExecutor::new(
//!     MemoryStorage::new(),
//!     EchoOrigin,
//!     CacheConfig::default(),
//! )?;
//!
//! let request = CacheRequest {
//!     method: http::Method::GET,
//!     uri: "http://example.com/".parse().unwrap(),
//!     headers: http::HeaderMap::new(),
//! };
//! let response = executor.execute(request, CancellationToken::new()).await?;
//! assert_eq!(response.body, bytes::Bytes::from_static(b"hello"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Storage backends
//!
//! [`MemoryStorage`] is the default, in-process backend. Two pluggable
//! disk/external backends are available behind feature flags:
//!
//! - `storage-moka`: [`storage::moka::MokaStorage`], an in-process cache
//!   with its own eviction policy.
//! - `storage-cacache`: [`storage::cacache::CacacheStorage`], a
//!   content-addressed on-disk store.
//!
//! Callers needing a different backend (a Redis-backed KV store, say)
//! implement [`Storage`] directly; it is a small, four-operation trait.

pub mod cache_control;
pub mod cacheability;
pub mod clock;
pub mod combiner;
pub mod conditional;
pub mod config;
pub mod entry;
pub mod error;
pub mod events;
pub mod executor;
pub mod freshness;
pub mod invalidator;
pub mod keyer;
pub mod resource;
pub mod singleflight;
pub mod storage;
pub mod variant;

pub use cacheability::CacheabilityPolicy;
pub use cache_control::CacheControl;
pub use clock::{Clock, FixedClock, SystemClock};
pub use combiner::ResponseCombiner;
pub use conditional::ConditionalRequestBuilder;
pub use config::CacheConfig;
pub use entry::{CacheEntry, StorableEntry};
pub use error::{CacheError, OriginError, Result};
pub use events::{CountingEventSink, Event, EventSink, NullEventSink};
pub use freshness::{Freshness, FreshnessCalculator, FreshnessOptions};
pub use executor::{
    CacheContext, CacheOutcome, CacheRequest, CacheResponse,
    CachingExecutor, CancellationToken, OriginExecutor,
};
pub use invalidator::Invalidator;
pub use keyer::CacheKeyer;
pub use resource::Resource;
pub use singleflight::SingleFlight;
pub use storage::memory::MemoryStorage;
pub use storage::{CasHandle, CasOutcome, Storage};
pub use variant::VariantResolver;

#[cfg(feature = "storage-moka")]
#[cfg_attr(docsrs, doc(cfg(feature = "storage-moka")))]
pub use storage::moka::MokaStorage;

#[cfg(feature = "storage-cacache")]
#[cfg_attr(docsrs, doc(cfg(feature = "storage-cacache")))]
pub use storage::cacache::CacacheStorage;
