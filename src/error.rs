//! Error taxonomy for the caching decision engine.

use miette::Diagnostic;
use thiserror::Error;

/// A `Result` typedef to use with the [`CacheError`] type.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors surfaced by the caching decision engine.
///
/// The core recovers locally from every cache-internal kind (see each
/// variant's doc comment for the recovery taken); the caller only ever
/// observes [`CacheError::OriginFailure`] or [`CacheError::Unsatisfiable`]
/// unless it inspects the emitted [`crate::events::EventSink`] stream.
#[derive(Error, Diagnostic, Debug)]
pub enum CacheError {
    /// A storage read failed. Recovered by treating the lookup as a miss.
    #[error("cache lookup failed: {0}")]
    #[diagnostic(code(cache_core::lookup_failure))]
    CacheLookupFailure(String),

    /// A write or CAS update failed after exhausting retries. Recovered by
    /// skipping the store and returning the fetched response unmodified.
    #[error("cache store failed: {0}")]
    #[diagnostic(code(cache_core::store_failure))]
    CacheStoreFailure(String),

    /// A stored entry could not be deserialized, or violated an invariant
    /// on read. Recovered by evicting the entry and treating it as a miss.
    #[error("cache entry corrupt: {0}")]
    #[diagnostic(code(cache_core::entry_corruption))]
    CacheEntryCorruption(String),

    /// The origin failed during revalidation. Falls back to serving stale
    /// when `stale-if-error` applies; otherwise propagated to the caller.
    #[error("revalidation failed: {0}")]
    #[diagnostic(code(cache_core::revalidation_failure))]
    RevalidationFailure(#[source] OriginError),

    /// The origin failed during an unconditional fetch. Always surfaced.
    #[error("origin fetch failed: {0}")]
    #[diagnostic(code(cache_core::origin_failure))]
    OriginFailure(#[source] OriginError),

    /// The request carried `only-if-cached` and no entry could satisfy it.
    /// Answered locally with a synthesized `504 Gateway Timeout`.
    #[error("request marked only-if-cached could not be satisfied from cache")]
    #[diagnostic(code(cache_core::unsatisfiable))]
    Unsatisfiable,

    /// Invalid configuration, detected at construction time.
    #[error("invalid cache configuration: {0}")]
    #[diagnostic(code(cache_core::configuration))]
    ConfigurationError(String),
}

/// Opaque error returned by an [`crate::executor::OriginExecutor`].
///
/// Kept distinct from [`CacheError`] so the executor can tell "the origin
/// failed" apart from "the cache machinery failed" when deciding whether to
/// recover locally or propagate.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct OriginError(#[from] pub Box<dyn std::error::Error + Send + Sync>);

impl OriginError {
    /// Wrap an arbitrary error as an origin failure.
    pub fn new<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        Self(Box::new(err))
    }
}
