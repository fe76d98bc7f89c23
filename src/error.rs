//! Chronicle error types.

use std::time::Duration;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
///
/// A cache miss is not an error: [`MetaCache::retrieve`] returns `Option`
/// and polling callers are expected to handle `None`.
///
/// [`MetaCache::retrieve`]: crate::metacache::MetaCache::retrieve
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required credential or destination is absent at startup.
    /// Fatal before any connection is attempted.
    #[error("missing configuration: {0}")]
    ConfigMissing(&'static str),

    /// A metadata fetch could not obtain its data. Recoverable: callers
    /// proceed with whatever is already cached and record a partial entry.
    #[error("metadata fetch failed for '{key}': {source}")]
    FetchFailed {
        key: String,
        #[source]
        source: FetchError,
    },

    /// The log backend is unreachable and retries were not possible.
    #[error("log sink unavailable: {0}")]
    SinkUnavailable(String),

    /// The log backlog stayed full for the whole enqueue timeout.
    /// Signals the producer to slow down; the entry was not accepted.
    #[error("log backlog full after waiting {0:?}")]
    Backpressure(Duration),

    /// The chat log has been closed; no further entries are accepted.
    #[error("chat log is closed")]
    LogClosed,
}

/// Failure of a single remote metadata fetch.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("remote endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("entity not found: {0}")]
    NotFound(String),

    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),
}
