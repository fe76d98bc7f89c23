//! Lookup descriptors for cache population.

use std::collections::BTreeMap;

use futures::future::BoxFuture;

use crate::error::FetchError;

/// Flat string-attribute mapping stored per cache key.
///
/// `BTreeMap` keeps field order deterministic, which matters when entries
/// are serialized downstream.
pub type AttrMap = BTreeMap<String, String>;

/// Typed inputs for a fetch, one variant per lookup kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupParams {
    Channel { channel_id: String },
    Guild { guild_id: String },
    User { user_id: String },
    /// Escape hatch for lookup kinds the crate does not know about.
    Custom(BTreeMap<String, String>),
}

/// How to populate a key on miss or staleness.
///
/// Supplied per [`check_and_update`] call, never stored. The fetch closure
/// may hold an `Arc` to a *different* [`MetaCache`] and populate it as a
/// side effect (chained lookup, e.g. resolving a channel also resolves its
/// guild).
///
/// [`check_and_update`]: crate::metacache::MetaCache::check_and_update
/// [`MetaCache`]: crate::metacache::MetaCache
pub struct MetaLookup {
    params: LookupParams,
    fetch: Box<dyn Fn(LookupParams) -> BoxFuture<'static, Result<AttrMap, FetchError>> + Send + Sync>,
}

impl MetaLookup {
    pub fn new<F>(params: LookupParams, fetch: F) -> Self
    where
        F: Fn(LookupParams) -> BoxFuture<'static, Result<AttrMap, FetchError>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            params,
            fetch: Box::new(fetch),
        }
    }

    pub fn params(&self) -> &LookupParams {
        &self.params
    }

    /// Invoke the fetch with a copy of the parameters.
    pub(crate) fn invoke(&self) -> BoxFuture<'static, Result<AttrMap, FetchError>> {
        (self.fetch)(self.params.clone())
    }
}

impl std::fmt::Debug for MetaLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaLookup")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
