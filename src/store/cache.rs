//! TTL cache for search results.
//!
//! Never authoritative: every write to the store clears it.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;

use super::record::Field;
use crate::year::YearSpec;

/// Composite search key. Each search kind has its own key space.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum CacheKey {
    Field {
        field: Field,
        value: String,
        fuzzy: bool,
    },
    Identity {
        name: String,
        fuzzy: bool,
    },
    Year(YearSpec),
}

pub(crate) type ResultSet = Arc<BTreeSet<String>>;

/// Result cache; a zero TTL disables it.
pub(crate) struct ResultCache {
    cache: Option<Cache<CacheKey, ResultSet>>,
}

impl ResultCache {
    pub(crate) fn new(ttl: Duration, max_entries: u64) -> Self {
        let cache = (!ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(ttl)
                .build()
        });
        Self { cache }
    }

    pub(crate) fn get(&self, key: &CacheKey) -> Option<ResultSet> {
        self.cache.as_ref()?.get(key)
    }

    pub(crate) fn insert(&self, key: CacheKey, results: ResultSet) {
        if let Some(cache) = &self.cache {
            cache.insert(key, results);
        }
    }

    pub(crate) fn clear(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
        }
    }

    /// Live entries after pending maintenance has run.
    pub(crate) fn len(&self) -> u64 {
        self.cache.as_ref().map_or(0, |cache| {
            cache.run_pending_tasks();
            cache.entry_count()
        })
    }
}

impl fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCache")
            .field("enabled", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}
