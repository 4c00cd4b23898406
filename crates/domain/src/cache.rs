//! Read-side cache of the latest state per aggregate.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use common::AggregateKey;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::entity::EntityState;

/// Offset-based page request for list scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub from: usize,
    pub size: usize,
}

impl Pagination {
    pub const DEFAULT_SIZE: usize = 50;

    pub fn new(from: usize, size: usize) -> Self {
        Self { from, size }
    }

    /// Everything, in one page.
    pub fn all() -> Self {
        Self {
            from: 0,
            size: usize::MAX,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            from: 0,
            size: Self::DEFAULT_SIZE,
        }
    }
}

/// One page of a list scan together with the number of matching entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<S> {
    pub total: usize,
    pub results: Vec<S>,
}

/// Mapping from aggregate key to the last known state.
///
/// The cache is derived and disposable: the log stays authoritative and the
/// cache can be refilled from it at any time. Only the write coordinator
/// overwrites entries; lazy fills and rebuilds go through
/// [`StateCache::put_if_newer`] so they never replace a newer write.
#[derive(Clone)]
pub struct StateCache<S> {
    entries: Arc<RwLock<HashMap<AggregateKey, S>>>,
}

impl<S: EntityState> StateCache<S> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get(&self, key: &AggregateKey) -> Option<S> {
        self.entries.read().await.get(key).cloned()
    }

    /// Overwrites the entry for the state's key.
    pub async fn put(&self, state: S) {
        self.entries.write().await.insert(state.key(), state);
    }

    /// Stores `state` unless the cache already holds the same or a later
    /// revision. Returns whether the entry was written.
    pub async fn put_if_newer(&self, state: S) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get(&state.key()) {
            Some(current) if current.revision() >= state.revision() => false,
            _ => {
                entries.insert(state.key(), state);
                true
            }
        }
    }

    pub async fn remove(&self, key: &AggregateKey) -> Option<S> {
        self.entries.write().await.remove(key)
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Counts the entries matching `filter`.
    pub async fn count<F>(&self, filter: F) -> usize
    where
        F: Fn(&S) -> bool,
    {
        self.entries.read().await.values().filter(|s| filter(s)).count()
    }

    /// Paged, filtered and ordered scan over the cached states.
    ///
    /// List views may lag slightly behind the log; use `get` for a
    /// read-your-write lookup of a single key.
    pub async fn list<F, O>(&self, pagination: Pagination, filter: F, ordering: O) -> Page<S>
    where
        F: Fn(&S) -> bool,
        O: Fn(&S, &S) -> Ordering,
    {
        let mut matching: Vec<S> = {
            let entries = self.entries.read().await;
            entries.values().filter(|s| filter(s)).cloned().collect()
        };
        matching.sort_by(|a, b| ordering(a, b));

        let total = matching.len();
        let results = matching
            .into_iter()
            .skip(pagination.from)
            .take(pagination.size)
            .collect();
        Page { total, results }
    }
}

impl<S: EntityState> Default for StateCache<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Orders states by their key, the default ordering of list views.
pub fn by_key<S: EntityState>(a: &S, b: &S) -> Ordering {
    a.key().cmp(&b.key())
}
