use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use super::query::TitleQuery;
use crate::models::Title;

/// Memoized listing results for one snapshot version.
///
/// Entries are keyed by the query alone; a different snapshot version
/// empties the cache before anything is looked up. Oldest entries are
/// evicted first once `capacity` is reached.
pub struct ViewCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

#[derive(Default)]
struct CacheState {
    version: u64,
    entries: HashMap<TitleQuery, Arc<Vec<Title>>>,
    order: VecDeque<TitleQuery>,
    hits: u64,
    misses: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub version: u64,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl ViewCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Returns the cached result for `query` at `version`, computing it with
    /// `compute` on a miss.
    pub fn listing<F>(&self, version: u64, query: &TitleQuery, compute: F) -> Arc<Vec<Title>>
    where
        F: FnOnce() -> Vec<Title>,
    {
        {
            let mut state = self.lock();
            if state.version != version {
                state.entries.clear();
                state.order.clear();
                state.version = version;
            }
            if let Some(hit) = state.entries.get(query).cloned() {
                state.hits += 1;
                return hit;
            }
            state.misses += 1;
        }

        // Computed outside the lock; a concurrent miss on the same key just
        // computes twice.
        let result = Arc::new(compute());

        if self.capacity > 0 {
            let mut state = self.lock();
            if state.version == version && !state.entries.contains_key(query) {
                while state.entries.len() >= self.capacity {
                    let Some(oldest) = state.order.pop_front() else {
                        break;
                    };
                    state.entries.remove(&oldest);
                }
                state.entries.insert(query.clone(), Arc::clone(&result));
                state.order.push_back(query.clone());
            }
        }

        result
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            version: state.version,
            entries: state.entries.len(),
            hits: state.hits,
            misses: state.misses,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
