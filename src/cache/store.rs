//! Page store: every cached view and its paged result.

use std::sync::RwLock;

use lru::LruCache;
use metrics::gauge;

use crate::application::pagination::PagedResult;

use super::config::CacheConfig;
use super::keys::ViewKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";
const METRIC_CACHED_VIEWS: &str = "livetable_cached_views";

/// Cached views of one collection, keyed by [`ViewKey`].
///
/// Bounded by `max_views`; reads through [`PageStore::get`] refresh recency,
/// reconciliation does not.
pub struct PageStore<E> {
    views: RwLock<LruCache<ViewKey, PagedResult<E>>>,
}

impl<E: Clone> PageStore<E> {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            views: RwLock::new(LruCache::new(config.max_views_non_zero())),
        }
    }

    /// Read a view, marking it recently used.
    pub fn get(&self, key: &ViewKey) -> Option<PagedResult<E>> {
        rw_write(&self.views, SOURCE, "get").get(key).cloned()
    }

    /// Read a view without touching its recency.
    pub fn peek(&self, key: &ViewKey) -> Option<PagedResult<E>> {
        rw_read(&self.views, SOURCE, "peek").peek(key).cloned()
    }

    pub fn contains(&self, key: &ViewKey) -> bool {
        rw_read(&self.views, SOURCE, "contains").contains(key)
    }

    /// Store a freshly fetched page, returning the key evicted to make room.
    pub fn put(&self, key: ViewKey, page: PagedResult<E>) -> Option<ViewKey> {
        let mut views = rw_write(&self.views, SOURCE, "put");
        let evicted = views
            .push(key.clone(), page)
            .map(|(evicted_key, _)| evicted_key)
            .filter(|evicted_key| *evicted_key != key);
        gauge!(METRIC_CACHED_VIEWS).set(views.len() as f64);
        evicted
    }

    /// Drop a view, e.g. when the screen showing it is torn down.
    pub fn evict(&self, key: &ViewKey) -> Option<PagedResult<E>> {
        let mut views = rw_write(&self.views, SOURCE, "evict");
        let removed = views.pop(key);
        gauge!(METRIC_CACHED_VIEWS).set(views.len() as f64);
        removed
    }

    pub fn invalidate_all(&self) {
        rw_write(&self.views, SOURCE, "invalidate_all").clear();
        gauge!(METRIC_CACHED_VIEWS).set(0.0);
    }

    /// Snapshot of the cached keys, most recently used first.
    pub fn keys(&self) -> Vec<ViewKey> {
        rw_read(&self.views, SOURCE, "keys")
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Visit every cached view mutably under one write lock.
    pub fn for_each_mut<F>(&self, mut visit: F)
    where
        F: FnMut(&ViewKey, &mut PagedResult<E>),
    {
        let mut views = rw_write(&self.views, SOURCE, "for_each_mut");
        for (key, page) in views.iter_mut() {
            visit(key, page);
        }
    }

    pub fn len(&self) -> usize {
        rw_read(&self.views, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
