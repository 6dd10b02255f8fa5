//! In-memory order cache
//!
//! Mirrors the store's key space for the read path. Backed by `DashMap`,
//! so readers and the ingest worker share it without external locking.
//! There is no eviction: an entry lives until it is overwritten.

use std::sync::Arc;

use dashmap::DashMap;
use shared::Order;

/// Concurrent `order_uid` → order map
#[derive(Debug, Clone, Default)]
pub struct OrderCache {
    entries: Arc<DashMap<String, Arc<Order>>>,
}

impl OrderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the order stored under `key`
    pub fn set(&self, key: impl Into<String>, order: Order) {
        self.entries.insert(key.into(), Arc::new(order));
    }

    /// Look up an order by `order_uid`
    pub fn get(&self, key: &str) -> Option<Arc<Order>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Visit every entry until `f` returns `false`.
    ///
    /// Iterates over a snapshot taken up front, so each key is visited at
    /// most once and `f` may call [`OrderCache::set`] freely. Writes made
    /// while iterating may or may not be observed.
    pub fn range<F>(&self, mut f: F)
    where
        F: FnMut(&str, &Order) -> bool,
    {
        let snapshot: Vec<(String, Arc<Order>)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        for (key, order) in &snapshot {
            if !f(key, order) {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
