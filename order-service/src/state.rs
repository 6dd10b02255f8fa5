//! Shared HTTP state

use crate::cache::OrderCache;

/// State handed to every request handler
#[derive(Clone)]
pub struct AppState {
    /// Read side of the order cache
    pub cache: OrderCache,
}

impl AppState {
    pub fn new(cache: OrderCache) -> Self {
        Self { cache }
    }
}
