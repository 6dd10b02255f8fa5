//! Startup cache rehydration
//!
//! Must complete before the ingest worker starts and before the read
//! endpoint listens, so no reader ever sees a partially warmed cache.

use crate::cache::OrderCache;
use crate::store::{OrderStore, StoreError};

/// Load every persisted order into the cache.
///
/// Returns the number of restored orders. Any load error is returned
/// unchanged and the cache must be considered unusable.
pub async fn restore_cache(store: &dyn OrderStore, cache: &OrderCache) -> Result<usize, StoreError> {
    let orders = store.load_all_raw().await?;
    let count = orders.len();

    for order in orders {
        cache.set(order.order_uid.clone(), order);
    }

    tracing::info!(count, "Cache restored from store");
    Ok(count)
}
