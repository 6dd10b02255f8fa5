//! Order message handler
//!
//! Turns one message body into an ack/no-ack decision. Holds no broker
//! state, so the same handler serves any [`super::MessageSource`].

use std::sync::Arc;

use shared::Order;

use super::IngestError;
use crate::cache::OrderCache;
use crate::store::OrderStore;

/// Outcome of handling one message
#[derive(Debug)]
pub enum Disposition {
    /// Persisted and cached; acknowledge the message
    Ack,
    /// Nothing was cached; leave the message for redelivery
    NoAck(IngestError),
}

impl Disposition {
    pub fn is_ack(&self) -> bool {
        matches!(self, Disposition::Ack)
    }
}

/// Decode → validate → upsert → cache
#[derive(Clone)]
pub struct OrderHandler {
    store: Arc<dyn OrderStore>,
    cache: OrderCache,
}

impl OrderHandler {
    pub fn new(store: Arc<dyn OrderStore>, cache: OrderCache) -> Self {
        Self { store, cache }
    }

    pub async fn handle(&self, payload: &[u8]) -> Disposition {
        match self.process(payload).await {
            Ok(()) => Disposition::Ack,
            Err(e) => Disposition::NoAck(e),
        }
    }

    async fn process(&self, payload: &[u8]) -> Result<(), IngestError> {
        let order = Order::from_slice(payload)?;
        order.validate()?;

        self.store.upsert_order(&order).await?;

        let order_uid = order.order_uid.clone();
        let items = order.items.len();
        self.cache.set(order_uid.clone(), order);

        tracing::info!(order_uid = %order_uid, items, "Order upserted");
        Ok(())
    }
}
