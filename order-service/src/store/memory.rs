//! In-process order store for tests
//!
//! Mirrors the four-table layout and stages each upsert on a copy, so a
//! failure injected at any step leaves the committed state untouched.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use shared::{Delivery, Item, Order, Payment};

use super::{OrderStore, StoreError};

#[derive(Debug, Clone)]
pub(crate) struct StoredOrder {
    pub raw: serde_json::Value,
    pub delivery: Delivery,
    pub payment: Payment,
    pub items: Vec<Item>,
}

#[derive(Default)]
struct Inner {
    orders: BTreeMap<String, StoredOrder>,
    /// (step, remaining failures)
    fail_at: Option<(&'static str, u32)>,
    commits: u64,
}

#[derive(Default)]
pub(crate) struct MemoryOrderStore {
    inner: Mutex<Inner>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` upserts at `step` (`orders`, `delivery`,
    /// `payment` or `items`).
    pub fn fail_at(&self, step: &'static str, times: u32) {
        self.inner.lock().unwrap().fail_at = Some((step, times));
    }

    /// Overwrite the stored document of an order with undecodable JSON.
    pub fn corrupt(&self, order_uid: &str) {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner
            .orders
            .entry(order_uid.to_string())
            .or_insert_with(|| StoredOrder {
                raw: serde_json::Value::Null,
                delivery: Delivery::default(),
                payment: Payment::default(),
                items: Vec::new(),
            });
        entry.raw = serde_json::json!({ "order_uid": order_uid, "items": "not-a-list" });
    }

    pub fn get(&self, order_uid: &str) -> Option<StoredOrder> {
        self.inner.lock().unwrap().orders.get(order_uid).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().orders.len()
    }

    pub fn commits(&self) -> u64 {
        self.inner.lock().unwrap().commits
    }

    fn check(fail_at: &mut Option<(&'static str, u32)>, step: &'static str) -> Result<(), StoreError> {
        if let Some((failing, remaining)) = fail_at
            && *failing == step
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(StoreError::step(
                step,
                sqlx::Error::Protocol("injected failure".into()),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn upsert_order(&self, order: &Order) -> Result<(), StoreError> {
        let raw = serde_json::to_value(order).map_err(StoreError::Encode)?;
        let mut inner = self.inner.lock().unwrap();
        let mut fail_at = inner.fail_at;

        let result = (|| -> Result<StoredOrder, StoreError> {
            let mut staged = inner
                .orders
                .get(&order.order_uid)
                .cloned()
                .unwrap_or_else(|| StoredOrder {
                    raw: serde_json::Value::Null,
                    delivery: Delivery::default(),
                    payment: Payment::default(),
                    items: Vec::new(),
                });

            Self::check(&mut fail_at, "orders")?;
            staged.raw = raw;
            Self::check(&mut fail_at, "delivery")?;
            staged.delivery = order.delivery.clone();
            Self::check(&mut fail_at, "payment")?;
            staged.payment = order.payment.clone();
            staged.items.clear();
            Self::check(&mut fail_at, "items")?;
            staged.items = order.items.clone();
            Ok(staged)
        })();

        inner.fail_at = fail_at;
        let staged = result?;
        inner.orders.insert(order.order_uid.clone(), staged);
        inner.commits += 1;
        Ok(())
    }

    async fn load_all_raw(&self) -> Result<Vec<Order>, StoreError> {
        let inner = self.inner.lock().unwrap();
        inner
            .orders
            .iter()
            .map(|(order_uid, stored)| {
                serde_json::from_value(stored.raw.clone()).map_err(|source| {
                    StoreError::CorruptDocument {
                        order_uid: order_uid.clone(),
                        source,
                    }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(uid: &str, chrt_ids: &[i64]) -> Order {
        Order {
            order_uid: uid.to_string(),
            items: chrt_ids
                .iter()
                .map(|&chrt_id| Item {
                    chrt_id,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_failed_step_leaves_previous_state() {
        let store = MemoryOrderStore::new();
        store.upsert_order(&order("A1", &[1, 2])).await.unwrap();

        store.fail_at("items", 1);
        let mut changed = order("A1", &[3]);
        changed.delivery.city = "Elsewhere".into();
        assert!(store.upsert_order(&changed).await.is_err());

        let stored = store.get("A1").unwrap();
        assert_eq!(stored.items.len(), 2);
        assert!(stored.delivery.city.is_empty());
        assert_eq!(store.commits(), 1);

        // Failure budget exhausted, next attempt commits
        store.upsert_order(&changed).await.unwrap();
        assert_eq!(store.get("A1").unwrap().items[0].chrt_id, 3);
    }
}
