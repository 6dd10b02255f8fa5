//! Order persistence
//!
//! [`OrderStore`] is the seam between ingestion/recovery and the database.
//! Writes are whole-document upserts; reloads come from the serialized
//! document column only, never from the normalized tables.

mod postgres;

#[cfg(test)]
pub(crate) mod memory;

pub use postgres::PgOrderStore;

use async_trait::async_trait;
use shared::Order;
use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("schema migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("upsert {step} failed: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to serialize order document: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("stored document for order {order_uid} is corrupt: {source}")]
    CorruptDocument {
        order_uid: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn step(step: &'static str, source: sqlx::Error) -> Self {
        Self::Step { step, source }
    }
}

/// Transactional order storage
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert or fully replace an order with its delivery, payment and items.
    ///
    /// All-or-nothing: on error no part of the write is visible.
    async fn upsert_order(&self, order: &Order) -> Result<(), StoreError>;

    /// Load every persisted order from its serialized document.
    ///
    /// A single undecodable document fails the whole load.
    async fn load_all_raw(&self) -> Result<Vec<Order>, StoreError>;
}
