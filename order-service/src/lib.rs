//! order-service: durable order ingestion with a cached read path
//!
//! Order documents arrive on a NATS JetStream durable subscription, are
//! validated and written to PostgreSQL in a single transaction, then cached
//! in memory. `GET /orders/{order_uid}` is answered from the cache only.
//! On startup the cache is rebuilt from the stored documents before any
//! message is consumed or any request is served.

pub mod api;
pub mod app;
pub mod cache;
pub mod config;
pub mod ingest;
pub mod logger;
pub mod recovery;
pub mod state;
pub mod store;

pub use cache::OrderCache;
pub use config::{Config, ConfigError};
pub use store::{OrderStore, PgOrderStore, StoreError};
