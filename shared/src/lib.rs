//! Shared types for the order pipeline
//!
//! The order document model used by the ingestion service and by any
//! publisher or client that speaks the same JSON shape.

pub mod models;

// Re-exports
pub use models::{Delivery, Item, Order, OrderValidationError, Payment};
pub use serde::{Deserialize, Serialize};
