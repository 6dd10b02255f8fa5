//! Data models
//!
//! Wire and storage shape of an order document. Every field is optional on
//! the wire and falls back to its default; `order_uid` is the only field an
//! order must carry to be accepted.

pub mod order;

// Re-exports
pub use order::*;
