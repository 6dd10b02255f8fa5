//! Order ingestion
//!
//! ```text
//!  JetStream durable consumer (explicit ack, ack_wait, max_ack_pending = 1)
//!        │ Delivery
//!        ▼
//!  IngestWorker  ── one message at a time ──►  OrderHandler
//!        ▲                                      │ decode → validate
//!        │ Ack / NoAck                          │ store.upsert_order (tx)
//!        └──────────────────────────────────────┘ cache.set
//! ```
//!
//! A message is acknowledged only after its transaction committed and the
//! cache was updated. Anything else leaves it unacknowledged and the broker
//! redelivers it once `ack_wait` elapses (at-least-once).

mod handler;
mod jetstream;
mod source;
mod worker;

#[cfg(test)]
pub(crate) mod memory;

pub use handler::{Disposition, OrderHandler};
pub use jetstream::{JetStreamDelivery, JetStreamSource, SubscriptionConfig};
pub use source::{Delivery, MessageSource};
pub use worker::{IngestStats, IngestWorker};

use shared::OrderValidationError;
use thiserror::Error;

use crate::store::StoreError;

/// Reasons a message is left unacknowledged
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("malformed order document: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid order: {0}")]
    Invalid(#[from] OrderValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IngestError {
    /// Redelivering the same bytes can never succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(self, IngestError::Decode(_) | IngestError::Invalid(_))
    }
}

/// Broker errors
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: async_nats::Error,
    },

    #[error("failed to set up stream {stream}: {source}")]
    Stream {
        stream: String,
        #[source]
        source: async_nats::Error,
    },

    #[error("failed to set up consumer {durable}: {source}")]
    Consumer {
        durable: String,
        #[source]
        source: async_nats::Error,
    },

    #[error("message delivery failed: {0}")]
    Receive(#[source] async_nats::Error),

    #[error("acknowledgment failed: {0}")]
    Ack(#[source] async_nats::Error),
}
