//! Message source abstraction
//!
//! Pluggable so the worker runs unchanged against JetStream or an
//! in-process broker.

use async_trait::async_trait;

use super::BrokerError;

/// A single delivered message awaiting acknowledgment
#[async_trait]
pub trait Delivery: Send + Sync {
    /// Raw message body
    fn payload(&self) -> &[u8];

    /// How many times this message has been delivered, starting at 1
    fn delivery_count(&self) -> u64;

    /// Confirm successful processing to the broker
    async fn ack(&self) -> Result<(), BrokerError>;
}

/// Stream of deliveries from a durable subscription
#[async_trait]
pub trait MessageSource: Send {
    type Delivery: Delivery;

    /// Wait for the next delivery. `None` means the subscription ended.
    async fn next(&mut self) -> Option<Result<Self::Delivery, BrokerError>>;
}
