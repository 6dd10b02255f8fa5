//! Ingest worker
//!
//! One logical worker per subscription: each delivery is handled to
//! completion (ack or no-ack) before the next one is requested, so two
//! transactions for the same order never race.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{Delivery, Disposition, MessageSource, OrderHandler};

/// Pause after a receive error before asking the source again
const RECEIVE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Counters reported when the worker stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Processed and acknowledged
    pub acked: u64,
    /// Left unacknowledged for redelivery
    pub rejected: u64,
    /// Processed but the ack did not reach the broker
    pub ack_failed: u64,
    /// Errors reported by the source itself
    pub receive_errors: u64,
}

/// Sequential consumption loop
pub struct IngestWorker<S: MessageSource> {
    source: S,
    handler: OrderHandler,
    shutdown: CancellationToken,
}

impl<S: MessageSource> IngestWorker<S> {
    pub fn new(source: S, handler: OrderHandler, shutdown: CancellationToken) -> Self {
        Self {
            source,
            handler,
            shutdown,
        }
    }

    /// Run until the subscription ends or shutdown is requested.
    ///
    /// Shutdown is only observed between messages; an in-flight message is
    /// always finished first.
    pub async fn run(mut self) -> IngestStats {
        tracing::info!("Ingest worker started");
        let mut stats = IngestStats::default();

        loop {
            let next = tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    tracing::info!("Ingest worker received shutdown signal");
                    break;
                }

                next = self.source.next() => next,
            };

            let delivery = match next {
                Some(Ok(delivery)) => delivery,
                Some(Err(e)) => {
                    stats.receive_errors += 1;
                    tracing::warn!(error = %e, "Failed to receive message");
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(RECEIVE_RETRY_DELAY) => continue,
                    }
                }
                None => {
                    tracing::warn!("Subscription ended");
                    break;
                }
            };

            self.process(&delivery, &mut stats).await;
        }

        tracing::info!(
            acked = stats.acked,
            rejected = stats.rejected,
            ack_failed = stats.ack_failed,
            "Ingest worker stopped"
        );
        stats
    }

    async fn process(&self, delivery: &S::Delivery, stats: &mut IngestStats) {
        let delivery_count = delivery.delivery_count();

        match self.handler.handle(delivery.payload()).await {
            Disposition::Ack => match delivery.ack().await {
                Ok(()) => stats.acked += 1,
                Err(e) => {
                    // The broker redelivers after ack_wait; the upsert is idempotent.
                    stats.ack_failed += 1;
                    tracing::warn!(error = %e, delivery_count, "Ack failed");
                }
            },
            Disposition::NoAck(e) => {
                stats.rejected += 1;
                if e.is_permanent() {
                    tracing::warn!(
                        error = %e,
                        delivery_count,
                        "Rejected order message, left for redelivery"
                    );
                } else {
                    tracing::error!(
                        error = %e,
                        delivery_count,
                        "Failed to persist order, left for redelivery"
                    );
                }
            }
        }
    }
}
