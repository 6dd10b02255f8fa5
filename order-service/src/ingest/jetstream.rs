//! NATS JetStream binding
//!
//! Durable pull consumer with explicit acknowledgment. A new durable name
//! starts from the first message in the stream; an existing one resumes
//! from its ack floor, so restarts never skip unacknowledged orders.

use std::pin::Pin;
use std::time::Duration;

use async_nats::jetstream::{self, consumer, stream};
use async_trait::async_trait;
use futures::StreamExt;

use super::{BrokerError, Delivery, MessageSource};
use crate::config::Config;

/// Subscription parameters
#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    pub url: String,
    pub client_name: String,
    pub stream: String,
    pub subject: String,
    pub durable: String,
    pub ack_wait: Duration,
    pub max_deliver: Option<i64>,
}

impl SubscriptionConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            url: config.nats_url.clone(),
            client_name: config.nats_client.clone(),
            stream: config.nats_stream.clone(),
            subject: config.nats_subject.clone(),
            durable: config.nats_durable.clone(),
            ack_wait: config.ack_wait,
            max_deliver: config.max_deliver,
        }
    }
}

/// Message source backed by a JetStream durable pull consumer
pub struct JetStreamSource {
    client: async_nats::Client,
    messages: Pin<Box<consumer::pull::Stream>>,
}

impl JetStreamSource {
    /// Connect, ensure the stream exists and bind the durable consumer.
    pub async fn connect(config: &SubscriptionConfig) -> Result<Self, BrokerError> {
        tracing::info!(url = %config.url, client = %config.client_name, "Connecting to NATS");
        let client = async_nats::ConnectOptions::new()
            .name(&config.client_name)
            .connect(config.url.as_str())
            .await
            .map_err(|e| BrokerError::Connect {
                url: config.url.clone(),
                source: e.into(),
            })?;
        let js = jetstream::new(client.clone());

        let order_stream = js
            .get_or_create_stream(stream::Config {
                name: config.stream.clone(),
                subjects: vec![config.subject.clone()],
                storage: stream::StorageType::File,
                ..Default::default()
            })
            .await
            .map_err(|e| BrokerError::Stream {
                stream: config.stream.clone(),
                source: e.into(),
            })?;

        let consumer: consumer::PullConsumer = order_stream
            .get_or_create_consumer(
                &config.durable,
                consumer::pull::Config {
                    durable_name: Some(config.durable.clone()),
                    filter_subject: config.subject.clone(),
                    deliver_policy: consumer::DeliverPolicy::All,
                    ack_policy: consumer::AckPolicy::Explicit,
                    ack_wait: config.ack_wait,
                    // 0 leaves the server default (unlimited)
                    max_deliver: config.max_deliver.unwrap_or(0),
                    // Never more than one unacknowledged order in flight
                    max_ack_pending: 1,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| BrokerError::Consumer {
                durable: config.durable.clone(),
                source: e.into(),
            })?;

        let messages = consumer
            .messages()
            .await
            .map_err(|e| BrokerError::Consumer {
                durable: config.durable.clone(),
                source: e.into(),
            })?;

        tracing::info!(
            stream = %config.stream,
            subject = %config.subject,
            durable = %config.durable,
            ack_wait_secs = config.ack_wait.as_secs(),
            "Subscribed to order subject"
        );

        Ok(Self {
            client,
            messages: Box::pin(messages),
        })
    }

    /// Underlying client, kept by the caller to flush pending acks on shutdown
    pub fn client(&self) -> async_nats::Client {
        self.client.clone()
    }
}

#[async_trait]
impl MessageSource for JetStreamSource {
    type Delivery = JetStreamDelivery;

    async fn next(&mut self) -> Option<Result<Self::Delivery, BrokerError>> {
        let next = self.messages.next().await?;
        Some(
            next.map(|message| JetStreamDelivery { message })
                .map_err(|e| BrokerError::Receive(e.into())),
        )
    }
}

/// One JetStream message
pub struct JetStreamDelivery {
    message: jetstream::Message,
}

#[async_trait]
impl Delivery for JetStreamDelivery {
    fn payload(&self) -> &[u8] {
        &self.message.payload
    }

    fn delivery_count(&self) -> u64 {
        self.message
            .info()
            .map(|info| info.delivered.max(1) as u64)
            .unwrap_or(1)
    }

    async fn ack(&self) -> Result<(), BrokerError> {
        // Waits for the server to confirm the ack
        self.message.double_ack().await.map_err(BrokerError::Ack)
    }
}
