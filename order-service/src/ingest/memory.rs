//! In-process broker for tests
//!
//! Behaves like a durable consumer with `max_ack_pending = 1`: the oldest
//! unacknowledged message is handed out again on the next `next()` call
//! until it is acked or reaches `max_deliver`.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{BrokerError, Delivery, MessageSource};

type AckObserver = Box<dyn Fn(&[u8]) -> bool + Send>;

struct Message {
    payload: Vec<u8>,
    deliveries: u64,
    acked: bool,
}

#[derive(Default)]
struct BrokerState {
    messages: Vec<Message>,
    closed: bool,
    max_deliver: Option<u64>,
    failing_acks: u32,
    observer: Option<AckObserver>,
    observations: Vec<bool>,
}

impl BrokerState {
    fn pending(&mut self) -> Option<(usize, &mut Message)> {
        let max_deliver = self.max_deliver;
        self.messages
            .iter_mut()
            .enumerate()
            .find(|(_, m)| !m.acked && max_deliver.is_none_or(|max| m.deliveries < max))
    }
}

#[derive(Clone)]
pub(crate) struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    notify: Arc<Notify>,
}

impl MemoryBroker {
    pub fn new(max_deliver: Option<u64>) -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState {
                max_deliver,
                ..Default::default()
            })),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Append a message and return its sequence number
    pub fn publish(&self, payload: &[u8]) -> usize {
        let seq = {
            let mut state = self.state.lock().unwrap();
            state.messages.push(Message {
                payload: payload.to_vec(),
                deliveries: 0,
                acked: false,
            });
            state.messages.len() - 1
        };
        self.notify.notify_waiters();
        seq
    }

    /// End the subscription once nothing deliverable is left.
    pub fn close(&self) {
        self.state.lock().unwrap().closed = true;
        self.notify.notify_waiters();
    }

    /// Fail the next `times` acks
    pub fn fail_acks(&self, times: u32) {
        self.state.lock().unwrap().failing_acks = times;
    }

    /// Run `f` on every ack attempt and record its result
    pub fn observe_acks<F>(&self, f: F)
    where
        F: Fn(&[u8]) -> bool + Send + 'static,
    {
        self.state.lock().unwrap().observer = Some(Box::new(f));
    }

    pub fn ack_observations(&self) -> Vec<bool> {
        self.state.lock().unwrap().observations.clone()
    }

    pub fn is_acked(&self, seq: usize) -> bool {
        self.state.lock().unwrap().messages[seq].acked
    }

    pub fn delivery_count(&self, seq: usize) -> u64 {
        self.state.lock().unwrap().messages[seq].deliveries
    }

    pub fn acked_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.messages.iter().filter(|m| m.acked).count()
    }

    pub fn subscribe(&self) -> MemorySource {
        MemorySource {
            broker: self.clone(),
        }
    }
}

pub(crate) struct MemorySource {
    broker: MemoryBroker,
}

#[async_trait]
impl MessageSource for MemorySource {
    type Delivery = MemoryDelivery;

    async fn next(&mut self) -> Option<Result<Self::Delivery, BrokerError>> {
        loop {
            // Registered before checking so a concurrent publish is not missed
            let notified = self.broker.notify.notified();
            {
                let mut state = self.broker.state.lock().unwrap();
                if let Some((seq, message)) = state.pending() {
                    message.deliveries += 1;
                    return Some(Ok(MemoryDelivery {
                        seq,
                        payload: message.payload.clone(),
                        delivery_count: message.deliveries,
                        state: Arc::clone(&self.broker.state),
                    }));
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }
}

pub(crate) struct MemoryDelivery {
    seq: usize,
    payload: Vec<u8>,
    delivery_count: u64,
    state: Arc<Mutex<BrokerState>>,
}

#[async_trait]
impl Delivery for MemoryDelivery {
    fn payload(&self) -> &[u8] {
        &self.payload
    }

    fn delivery_count(&self) -> u64 {
        self.delivery_count
    }

    async fn ack(&self) -> Result<(), BrokerError> {
        let mut state = self.state.lock().unwrap();
        let seen = state.observer.as_ref().map(|observe| observe(&self.payload));
        if let Some(seen) = seen {
            state.observations.push(seen);
        }
        if state.failing_acks > 0 {
            state.failing_acks -= 1;
            return Err(BrokerError::Ack("injected ack failure".into()));
        }
        state.messages[self.seq].acked = true;
        Ok(())
    }
}
