// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Internal typed event bus.
//!
//! The bus is the only link between the logistics and radio-delivery
//! services: each publishes committed events here through its outbox relay
//! and consumes the other's events through a subscription. Neither service
//! calls the other directly.
//!
//! Every subscriber owns a bounded queue. Publishing waits until each live
//! subscriber has room, so a slow consumer holds back the outbox relay
//! instead of losing events the relay already removed from its outbox.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mds_core::{EventEnvelope, EventPublisher, MdsError};
use tokio::sync::mpsc;
use tracing::debug;

/// Fan-out bus for [`EventEnvelope`]s.
#[derive(Clone)]
pub struct EventBus {
    capacity: usize,
    subscribers: Arc<Mutex<Vec<mpsc::Sender<EventEnvelope>>>>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.lock_subscribers().push(tx);
        Subscription { rx }
    }

    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.lock_subscribers();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }

    fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::Sender<EventEnvelope>>> {
        // The list stays consistent even if a holder panicked.
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl EventPublisher for EventBus {
    /// Deliver `envelope` to every live subscriber, waiting for queue space.
    /// Subscribers dropped in the meantime are skipped and forgotten.
    async fn publish(&self, envelope: EventEnvelope) -> Result<(), MdsError> {
        let name = envelope.event.name();
        let subscribers: Vec<_> = self.lock_subscribers().clone();
        if subscribers.is_empty() {
            debug!(event = name, "published event without subscribers");
            return Ok(());
        }

        let mut gone = false;
        for tx in &subscribers {
            if tx.send(envelope.clone()).await.is_err() {
                gone = true;
            }
        }
        if gone {
            debug!(event = name, "dropping closed bus subscriptions");
            self.lock_subscribers().retain(|tx| !tx.is_closed());
        }
        Ok(())
    }
}

/// Receiving side of the bus.
pub struct Subscription {
    rx: mpsc::Receiver<EventEnvelope>,
}

impl Subscription {
    /// Next event, or `None` once every bus handle is gone.
    pub async fn recv(&mut self) -> Option<EventEnvelope> {
        self.rx.recv().await
    }
}
