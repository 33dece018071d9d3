// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event publishing trait used by the outbox relay.

use async_trait::async_trait;

use crate::error::MdsError;
use crate::event::EventEnvelope;

/// Publishes committed events to the bus.
///
/// Called only by the outbox relay, never from inside a transaction.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, envelope: EventEnvelope) -> Result<(), MdsError>;
}
