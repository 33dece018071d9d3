// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bus consumer for the logistics service.
//!
//! Mirrors master data and turns transport reports from downstream workers
//! into attempt status updates. Each event is handled in its own
//! transaction; a failing handler rolls back, is logged and the event is
//! skipped.

use mds_bus::Subscription;
use mds_core::{Event, EventEnvelope, IntelDeliveryStatus, MdsError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::controller::Controller;
use crate::notifier::SOURCE;

pub struct EventPort {
    controller: Controller,
}

impl EventPort {
    pub fn new(controller: Controller) -> Self {
        Self { controller }
    }

    /// Handle one event. Events produced by logistics itself are ignored.
    pub async fn handle(&self, envelope: &EventEnvelope) -> Result<(), MdsError> {
        if envelope.source == SOURCE {
            return Ok(());
        }
        let c = &self.controller;
        match &envelope.event {
            Event::UserCreated(user) => c.create_user(user.clone()).await,
            Event::UserUpdated(user) => c.update_user(user.clone()).await,
            Event::UserDeleted { user } => c.delete_user_by_id(*user).await,
            Event::OperationCreated(op) => c.create_operation(op.clone()).await,
            Event::OperationUpdated(op) => c.update_operation(op.clone()).await,
            Event::OperationMembersUpdated { operation, members } => c
                .update_operation_members(*operation, members.clone())
                .await
                .map(|_| ()),
            Event::GroupCreated(group) => c.create_group(group.clone()).await,
            Event::GroupUpdated(group) => c.update_group(group.clone()).await,
            Event::GroupDeleted { group } => c.delete_group_by_id(*group).await,

            Event::InAppNotificationForIntelPending { attempt } => {
                self.report(*attempt, IntelDeliveryStatus::AwaitingDelivery, "in-app-notification pending")
                    .await
            }
            Event::InAppNotificationForIntelSent { attempt, .. } => {
                self.report(*attempt, IntelDeliveryStatus::AwaitingAck, "in-app-notification sent")
                    .await
            }
            Event::RadioDeliveryReadyForPickup { attempt, note } => {
                self.report(attempt.id, IntelDeliveryStatus::AwaitingDelivery, note)
                    .await
            }
            Event::RadioDeliveryPickedUp { attempt, .. } => {
                self.report(*attempt, IntelDeliveryStatus::Delivering, "delivery picked up")
                    .await
            }
            Event::RadioDeliveryReleased { attempt, .. } => {
                self.report(*attempt, IntelDeliveryStatus::AwaitingDelivery, "delivery released")
                    .await
            }
            Event::RadioDeliveryFinished(delivery) => {
                let result = match delivery.success {
                    Some(true) => {
                        c.mark_intel_delivery_attempt_as_delivered(delivery.attempt, None)
                            .await
                    }
                    Some(false) => {
                        c.mark_intel_delivery_attempt_as_failed(delivery.attempt, Some(delivery.note.clone()))
                            .await
                    }
                    None => Ok(()),
                };
                swallow_not_found(delivery.attempt, result)
            }
            _ => Ok(()),
        }
    }

    /// Move an active attempt to a new active status. Unknown attempts are
    /// ignored.
    async fn report(&self, attempt: Uuid, status: IntelDeliveryStatus, note: &str) -> Result<(), MdsError> {
        let result = self
            .controller
            .update_intel_delivery_attempt_status(attempt, true, status, Some(note.to_string()))
            .await;
        swallow_not_found(attempt, result)
    }

    /// Consume events until the bus closes or `cancel` fires.
    pub async fn run(self, mut subscription: Subscription, cancel: CancellationToken) {
        info!("logistics event port started");
        loop {
            let envelope = tokio::select! {
                _ = cancel.cancelled() => break,
                received = subscription.recv() => match received {
                    Some(envelope) => envelope,
                    None => break,
                },
            };
            if let Err(e) = self.handle(&envelope).await {
                error!(
                    event = envelope.event.name(),
                    event_id = %envelope.id,
                    source = %envelope.source,
                    error = %e,
                    "handling event failed, skipping"
                );
            }
        }
        info!("logistics event port stopped");
    }
}

fn swallow_not_found(attempt: Uuid, result: Result<(), MdsError>) -> Result<(), MdsError> {
    match result {
        Err(e) if e.is_not_found() => {
            debug!(attempt_id = %attempt, error = %e, "ignoring report for unknown intel delivery attempt");
            Ok(())
        }
        other => other,
    }
}
