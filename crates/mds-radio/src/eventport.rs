// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bus consumer for the radio-delivery service.

use mds_bus::Subscription;
use mds_core::{
    AcceptedIntelDeliveryAttempt, AddressBookEntry, Channel, ChannelDetails, Event, EventEnvelope,
    Intel, IntelDelivery, IntelDeliveryAttempt, MdsError, RadioChannel,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::controller::Controller;
use crate::notifier::SOURCE;

/// Radio-side projection of a freshly created attempt. The accepted-at
/// timestamp is set on acceptance.
fn accepted_attempt(
    attempt: &IntelDeliveryAttempt,
    delivery: &IntelDelivery,
    entry: &AddressBookEntry,
    intel: &Intel,
) -> AcceptedIntelDeliveryAttempt {
    AcceptedIntelDeliveryAttempt {
        id: attempt.id,
        intel: intel.id,
        intel_operation: intel.operation,
        intel_importance: intel.importance,
        assigned_to: delivery.to,
        assigned_to_label: entry.label.clone(),
        assigned_to_user: entry.user,
        delivery: delivery.id,
        channel: attempt.channel,
        created_at: attempt.created_at,
        is_active: attempt.is_active,
        status: attempt.status,
        status_ts: attempt.status_ts,
        note: attempt.note.clone(),
        accepted_at: attempt.created_at,
    }
}

/// Radio channels among the channels of one entry.
fn radio_channels(channels: &[Channel]) -> Vec<RadioChannel> {
    channels
        .iter()
        .filter_map(|c| match &c.details {
            ChannelDetails::Radio { info } => Some(RadioChannel {
                id: c.id,
                entry: c.entry,
                label: c.label.clone(),
                timeout: c.timeout,
                info: info.clone(),
            }),
            _ => None,
        })
        .collect()
}

pub struct EventPort {
    controller: Controller,
}

impl EventPort {
    pub fn new(controller: Controller) -> Self {
        Self { controller }
    }

    pub async fn handle(&self, envelope: &EventEnvelope) -> Result<(), MdsError> {
        if envelope.source == SOURCE {
            return Ok(());
        }
        let c = &self.controller;
        match &envelope.event {
            Event::UserCreated(user) => c.create_user(user.clone()).await,
            Event::UserUpdated(user) => c.update_user(user.clone()).await,
            Event::OperationMembersUpdated { operation, members } => {
                c.update_operation_members(*operation, members.clone()).await
            }
            Event::AddressBookEntryChannelsUpdated { entry, channels } => {
                c.update_radio_channels_by_entry(*entry, radio_channels(channels))
                    .await
            }
            Event::AddressBookEntryDeleted { entry } => c.delete_radio_channels_by_entry(*entry).await,
            Event::IntelDeliveryAttemptCreated {
                attempt,
                delivery,
                assigned_entry,
                intel,
            } => c
                .accept_intel_delivery_attempt(accepted_attempt(attempt, delivery, assigned_entry, intel))
                .await
                .map(|_| ()),
            Event::IntelDeliveryAttemptStatusUpdated(attempt) => {
                c.update_intel_delivery_attempt_status(attempt.clone()).await
            }
            _ => Ok(()),
        }
    }

    /// Consume events until the bus closes or `cancel` fires.
    pub async fn run(self, mut subscription: Subscription, cancel: CancellationToken) {
        info!("radio-delivery event port started");
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
        info!("radio-delivery event port stopped");
    }
}
