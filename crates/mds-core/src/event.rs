// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain events exchanged over the bus.
//!
//! Every event carries entity ids plus the minimal state subscribers need.
//! Events are written to the producing service's outbox inside the same
//! transaction as the state change; the relay publishes them after commit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{
    AcceptedIntelDeliveryAttempt, AddressBookEntry, Channel, Group, Intel, IntelDelivery,
    IntelDeliveryAttempt, Operation, RadioDelivery, User,
};

/// All events known to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum Event {
    // Master data, produced upstream.
    UserCreated(User),
    UserUpdated(User),
    UserDeleted {
        user: Uuid,
    },
    OperationCreated(Operation),
    OperationUpdated(Operation),
    OperationMembersUpdated {
        operation: Uuid,
        members: Vec<Uuid>,
    },
    GroupCreated(Group),
    GroupUpdated(Group),
    GroupDeleted {
        group: Uuid,
    },

    // Address book, produced by logistics.
    AddressBookEntryCreated(AddressBookEntry),
    AddressBookEntryUpdated(AddressBookEntry),
    AddressBookEntryDeleted {
        entry: Uuid,
    },
    AddressBookEntryChannelsUpdated {
        entry: Uuid,
        channels: Vec<Channel>,
    },
    AddressBookEntryAutoDeliveryUpdated {
        entry: Uuid,
        enabled: bool,
    },

    // Intel and deliveries, produced by logistics.
    IntelCreated(Intel),
    IntelInvalidated {
        intel: Uuid,
        by: Uuid,
    },
    IntelDeliveryCreated(IntelDelivery),
    IntelDeliveryStatusUpdated {
        delivery: Uuid,
        is_active: bool,
        success: bool,
        note: Option<String>,
    },
    IntelDeliveryAttemptCreated {
        attempt: IntelDeliveryAttempt,
        delivery: IntelDelivery,
        assigned_entry: AddressBookEntry,
        intel: Intel,
    },
    IntelDeliveryAttemptStatusUpdated(IntelDeliveryAttempt),

    // Downstream transport reports.
    InAppNotificationForIntelPending {
        attempt: Uuid,
    },
    InAppNotificationForIntelSent {
        attempt: Uuid,
        sent_at: DateTime<Utc>,
    },

    // Radio handling, produced by radio-delivery.
    RadioDeliveryReadyForPickup {
        attempt: AcceptedIntelDeliveryAttempt,
        note: String,
    },
    RadioDeliveryPickedUp {
        attempt: Uuid,
        by: Uuid,
        at: DateTime<Utc>,
    },
    RadioDeliveryReleased {
        attempt: Uuid,
        at: DateTime<Utc>,
    },
    RadioDeliveryFinished(RadioDelivery),
}

impl Event {
    /// Topic the event belongs to, used for routing and log context.
    pub fn topic(&self) -> &'static str {
        match self {
            Self::UserCreated(_) | Self::UserUpdated(_) | Self::UserDeleted { .. } => "users",
            Self::OperationCreated(_)
            | Self::OperationUpdated(_)
            | Self::OperationMembersUpdated { .. } => "operations",
            Self::GroupCreated(_) | Self::GroupUpdated(_) | Self::GroupDeleted { .. } => "groups",
            Self::AddressBookEntryCreated(_)
            | Self::AddressBookEntryUpdated(_)
            | Self::AddressBookEntryDeleted { .. }
            | Self::AddressBookEntryChannelsUpdated { .. }
            | Self::AddressBookEntryAutoDeliveryUpdated { .. } => "address-book",
            Self::IntelCreated(_) | Self::IntelInvalidated { .. } => "intel",
            Self::IntelDeliveryCreated(_)
            | Self::IntelDeliveryStatusUpdated { .. }
            | Self::IntelDeliveryAttemptCreated { .. }
            | Self::IntelDeliveryAttemptStatusUpdated(_) => "intel-delivery",
            Self::InAppNotificationForIntelPending { .. }
            | Self::InAppNotificationForIntelSent { .. } => "in-app-notifications",
            Self::RadioDeliveryReadyForPickup { .. }
            | Self::RadioDeliveryPickedUp { .. }
            | Self::RadioDeliveryReleased { .. }
            | Self::RadioDeliveryFinished(_) => "radio-delivery",
        }
    }

    /// Kebab-case name of the variant, matching the serialized tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::UserCreated(_) => "user-created",
            Self::UserUpdated(_) => "user-updated",
            Self::UserDeleted { .. } => "user-deleted",
            Self::OperationCreated(_) => "operation-created",
            Self::OperationUpdated(_) => "operation-updated",
            Self::OperationMembersUpdated { .. } => "operation-members-updated",
            Self::GroupCreated(_) => "group-created",
            Self::GroupUpdated(_) => "group-updated",
            Self::GroupDeleted { .. } => "group-deleted",
            Self::AddressBookEntryCreated(_) => "address-book-entry-created",
            Self::AddressBookEntryUpdated(_) => "address-book-entry-updated",
            Self::AddressBookEntryDeleted { .. } => "address-book-entry-deleted",
            Self::AddressBookEntryChannelsUpdated { .. } => "address-book-entry-channels-updated",
            Self::AddressBookEntryAutoDeliveryUpdated { .. } => {
                "address-book-entry-auto-delivery-updated"
            }
            Self::IntelCreated(_) => "intel-created",
            Self::IntelInvalidated { .. } => "intel-invalidated",
            Self::IntelDeliveryCreated(_) => "intel-delivery-created",
            Self::IntelDeliveryStatusUpdated { .. } => "intel-delivery-status-updated",
            Self::IntelDeliveryAttemptCreated { .. } => "intel-delivery-attempt-created",
            Self::IntelDeliveryAttemptStatusUpdated(_) => "intel-delivery-attempt-status-updated",
            Self::InAppNotificationForIntelPending { .. } => "in-app-notification-for-intel-pending",
            Self::InAppNotificationForIntelSent { .. } => "in-app-notification-for-intel-sent",
            Self::RadioDeliveryReadyForPickup { .. } => "radio-delivery-ready-for-pickup",
            Self::RadioDeliveryPickedUp { .. } => "radio-delivery-picked-up",
            Self::RadioDeliveryReleased { .. } => "radio-delivery-released",
            Self::RadioDeliveryFinished(_) => "radio-delivery-finished",
        }
    }
}

/// An event as it travels over the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: Uuid,
    /// Name of the producing service.
    pub source: String,
    pub emitted_at: DateTime<Utc>,
    pub event: Event,
}

impl EventEnvelope {
    pub fn new(source: impl Into<String>, event: Event) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            emitted_at: Utc::now(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_matches_serialized_tag() {
        let events = [
            Event::UserDeleted { user: Uuid::nil() },
            Event::AddressBookEntryAutoDeliveryUpdated {
                entry: Uuid::nil(),
                enabled: false,
            },
            Event::InAppNotificationForIntelPending {
                attempt: Uuid::nil(),
            },
            Event::RadioDeliveryReleased {
                attempt: Uuid::nil(),
                at: Utc::now(),
            },
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], event.name());
        }
    }

    #[test]
    fn topics_group_related_events() {
        let released = Event::RadioDeliveryReleased {
            attempt: Uuid::nil(),
            at: Utc::now(),
        };
        assert_eq!(released.topic(), "radio-delivery");
        assert_eq!(
            Event::GroupDeleted { group: Uuid::nil() }.topic(),
            "groups"
        );
    }
}
