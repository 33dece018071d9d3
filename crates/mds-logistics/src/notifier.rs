// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbox-backed event emission for the logistics service.
//!
//! Every function appends to the outbox of the open transaction; nothing is
//! published before commit.

use mds_core::{
    AddressBookEntry, Channel, Event, Intel, IntelDelivery, IntelDeliveryAttempt, MdsError,
};
use mds_storage::outbox;
use rusqlite::Connection;
use uuid::Uuid;

/// Source name stamped on every logistics event.
pub const SOURCE: &str = "logistics";

fn emit(conn: &Connection, event: Event) -> Result<(), MdsError> {
    outbox::append(conn, SOURCE, event).map(|_| ())
}

pub fn address_book_entry_created(conn: &Connection, entry: &AddressBookEntry) -> Result<(), MdsError> {
    emit(conn, Event::AddressBookEntryCreated(entry.clone()))
}

pub fn address_book_entry_updated(conn: &Connection, entry: &AddressBookEntry) -> Result<(), MdsError> {
    emit(conn, Event::AddressBookEntryUpdated(entry.clone()))
}

pub fn address_book_entry_deleted(conn: &Connection, entry: Uuid) -> Result<(), MdsError> {
    emit(conn, Event::AddressBookEntryDeleted { entry })
}

pub fn address_book_entry_channels_updated(
    conn: &Connection,
    entry: Uuid,
    channels: Vec<Channel>,
) -> Result<(), MdsError> {
    emit(conn, Event::AddressBookEntryChannelsUpdated { entry, channels })
}

pub fn address_book_entry_auto_delivery_updated(
    conn: &Connection,
    entry: Uuid,
    enabled: bool,
) -> Result<(), MdsError> {
    emit(conn, Event::AddressBookEntryAutoDeliveryUpdated { entry, enabled })
}

pub fn intel_created(conn: &Connection, intel: &Intel) -> Result<(), MdsError> {
    emit(conn, Event::IntelCreated(intel.clone()))
}

pub fn intel_invalidated(conn: &Connection, intel: Uuid, by: Uuid) -> Result<(), MdsError> {
    emit(conn, Event::IntelInvalidated { intel, by })
}

pub fn intel_delivery_created(conn: &Connection, delivery: &IntelDelivery) -> Result<(), MdsError> {
    emit(conn, Event::IntelDeliveryCreated(delivery.clone()))
}

pub fn intel_delivery_status_updated(
    conn: &Connection,
    delivery: Uuid,
    is_active: bool,
    success: bool,
    note: Option<String>,
) -> Result<(), MdsError> {
    emit(
        conn,
        Event::IntelDeliveryStatusUpdated {
            delivery,
            is_active,
            success,
            note,
        },
    )
}

pub fn intel_delivery_attempt_created(
    conn: &Connection,
    attempt: &IntelDeliveryAttempt,
    delivery: &IntelDelivery,
    assigned_entry: &AddressBookEntry,
    intel: &Intel,
) -> Result<(), MdsError> {
    emit(
        conn,
        Event::IntelDeliveryAttemptCreated {
            attempt: attempt.clone(),
            delivery: delivery.clone(),
            assigned_entry: assigned_entry.clone(),
            intel: intel.clone(),
        },
    )
}

pub fn intel_delivery_attempt_status_updated(
    conn: &Connection,
    attempt: &IntelDeliveryAttempt,
) -> Result<(), MdsError> {
    emit(conn, Event::IntelDeliveryAttemptStatusUpdated(attempt.clone()))
}
