// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbox-backed event emission for the radio-delivery service.

use chrono::{DateTime, Utc};
use mds_core::{AcceptedIntelDeliveryAttempt, Event, MdsError, RadioDelivery};
use mds_storage::outbox;
use rusqlite::Connection;
use uuid::Uuid;

/// Source name stamped on every radio-delivery event.
pub const SOURCE: &str = "radio-delivery";

fn emit(conn: &Connection, event: Event) -> Result<(), MdsError> {
    outbox::append(conn, SOURCE, event).map(|_| ())
}

pub fn radio_delivery_ready_for_pickup(
    conn: &Connection,
    attempt: &AcceptedIntelDeliveryAttempt,
    note: &str,
) -> Result<(), MdsError> {
    emit(
        conn,
        Event::RadioDeliveryReadyForPickup {
            attempt: attempt.clone(),
            note: note.to_string(),
        },
    )
}

pub fn radio_delivery_picked_up(conn: &Connection, attempt: Uuid, by: Uuid, at: DateTime<Utc>) -> Result<(), MdsError> {
    emit(conn, Event::RadioDeliveryPickedUp { attempt, by, at })
}

pub fn radio_delivery_released(conn: &Connection, attempt: Uuid, at: DateTime<Utc>) -> Result<(), MdsError> {
    emit(conn, Event::RadioDeliveryReleased { attempt, at })
}

pub fn radio_delivery_finished(conn: &Connection, delivery: &RadioDelivery) -> Result<(), MdsError> {
    emit(conn, Event::RadioDeliveryFinished(delivery.clone()))
}
