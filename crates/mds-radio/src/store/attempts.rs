// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Intel-delivery attempts accepted for radio handling.

use chrono::{DateTime, Utc};
use mds_core::{AcceptedIntelDeliveryAttempt, IntelDeliveryStatus, MdsError};
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use super::expect_affected;

const COLUMNS: &str = "id, intel, intel_operation, intel_importance, assigned_to, assigned_to_label, \
     assigned_to_user, delivery, channel, created_at, is_active, status, status_ts, note, accepted_at";

fn row_to_attempt(row: &Row<'_>) -> rusqlite::Result<AcceptedIntelDeliveryAttempt> {
    Ok(AcceptedIntelDeliveryAttempt {
        id: row.get(0)?,
        intel: row.get(1)?,
        intel_operation: row.get(2)?,
        intel_importance: row.get(3)?,
        assigned_to: row.get(4)?,
        assigned_to_label: row.get(5)?,
        assigned_to_user: row.get(6)?,
        delivery: row.get(7)?,
        channel: row.get(8)?,
        created_at: row.get(9)?,
        is_active: row.get(10)?,
        status: row.get(11)?,
        status_ts: row.get(12)?,
        note: row.get(13)?,
        accepted_at: row.get(14)?,
    })
}

pub fn create_accepted_attempt(conn: &Connection, attempt: &AcceptedIntelDeliveryAttempt) -> Result<(), MdsError> {
    conn.execute(
        &format!(
            "INSERT INTO accepted_intel_delivery_attempts ({COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
        ),
        params![
            attempt.id,
            attempt.intel,
            attempt.intel_operation,
            attempt.intel_importance,
            attempt.assigned_to,
            attempt.assigned_to_label,
            attempt.assigned_to_user,
            attempt.delivery,
            attempt.channel,
            attempt.created_at,
            attempt.is_active,
            attempt.status,
            attempt.status_ts,
            attempt.note,
            attempt.accepted_at,
        ],
    )?;
    Ok(())
}

pub fn accepted_attempt_by_id(conn: &Connection, id: Uuid) -> Result<AcceptedIntelDeliveryAttempt, MdsError> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM accepted_intel_delivery_attempts WHERE id = ?1"),
        params![id],
        row_to_attempt,
    )
    .optional()?
    .ok_or_else(|| MdsError::not_found("accepted intel delivery attempt not found").with_detail("id", id))
}

/// Mirror a status change reported by logistics.
pub fn update_accepted_attempt_status(
    conn: &Connection,
    id: Uuid,
    is_active: bool,
    status: IntelDeliveryStatus,
    status_ts: DateTime<Utc>,
    note: Option<&str>,
) -> Result<(), MdsError> {
    let affected = conn.execute(
        "UPDATE accepted_intel_delivery_attempts SET is_active = ?2, status = ?3, status_ts = ?4, note = ?5
         WHERE id = ?1",
        params![id, is_active, status, status_ts, note],
    )?;
    expect_affected(affected, "accepted intel delivery attempt", id)
}
