// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Intel deliveries and their attempts.

use std::time::Duration;

use chrono::{DateTime, Utc};
use mds_core::{IntelDelivery, IntelDeliveryAttempt, IntelDeliveryStatus, MdsError};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use uuid::Uuid;

use super::{expect_affected, ms_to_duration, placeholders};

const SELECT_DELIVERY: &str = "SELECT id, intel, to_entry, is_active, success, note FROM intel_deliveries";

const SELECT_ATTEMPT: &str =
    "SELECT id, delivery, channel, created_at, is_active, status, status_ts, note FROM intel_delivery_attempts";

fn row_to_delivery(row: &Row<'_>) -> rusqlite::Result<IntelDelivery> {
    Ok(IntelDelivery {
        id: row.get(0)?,
        intel: row.get(1)?,
        to: row.get(2)?,
        is_active: row.get(3)?,
        success: row.get(4)?,
        note: row.get(5)?,
    })
}

fn row_to_attempt(row: &Row<'_>) -> rusqlite::Result<IntelDeliveryAttempt> {
    Ok(IntelDeliveryAttempt {
        id: row.get(0)?,
        delivery: row.get(1)?,
        channel: row.get(2)?,
        created_at: row.get(3)?,
        is_active: row.get(4)?,
        status: row.get(5)?,
        status_ts: row.get(6)?,
        note: row.get(7)?,
    })
}

fn query_attempts(
    conn: &Connection,
    sql: &str,
    args: impl rusqlite::Params,
) -> Result<Vec<IntelDeliveryAttempt>, MdsError> {
    let mut stmt = conn.prepare(sql)?;
    let attempts = stmt
        .query_map(args, row_to_attempt)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(attempts)
}

/// Create an active, not yet successful delivery.
pub fn create_delivery(conn: &Connection, intel: Uuid, to: Uuid) -> Result<IntelDelivery, MdsError> {
    let delivery = IntelDelivery {
        id: Uuid::new_v4(),
        intel,
        to,
        is_active: true,
        success: false,
        note: None,
    };
    conn.execute(
        "INSERT INTO intel_deliveries (id, intel, to_entry, is_active, success, note) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            delivery.id,
            delivery.intel,
            delivery.to,
            delivery.is_active,
            delivery.success,
            delivery.note
        ],
    )?;
    Ok(delivery)
}

pub fn delivery_by_id(conn: &Connection, id: Uuid) -> Result<IntelDelivery, MdsError> {
    conn.query_row(&format!("{SELECT_DELIVERY} WHERE id = ?1"), params![id], row_to_delivery)
        .optional()?
        .ok_or_else(|| MdsError::not_found("intel delivery not found").with_detail("id", id))
}

pub fn active_deliveries(conn: &Connection) -> Result<Vec<IntelDelivery>, MdsError> {
    let mut stmt = conn.prepare(&format!("{SELECT_DELIVERY} WHERE is_active = 1 ORDER BY id"))?;
    let deliveries = stmt
        .query_map([], row_to_delivery)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(deliveries)
}

pub fn deliveries_by_intel(conn: &Connection, intel: Uuid) -> Result<Vec<IntelDelivery>, MdsError> {
    let mut stmt = conn.prepare(&format!("{SELECT_DELIVERY} WHERE intel = ?1 ORDER BY id"))?;
    let deliveries = stmt
        .query_map(params![intel], row_to_delivery)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(deliveries)
}

pub fn update_delivery_status(
    conn: &Connection,
    id: Uuid,
    is_active: bool,
    success: bool,
    note: Option<&str>,
) -> Result<(), MdsError> {
    let affected = conn.execute(
        "UPDATE intel_deliveries SET is_active = ?2, success = ?3, note = ?4 WHERE id = ?1",
        params![id, is_active, success, note],
    )?;
    expect_affected(affected, "intel delivery", id)
}

/// Create an open, active attempt.
pub fn create_attempt(
    conn: &Connection,
    delivery: Uuid,
    channel: Uuid,
    now: DateTime<Utc>,
) -> Result<IntelDeliveryAttempt, MdsError> {
    let attempt = IntelDeliveryAttempt {
        id: Uuid::new_v4(),
        delivery,
        channel,
        created_at: now,
        is_active: true,
        status: IntelDeliveryStatus::Open,
        status_ts: now,
        note: None,
    };
    conn.execute(
        "INSERT INTO intel_delivery_attempts (id, delivery, channel, created_at, is_active, status, status_ts, note)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            attempt.id,
            attempt.delivery,
            attempt.channel,
            attempt.created_at,
            attempt.is_active,
            attempt.status,
            attempt.status_ts,
            attempt.note
        ],
    )?;
    Ok(attempt)
}

pub fn attempt_by_id(conn: &Connection, id: Uuid) -> Result<IntelDeliveryAttempt, MdsError> {
    conn.query_row(&format!("{SELECT_ATTEMPT} WHERE id = ?1"), params![id], row_to_attempt)
        .optional()?
        .ok_or_else(|| MdsError::not_found("intel delivery attempt not found").with_detail("id", id))
}

/// All attempts of a delivery, oldest first.
pub fn attempts_by_delivery(conn: &Connection, delivery: Uuid) -> Result<Vec<IntelDeliveryAttempt>, MdsError> {
    query_attempts(
        conn,
        &format!("{SELECT_ATTEMPT} WHERE delivery = ?1 ORDER BY created_at, id"),
        params![delivery],
    )
}

/// Only the active attempts of a delivery.
pub fn active_attempts_by_delivery(
    conn: &Connection,
    delivery: Uuid,
) -> Result<Vec<IntelDeliveryAttempt>, MdsError> {
    query_attempts(
        conn,
        &format!("{SELECT_ATTEMPT} WHERE delivery = ?1 AND is_active = 1 ORDER BY created_at, id"),
        params![delivery],
    )
}

/// Active attempts using any of the given channels. An empty channel list
/// selects nothing.
pub fn active_attempts_by_channels(
    conn: &Connection,
    channels: &[Uuid],
) -> Result<Vec<IntelDeliveryAttempt>, MdsError> {
    if channels.is_empty() {
        return Ok(Vec::new());
    }
    query_attempts(
        conn,
        &format!(
            "{SELECT_ATTEMPT} WHERE is_active = 1 AND channel IN ({}) ORDER BY created_at, id",
            placeholders(channels.len())
        ),
        params_from_iter(channels.iter()),
    )
}

/// Attempts of a delivery whose channel timeout has elapsed at `now`, paired
/// with that timeout. Attempts whose channel is gone are never timed out
/// here.
pub fn timed_out_attempts_by_delivery(
    conn: &Connection,
    delivery: Uuid,
    now: DateTime<Utc>,
) -> Result<Vec<(IntelDeliveryAttempt, Duration)>, MdsError> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.delivery, a.channel, a.created_at, a.is_active, a.status, a.status_ts, a.note, c.timeout_ms
         FROM intel_delivery_attempts a
         JOIN channels c ON c.id = a.channel
         WHERE a.delivery = ?1
         ORDER BY a.created_at, a.id",
    )?;
    let rows = stmt
        .query_map(params![delivery], |row| {
            Ok((row_to_attempt(row)?, ms_to_duration(row.get(8)?)))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows
        .into_iter()
        .filter(|(attempt, timeout)| is_timed_out(attempt.created_at, *timeout, now))
        .collect())
}

/// Whether an attempt created at `created_at` has exceeded `timeout` at `now`.
pub fn is_timed_out(created_at: DateTime<Utc>, timeout: Duration, now: DateTime<Utc>) -> bool {
    match chrono::Duration::from_std(timeout) {
        Ok(timeout) => now - created_at > timeout,
        Err(_) => false,
    }
}

pub fn update_attempt_status(
    conn: &Connection,
    id: Uuid,
    is_active: bool,
    status: IntelDeliveryStatus,
    note: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), MdsError> {
    let affected = conn.execute(
        "UPDATE intel_delivery_attempts SET is_active = ?2, status = ?3, note = ?4, status_ts = ?5 WHERE id = ?1",
        params![id, is_active, status, note, now],
    )?;
    expect_affected(affected, "intel delivery attempt", id)
}

pub fn delete_attempts_by_channel(conn: &Connection, channel: Uuid) -> Result<usize, MdsError> {
    Ok(conn.execute(
        "DELETE FROM intel_delivery_attempts WHERE channel = ?1",
        params![channel],
    )?)
}
