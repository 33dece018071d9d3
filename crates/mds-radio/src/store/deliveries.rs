// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Radio deliveries, the handling record of each accepted attempt.

use chrono::{DateTime, Utc};
use mds_core::{MdsError, RadioDelivery};
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use super::expect_affected;

/// Note of a radio delivery nobody picked up yet.
pub const NOTE_WAITING_FOR_PICKUP: &str = "waiting for pickup";

/// Projection of an active radio delivery used for pickup ranking and the
/// pickup-timeout sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRadioDelivery {
    pub attempt: Uuid,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub intel_operation: Uuid,
    pub intel_importance: i32,
    pub attempt_created_at: DateTime<Utc>,
}

fn row_to_delivery(row: &Row<'_>) -> rusqlite::Result<RadioDelivery> {
    Ok(RadioDelivery {
        attempt: row.get(0)?,
        picked_up_by: row.get(1)?,
        picked_up_at: row.get(2)?,
        success: row.get(3)?,
        success_ts: row.get(4)?,
        note: row.get(5)?,
    })
}

/// Create the open radio delivery of an accepted attempt.
pub fn create_radio_delivery(conn: &Connection, attempt: Uuid) -> Result<(), MdsError> {
    conn.execute(
        "INSERT INTO radio_deliveries (attempt, note) VALUES (?1, ?2)",
        params![attempt, NOTE_WAITING_FOR_PICKUP],
    )?;
    Ok(())
}

pub fn radio_delivery_by_attempt(conn: &Connection, attempt: Uuid) -> Result<RadioDelivery, MdsError> {
    conn.query_row(
        "SELECT attempt, picked_up_by, picked_up_at, success, success_ts, note
         FROM radio_deliveries WHERE attempt = ?1",
        params![attempt],
        row_to_delivery,
    )
    .optional()?
    .ok_or_else(|| MdsError::not_found("radio delivery not found").with_detail("attempt_id", attempt))
}

/// Set or clear the pickup of a radio delivery. `None` releases it.
pub fn set_pickup(
    conn: &Connection,
    attempt: Uuid,
    pickup: Option<(Uuid, DateTime<Utc>)>,
    note: &str,
) -> Result<(), MdsError> {
    let (by, at) = pickup.unzip();
    let affected = conn.execute(
        "UPDATE radio_deliveries SET picked_up_by = ?2, picked_up_at = ?3, note = ?4 WHERE attempt = ?1",
        params![attempt, by, at, note],
    )?;
    expect_affected(affected, "radio delivery", attempt)
}

/// Conclude a radio delivery. The note replaces the previous one.
pub fn finish(
    conn: &Connection,
    attempt: Uuid,
    success: bool,
    note: &str,
    now: DateTime<Utc>,
) -> Result<(), MdsError> {
    let affected = conn.execute(
        "UPDATE radio_deliveries SET success = ?2, success_ts = ?3, note = ?4 WHERE attempt = ?1",
        params![attempt, success, now, note],
    )?;
    expect_affected(affected, "radio delivery", attempt)
}

/// Radio deliveries without a result, optionally limited to one
/// operation. The enclosing immediate transaction holds the write lock, so
/// the returned rows cannot change until it ends.
pub fn active_radio_deliveries(
    conn: &Connection,
    operation: Option<Uuid>,
) -> Result<Vec<ActiveRadioDelivery>, MdsError> {
    let mut stmt = conn.prepare(
        "SELECT d.attempt, d.picked_up_at, a.intel_operation, a.intel_importance, a.created_at
         FROM radio_deliveries d
         JOIN accepted_intel_delivery_attempts a ON a.id = d.attempt
         WHERE d.success IS NULL AND (?1 IS NULL OR a.intel_operation = ?1)
         ORDER BY a.created_at, d.attempt",
    )?;
    let rows = stmt
        .query_map(params![operation], |row| {
            Ok(ActiveRadioDelivery {
                attempt: row.get(0)?,
                picked_up_at: row.get(1)?,
                intel_operation: row.get(2)?,
                intel_importance: row.get(3)?,
                attempt_created_at: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::attempts::create_accepted_attempt;
    use crate::store::testing::{accepted, open_db};

    #[tokio::test]
    async fn pickup_fields_move_together() {
        let (db, _dir) = open_db().await;
        let attempt = accepted(Uuid::new_v4(), Uuid::new_v4(), 10, Utc::now());
        let id = attempt.id;
        let user = Uuid::new_v4();
        let now = Utc::now();
        let (picked, released) = db
            .transaction(move |tx| {
                create_accepted_attempt(tx, &attempt)?;
                create_radio_delivery(tx, id)?;
                set_pickup(tx, id, Some((user, now)), "picked up")?;
                let picked = radio_delivery_by_attempt(tx, id)?;
                set_pickup(tx, id, None, "released")?;
                Ok((picked, radio_delivery_by_attempt(tx, id)?))
            })
            .await
            .unwrap();
        assert_eq!(picked.picked_up_by, Some(user));
        assert_eq!(picked.picked_up_at, Some(now));
        assert_eq!(released.picked_up_by, None);
        assert_eq!(released.picked_up_at, None);
        assert_eq!(released.note, "released");
        assert!(released.is_active());
    }

    #[tokio::test]
    async fn active_deliveries_filter_by_operation_and_result() {
        let (db, _dir) = open_db().await;
        let op = Uuid::new_v4();
        let t0 = Utc::now();
        let mine = accepted(op, Uuid::new_v4(), 10, t0);
        let finished = accepted(op, Uuid::new_v4(), 10, t0);
        let foreign = accepted(Uuid::new_v4(), Uuid::new_v4(), 10, t0);
        let (mine_id, finished_id) = (mine.id, finished.id);
        let (scoped, all) = db
            .transaction(move |tx| {
                for attempt in [&mine, &finished, &foreign] {
                    create_accepted_attempt(tx, attempt)?;
                    create_radio_delivery(tx, attempt.id)?;
                }
                finish(tx, finished_id, true, "done", t0)?;
                Ok((active_radio_deliveries(tx, Some(op))?, active_radio_deliveries(tx, None)?))
            })
            .await
            .unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].attempt, mine_id);
        assert_eq!(scoped[0].intel_operation, op);
        assert_eq!(all.len(), 2);
    }
}
