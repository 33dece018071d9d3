// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mirror of radio channels.

use mds_core::{MdsError, RadioChannel};
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use super::{duration_to_ms, ms_to_duration};

fn row_to_channel(row: &Row<'_>) -> rusqlite::Result<RadioChannel> {
    Ok(RadioChannel {
        id: row.get(0)?,
        entry: row.get(1)?,
        label: row.get(2)?,
        timeout: ms_to_duration(row.get(3)?),
        info: row.get(4)?,
    })
}

pub fn create_radio_channel(conn: &Connection, channel: &RadioChannel) -> Result<(), MdsError> {
    conn.execute(
        "INSERT INTO radio_channels (id, entry, label, timeout_ms, info) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            channel.id,
            channel.entry,
            channel.label,
            duration_to_ms(channel.timeout),
            channel.info
        ],
    )?;
    Ok(())
}

/// Returns the number of deleted channels.
pub fn delete_radio_channels_by_entry(conn: &Connection, entry: Uuid) -> Result<usize, MdsError> {
    Ok(conn.execute("DELETE FROM radio_channels WHERE entry = ?1", params![entry])?)
}

pub fn radio_channel_by_id(conn: &Connection, id: Uuid) -> Result<RadioChannel, MdsError> {
    conn.query_row(
        "SELECT id, entry, label, timeout_ms, info FROM radio_channels WHERE id = ?1",
        params![id],
        row_to_channel,
    )
    .optional()?
    .ok_or_else(|| MdsError::not_found("radio channel not found").with_detail("id", id))
}

pub fn radio_channels_by_entry(conn: &Connection, entry: Uuid) -> Result<Vec<RadioChannel>, MdsError> {
    let mut stmt = conn.prepare(
        "SELECT id, entry, label, timeout_ms, info FROM radio_channels WHERE entry = ?1 ORDER BY label, id",
    )?;
    let channels = stmt
        .query_map(params![entry], row_to_channel)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(channels)
}
