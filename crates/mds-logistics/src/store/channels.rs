// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channels of address-book entries.

use std::str::FromStr;

use mds_core::{Channel, ChannelType, MdsError};
use mds_intel::ValidationReport;
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use super::channel_details::{self, operator};
use super::{duration_to_ms, expect_affected, ms_to_duration};

/// Channel row without details.
struct ChannelRow {
    id: Uuid,
    entry: Uuid,
    label: String,
    channel_type: String,
    priority: i32,
    min_importance: i32,
    timeout_ms: i64,
    is_active: bool,
}

const SELECT_CHANNEL: &str =
    "SELECT id, entry, label, type, priority, min_importance, timeout_ms, is_active FROM channels";

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChannelRow> {
    Ok(ChannelRow {
        id: row.get(0)?,
        entry: row.get(1)?,
        label: row.get(2)?,
        channel_type: row.get(3)?,
        priority: row.get(4)?,
        min_importance: row.get(5)?,
        timeout_ms: row.get(6)?,
        is_active: row.get(7)?,
    })
}

fn with_details(conn: &Connection, row: ChannelRow) -> Result<Channel, MdsError> {
    let channel_type = ChannelType::from_str(&row.channel_type).map_err(|_| {
        MdsError::internal("unknown channel type")
            .with_detail("channel", row.id)
            .with_detail("type", &row.channel_type)
    })?;
    let details = operator(channel_type).load(conn, row.id)?;
    Ok(Channel {
        id: row.id,
        entry: row.entry,
        label: row.label,
        priority: row.priority,
        min_importance: row.min_importance,
        timeout: ms_to_duration(row.timeout_ms),
        is_active: row.is_active,
        details,
    })
}

fn query_channels(conn: &Connection, sql: &str, args: impl rusqlite::Params) -> Result<Vec<Channel>, MdsError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(args, read_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(|row| with_details(conn, row)).collect()
}

/// Check a channel before it is stored.
pub fn validate_channel(channel: &Channel) -> ValidationReport {
    let mut report = channel_details::validate(&channel.details);
    if channel.timeout.is_zero() {
        report.add_error("timeout must be greater zero");
    }
    report
}

pub fn channel_by_id(conn: &Connection, id: Uuid) -> Result<Channel, MdsError> {
    let row = conn
        .query_row(&format!("{SELECT_CHANNEL} WHERE id = ?1"), params![id], read_row)
        .optional()?
        .ok_or_else(|| MdsError::not_found("channel not found").with_detail("id", id))?;
    with_details(conn, row)
}

/// Channels of an entry, highest priority first.
pub fn channels_by_entry(conn: &Connection, entry: Uuid) -> Result<Vec<Channel>, MdsError> {
    query_channels(
        conn,
        &format!("{SELECT_CHANNEL} WHERE entry = ?1 ORDER BY priority DESC, id ASC"),
        params![entry],
    )
}

pub fn create_channel(conn: &Connection, channel: &Channel) -> Result<(), MdsError> {
    conn.execute(
        "INSERT INTO channels (id, entry, label, type, priority, min_importance, timeout_ms, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            channel.id,
            channel.entry,
            channel.label,
            channel.channel_type(),
            channel.priority,
            channel.min_importance,
            duration_to_ms(channel.timeout),
            channel.is_active
        ],
    )?;
    operator(channel.channel_type()).store(conn, channel.id, &channel.details)
}

/// Update a channel in place. A type change moves the details to the new
/// type's table.
pub fn update_channel(conn: &Connection, channel: &Channel) -> Result<(), MdsError> {
    let previous = channel_by_id(conn, channel.id)?;
    let affected = conn.execute(
        "UPDATE channels SET entry = ?2, label = ?3, type = ?4, priority = ?5, min_importance = ?6,
             timeout_ms = ?7, is_active = ?8
         WHERE id = ?1",
        params![
            channel.id,
            channel.entry,
            channel.label,
            channel.channel_type(),
            channel.priority,
            channel.min_importance,
            duration_to_ms(channel.timeout),
            channel.is_active
        ],
    )?;
    expect_affected(affected, "channel", channel.id)?;
    if previous.channel_type() != channel.channel_type() {
        operator(previous.channel_type()).delete(conn, channel.id)?;
    }
    operator(channel.channel_type()).store(conn, channel.id, &channel.details)
}

pub fn delete_channel(conn: &Connection, id: Uuid) -> Result<(), MdsError> {
    let channel = channel_by_id(conn, id)?;
    operator(channel.channel_type()).delete(conn, id)?;
    let affected = conn.execute("DELETE FROM channels WHERE id = ?1", params![id])?;
    expect_affected(affected, "channel", id)
}

/// The channel to use for the next attempt of a delivery: active, not yet
/// attempted for this delivery, `min_importance <= importance`, highest
/// priority first with ties broken by channel id.
pub fn next_channel_for_delivery(
    conn: &Connection,
    delivery: Uuid,
    entry: Uuid,
    importance: i32,
) -> Result<Option<Channel>, MdsError> {
    let mut found = query_channels(
        conn,
        &format!(
            "{SELECT_CHANNEL}
             WHERE entry = ?1 AND is_active = 1 AND min_importance <= ?2
               AND id NOT IN (SELECT channel FROM intel_delivery_attempts WHERE delivery = ?3)
             ORDER BY priority DESC, id ASC
             LIMIT 1"
        ),
        params![entry, importance, delivery],
    )?;
    Ok(found.pop())
}

/// Forward-to-user channels that reference the given user.
pub fn forward_to_user_channels_by_user(conn: &Connection, user: Uuid) -> Result<Vec<Channel>, MdsError> {
    query_channels(
        conn,
        &format!(
            "{SELECT_CHANNEL} WHERE id IN (SELECT channel FROM forward_to_user_channels WHERE user = ?1)
             ORDER BY entry, id"
        ),
        params![user],
    )
}

/// Forward-to-group channels that reference the given group.
pub fn forward_to_group_channels_by_group(conn: &Connection, group: Uuid) -> Result<Vec<Channel>, MdsError> {
    query_channels(
        conn,
        &format!(
            "{SELECT_CHANNEL} WHERE id IN (SELECT channel FROM forward_to_group_channels WHERE group_id = ?1)
             ORDER BY entry, id"
        ),
        params![group],
    )
}
