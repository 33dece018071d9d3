// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Group mirror. Members keep their insertion order.

use mds_core::{Group, MdsError};
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use super::expect_affected;

fn set_members(conn: &Connection, group: Uuid, members: &[Uuid]) -> Result<(), MdsError> {
    conn.execute("DELETE FROM user_group_members WHERE group_id = ?1", params![group])?;
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO user_group_members (group_id, user, position) VALUES (?1, ?2, ?3)",
    )?;
    for (position, user) in members.iter().enumerate() {
        stmt.execute(params![group, user, position as i64])?;
    }
    Ok(())
}

pub fn create_group(conn: &Connection, group: &Group) -> Result<(), MdsError> {
    conn.execute(
        "INSERT INTO user_groups (id, title, description, operation) VALUES (?1, ?2, ?3, ?4)",
        params![group.id, group.title, group.description, group.operation],
    )?;
    set_members(conn, group.id, &group.members)
}

pub fn update_group(conn: &Connection, group: &Group) -> Result<(), MdsError> {
    let affected = conn.execute(
        "UPDATE user_groups SET title = ?2, description = ?3, operation = ?4 WHERE id = ?1",
        params![group.id, group.title, group.description, group.operation],
    )?;
    expect_affected(affected, "group", group.id)?;
    set_members(conn, group.id, &group.members)
}

pub fn group_by_id(conn: &Connection, id: Uuid) -> Result<Group, MdsError> {
    let mut group = conn
        .query_row(
            "SELECT id, title, description, operation FROM user_groups WHERE id = ?1",
            params![id],
            |row| {
                Ok(Group {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    description: row.get(2)?,
                    operation: row.get(3)?,
                    members: Vec::new(),
                })
            },
        )
        .optional()?
        .ok_or_else(|| MdsError::not_found("group not found").with_detail("id", id))?;
    let mut stmt =
        conn.prepare("SELECT user FROM user_group_members WHERE group_id = ?1 ORDER BY position")?;
    group.members = stmt
        .query_map(params![id], |row| row.get(0))?
        .collect::<Result<Vec<Uuid>, _>>()?;
    Ok(group)
}

pub fn delete_group(conn: &Connection, id: Uuid) -> Result<(), MdsError> {
    let affected = conn.execute("DELETE FROM user_groups WHERE id = ?1", params![id])?;
    expect_affected(affected, "group", id)
}
