// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operation and operation-member mirror.

use mds_core::{MdsError, Operation};
use rusqlite::{Connection, params};
use uuid::Uuid;

use super::expect_affected;

pub fn create_operation(conn: &Connection, op: &Operation) -> Result<(), MdsError> {
    conn.execute(
        "INSERT INTO operations (id, title, description, start_ts, end_ts, is_archived)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![op.id, op.title, op.description, op.start, op.end, op.is_archived],
    )?;
    Ok(())
}

pub fn update_operation(conn: &Connection, op: &Operation) -> Result<(), MdsError> {
    let affected = conn.execute(
        "UPDATE operations SET title = ?2, description = ?3, start_ts = ?4, end_ts = ?5, is_archived = ?6
         WHERE id = ?1",
        params![op.id, op.title, op.description, op.start, op.end, op.is_archived],
    )?;
    expect_affected(affected, "operation", op.id)
}

pub fn is_operation_member(conn: &Connection, operation: Uuid, user: Uuid) -> Result<bool, MdsError> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM operation_members WHERE operation = ?1 AND user = ?2",
        params![operation, user],
        |row| row.get(0),
    )?;
    Ok(n > 0)
}

pub fn operation_members(conn: &Connection, operation: Uuid) -> Result<Vec<Uuid>, MdsError> {
    let mut stmt = conn.prepare("SELECT user FROM operation_members WHERE operation = ?1 ORDER BY user")?;
    let members = stmt
        .query_map(params![operation], |row| row.get(0))?
        .collect::<Result<Vec<Uuid>, _>>()?;
    Ok(members)
}

/// Replace the member set of an operation. Returns the previous members.
pub fn update_operation_members(
    conn: &Connection,
    operation: Uuid,
    members: &[Uuid],
) -> Result<Vec<Uuid>, MdsError> {
    let previous = operation_members(conn, operation)?;
    conn.execute("DELETE FROM operation_members WHERE operation = ?1", params![operation])?;
    let mut stmt =
        conn.prepare("INSERT OR IGNORE INTO operation_members (operation, user) VALUES (?1, ?2)")?;
    for user in members {
        stmt.execute(params![operation, user])?;
    }
    Ok(previous)
}
