// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operation-member mirror.

use mds_core::MdsError;
use rusqlite::{Connection, params};
use uuid::Uuid;

/// Replace the member set of an operation.
pub fn update_operation_members(conn: &Connection, operation: Uuid, members: &[Uuid]) -> Result<(), MdsError> {
    conn.execute("DELETE FROM operation_members WHERE operation = ?1", params![operation])?;
    let mut stmt =
        conn.prepare("INSERT OR IGNORE INTO operation_members (operation, user) VALUES (?1, ?2)")?;
    for user in members {
        stmt.execute(params![operation, user])?;
    }
    Ok(())
}

/// Operations the user is a member of.
pub fn operations_by_member(conn: &Connection, user: Uuid) -> Result<Vec<Uuid>, MdsError> {
    let mut stmt = conn.prepare("SELECT operation FROM operation_members WHERE user = ?1 ORDER BY operation")?;
    let operations = stmt
        .query_map(params![user], |row| row.get(0))?
        .collect::<Result<Vec<Uuid>, _>>()?;
    Ok(operations)
}

pub fn is_operation_member(conn: &Connection, operation: Uuid, user: Uuid) -> Result<bool, MdsError> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM operation_members WHERE operation = ?1 AND user = ?2",
        params![operation, user],
        |row| row.get(0),
    )?;
    Ok(n > 0)
}
