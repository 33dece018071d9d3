// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User mirror.

use mds_core::{MdsError, User};
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use super::expect_affected;

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        is_active: row.get(4)?,
    })
}

pub fn create_user(conn: &Connection, user: &User) -> Result<(), MdsError> {
    conn.execute(
        "INSERT INTO users (id, username, first_name, last_name, is_active) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user.id, user.username, user.first_name, user.last_name, user.is_active],
    )?;
    Ok(())
}

pub fn update_user(conn: &Connection, user: &User) -> Result<(), MdsError> {
    let affected = conn.execute(
        "UPDATE users SET username = ?2, first_name = ?3, last_name = ?4, is_active = ?5 WHERE id = ?1",
        params![user.id, user.username, user.first_name, user.last_name, user.is_active],
    )?;
    expect_affected(affected, "user", user.id)
}

pub fn user_by_id(conn: &Connection, id: Uuid) -> Result<User, MdsError> {
    conn.query_row(
        "SELECT id, username, first_name, last_name, is_active FROM users WHERE id = ?1",
        params![id],
        row_to_user,
    )
    .optional()?
    .ok_or_else(|| MdsError::not_found("user not found").with_detail("id", id))
}

/// Delete the user together with its memberships.
pub fn delete_user(conn: &Connection, id: Uuid) -> Result<(), MdsError> {
    conn.execute("DELETE FROM operation_members WHERE user = ?1", params![id])?;
    conn.execute("DELETE FROM user_group_members WHERE user = ?1", params![id])?;
    let affected = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    expect_affected(affected, "user", id)
}
