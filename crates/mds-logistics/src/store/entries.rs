// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Address-book entries and their auto-delivery flag.

use std::collections::BTreeSet;

use mds_core::{AddressBookEntry, MdsError};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use uuid::Uuid;

use super::{expect_affected, placeholders};

/// Filters for listing entries. Unset fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFilters {
    /// Only entries associated with this user.
    pub by_user: Option<Uuid>,
    /// Excludes entries scoped to another operation.
    pub for_operation: Option<Uuid>,
    /// Excludes entries scoped to no operation.
    pub exclude_global: bool,
    /// Hides user-bound entries whose user shares no operation with this one.
    pub visible_by: Option<Uuid>,
}

const SELECT_ENTRY: &str = "SELECT id, label, description, operation, user FROM address_book_entries";

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<AddressBookEntry> {
    Ok(AddressBookEntry {
        id: row.get(0)?,
        label: row.get(1)?,
        description: row.get(2)?,
        operation: row.get(3)?,
        user: row.get(4)?,
    })
}

/// Insert a new entry. Auto delivery starts enabled.
pub fn create_entry(conn: &Connection, entry: &AddressBookEntry) -> Result<(), MdsError> {
    conn.execute(
        "INSERT INTO address_book_entries (id, label, description, operation, user) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![entry.id, entry.label, entry.description, entry.operation, entry.user],
    )?;
    conn.execute(
        "INSERT INTO auto_delivery_entries (entry) VALUES (?1)",
        params![entry.id],
    )?;
    Ok(())
}

pub fn update_entry(conn: &Connection, entry: &AddressBookEntry) -> Result<(), MdsError> {
    let affected = conn.execute(
        "UPDATE address_book_entries SET label = ?2, description = ?3, operation = ?4, user = ?5 WHERE id = ?1",
        params![entry.id, entry.label, entry.description, entry.operation, entry.user],
    )?;
    expect_affected(affected, "address book entry", entry.id)
}

/// Delete the entry row. Channels must have been removed before.
pub fn delete_entry(conn: &Connection, id: Uuid) -> Result<(), MdsError> {
    let affected = conn.execute("DELETE FROM address_book_entries WHERE id = ?1", params![id])?;
    expect_affected(affected, "address book entry", id)
}

pub fn entry_exists(conn: &Connection, id: Uuid) -> Result<bool, MdsError> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM address_book_entries WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(n > 0)
}

/// Entry by id. With `visible_by`, a user-bound entry whose user shares no
/// operation with the viewer reads as not-found.
pub fn entry_by_id(
    conn: &Connection,
    id: Uuid,
    visible_by: Option<Uuid>,
) -> Result<AddressBookEntry, MdsError> {
    let entry = conn
        .query_row(&format!("{SELECT_ENTRY} WHERE id = ?1"), params![id], row_to_entry)
        .optional()?
        .ok_or_else(|| MdsError::not_found("address book entry not found").with_detail("id", id))?;
    if let (Some(viewer), Some(user)) = (visible_by, entry.user)
        && !is_user_visible_by(conn, user, viewer)?
    {
        return Err(MdsError::not_found("address book entry not visible")
            .with_detail("id", id)
            .with_detail("visible_by", viewer));
    }
    Ok(entry)
}

/// A user is visible by a viewer when both share at least one operation.
pub fn is_user_visible_by(conn: &Connection, user: Uuid, viewer: Uuid) -> Result<bool, MdsError> {
    if user == viewer {
        return Ok(true);
    }
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM operation_members a
         JOIN operation_members b ON a.operation = b.operation
         WHERE a.user = ?1 AND b.user = ?2",
        params![user, viewer],
        |row| row.get(0),
    )?;
    Ok(n > 0)
}

pub fn entries(conn: &Connection, filters: &EntryFilters) -> Result<Vec<AddressBookEntry>, MdsError> {
    let mut sql = format!("{SELECT_ENTRY} WHERE 1 = 1");
    let mut args: Vec<Uuid> = Vec::new();
    if let Some(user) = filters.by_user {
        sql.push_str(" AND user = ?");
        args.push(user);
    }
    if let Some(operation) = filters.for_operation {
        sql.push_str(" AND (operation IS NULL OR operation = ?)");
        args.push(operation);
    }
    if filters.exclude_global {
        sql.push_str(" AND operation IS NOT NULL");
    }
    if let Some(viewer) = filters.visible_by {
        sql.push_str(
            " AND (user IS NULL OR user = ? OR user IN (
                 SELECT m.user FROM operation_members m
                 WHERE m.operation IN (SELECT operation FROM operation_members WHERE user = ?)))",
        );
        args.push(viewer);
        args.push(viewer);
    }
    sql.push_str(" ORDER BY label, id");
    let mut stmt = conn.prepare(&sql)?;
    let entries = stmt
        .query_map(params_from_iter(args.iter()), row_to_entry)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

/// Ids of entries associated with the given user.
pub fn entry_ids_by_user(conn: &Connection, user: Uuid) -> Result<Vec<Uuid>, MdsError> {
    let mut stmt = conn.prepare("SELECT id FROM address_book_entries WHERE user = ?1 ORDER BY id")?;
    let ids = stmt
        .query_map(params![user], |row| row.get(0))?
        .collect::<Result<Vec<Uuid>, _>>()?;
    Ok(ids)
}

pub fn is_auto_delivery_enabled(conn: &Connection, entry: Uuid) -> Result<bool, MdsError> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM auto_delivery_entries WHERE entry = ?1",
        params![entry],
        |row| row.get(0),
    )?;
    Ok(n > 0)
}

pub fn set_auto_delivery_enabled(conn: &Connection, entry: Uuid, enabled: bool) -> Result<(), MdsError> {
    if !entry_exists(conn, entry)? {
        return Err(MdsError::not_found("address book entry not found").with_detail("id", entry));
    }
    if enabled {
        conn.execute(
            "INSERT OR IGNORE INTO auto_delivery_entries (entry) VALUES (?1)",
            params![entry],
        )?;
    } else {
        conn.execute("DELETE FROM auto_delivery_entries WHERE entry = ?1", params![entry])?;
    }
    Ok(())
}

/// Replace the set of entries with auto delivery enabled. Returns the
/// entries that got disabled.
pub fn set_entries_with_auto_delivery_enabled(
    conn: &Connection,
    enabled: &[Uuid],
) -> Result<Vec<Uuid>, MdsError> {
    let wanted: BTreeSet<Uuid> = enabled.iter().copied().collect();
    if !wanted.is_empty() {
        let n: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM address_book_entries WHERE id IN ({})",
                placeholders(wanted.len())
            ),
            params_from_iter(wanted.iter()),
            |row| row.get(0),
        )?;
        if n as usize != wanted.len() {
            return Err(MdsError::not_found("address book entries not found")
                .with_detail("requested", wanted.len())
                .with_detail("found", n));
        }
    }

    let mut stmt = conn.prepare("SELECT entry FROM auto_delivery_entries ORDER BY entry")?;
    let current = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<BTreeSet<Uuid>, _>>()?;
    let disabled: Vec<Uuid> = current.difference(&wanted).copied().collect();

    conn.execute("DELETE FROM auto_delivery_entries", [])?;
    let mut insert = conn.prepare("INSERT INTO auto_delivery_entries (entry) VALUES (?1)")?;
    for entry in &wanted {
        insert.execute(params![entry])?;
    }
    Ok(disabled)
}
