// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Intel and assignments.

use chrono::{DateTime, Utc};
use mds_core::{CreateIntel, Intel, IntelAssignment, IntelType, MdsError};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use uuid::Uuid;

use super::{expect_affected, placeholders};

/// Filters for listing intel. Unset fields do not filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntelFilters {
    pub created_by: Option<Uuid>,
    pub operation: Option<Uuid>,
    pub intel_type: Option<IntelType>,
    pub min_importance: Option<i32>,
    pub include_invalid: bool,
    /// Only intel with a delivery to one of these entries.
    pub one_of_delivery_for_entries: Vec<Uuid>,
    /// Case-insensitive substring match on the search text.
    pub text: Option<String>,
}

const SELECT_INTEL: &str = "SELECT id, created_at, created_by, operation, type, content, search_text, importance, is_valid FROM intel";

fn row_to_intel(row: &Row<'_>) -> rusqlite::Result<(Intel, String)> {
    Ok((
        Intel {
            id: row.get(0)?,
            created_at: row.get(1)?,
            created_by: row.get(2)?,
            operation: row.get(3)?,
            intel_type: row.get(4)?,
            content: serde_json::Value::Null,
            search_text: row.get(6)?,
            importance: row.get(7)?,
            is_valid: row.get(8)?,
            assignments: Vec::new(),
        },
        row.get(5)?,
    ))
}

fn complete(conn: &Connection, (mut intel, content): (Intel, String)) -> Result<Intel, MdsError> {
    intel.content = serde_json::from_str(&content)?;
    let mut stmt = conn.prepare(
        "SELECT id, intel, to_entry FROM intel_assignments WHERE intel = ?1 ORDER BY position",
    )?;
    intel.assignments = stmt
        .query_map(params![intel.id], |row| {
            Ok(IntelAssignment {
                id: row.get(0)?,
                intel: row.get(1)?,
                to: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(intel)
}

pub fn create_intel(
    conn: &Connection,
    create: &CreateIntel,
    search_text: Option<String>,
    now: DateTime<Utc>,
) -> Result<Intel, MdsError> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO intel (id, created_at, created_by, operation, type, content, search_text, importance, is_valid)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1)",
        params![
            id,
            now,
            create.created_by,
            create.operation,
            create.intel_type,
            serde_json::to_string(&create.content)?,
            search_text,
            create.importance
        ],
    )?;
    let mut stmt = conn.prepare(
        "INSERT INTO intel_assignments (id, intel, to_entry, position) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (position, to) in create.assignments.iter().enumerate() {
        stmt.execute(params![Uuid::new_v4(), id, to, position as i64])?;
    }
    intel_by_id(conn, id)
}

pub fn intel_by_id(conn: &Connection, id: Uuid) -> Result<Intel, MdsError> {
    let raw = conn
        .query_row(&format!("{SELECT_INTEL} WHERE id = ?1"), params![id], row_to_intel)
        .optional()?
        .ok_or_else(|| MdsError::not_found("intel not found").with_detail("id", id))?;
    complete(conn, raw)
}

pub fn invalidate_intel(conn: &Connection, id: Uuid) -> Result<(), MdsError> {
    let affected = conn.execute("UPDATE intel SET is_valid = 0 WHERE id = ?1", params![id])?;
    expect_affected(affected, "intel", id)
}

/// Intel matching the filters, newest first.
pub fn intel(conn: &Connection, filters: &IntelFilters) -> Result<Vec<Intel>, MdsError> {
    let mut sql = format!("{SELECT_INTEL} WHERE 1 = 1");
    let mut args: Vec<Value> = Vec::new();
    if let Some(created_by) = filters.created_by {
        sql.push_str(" AND created_by = ?");
        args.push(Value::Blob(created_by.as_bytes().to_vec()));
    }
    if let Some(operation) = filters.operation {
        sql.push_str(" AND operation = ?");
        args.push(Value::Blob(operation.as_bytes().to_vec()));
    }
    if let Some(intel_type) = filters.intel_type {
        sql.push_str(" AND type = ?");
        args.push(Value::Text(intel_type.to_string()));
    }
    if let Some(min) = filters.min_importance {
        sql.push_str(" AND importance >= ?");
        args.push(Value::Integer(i64::from(min)));
    }
    if !filters.include_invalid {
        sql.push_str(" AND is_valid = 1");
    }
    if !filters.one_of_delivery_for_entries.is_empty() {
        sql.push_str(&format!(
            " AND id IN (SELECT intel FROM intel_deliveries WHERE to_entry IN ({}))",
            placeholders(filters.one_of_delivery_for_entries.len())
        ));
        args.extend(
            filters
                .one_of_delivery_for_entries
                .iter()
                .map(|e| Value::Blob(e.as_bytes().to_vec())),
        );
    }
    if let Some(text) = filters.text.as_deref().filter(|t| !t.is_empty()) {
        sql.push_str(" AND search_text LIKE ? ESCAPE '\\'");
        let escaped = text.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        args.push(Value::Text(format!("%{escaped}%")));
    }
    sql.push_str(" ORDER BY created_at DESC, id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(args.iter()), row_to_intel)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(|raw| complete(conn, raw)).collect()
}

/// Users associated with the recipient entries of the intel's deliveries.
pub fn users_with_deliveries_by_intel(conn: &Connection, intel: Uuid) -> Result<Vec<Uuid>, MdsError> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT e.user FROM intel_deliveries d
         JOIN address_book_entries e ON e.id = d.to_entry
         WHERE d.intel = ?1 AND e.user IS NOT NULL",
    )?;
    let users = stmt
        .query_map(params![intel], |row| row.get(0))?
        .collect::<Result<Vec<Uuid>, _>>()?;
    Ok(users)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::open_db;
    use serde_json::json;

    fn create(operation: Uuid, text: &str, importance: i32) -> CreateIntel {
        CreateIntel {
            created_by: Uuid::new_v4(),
            operation,
            intel_type: IntelType::PlaintextMessage,
            content: json!({ "text": text }),
            importance,
            assignments: vec![Uuid::from_u128(2), Uuid::from_u128(1)],
        }
    }

    #[tokio::test]
    async fn create_and_read_keeps_assignment_order() {
        let (db, _dir) = open_db().await;
        let c = create(Uuid::new_v4(), "bridge closed", 10);
        let intel = db
            .transaction(move |tx| create_intel(tx, &c, Some("bridge closed".into()), Utc::now()))
            .await
            .unwrap();
        let to: Vec<Uuid> = intel.assignments.iter().map(|a| a.to).collect();
        assert_eq!(to, vec![Uuid::from_u128(2), Uuid::from_u128(1)]);
        assert_eq!(intel.content["text"], "bridge closed");
        assert!(intel.is_valid);
    }

    #[tokio::test]
    async fn filters_apply() {
        let (db, _dir) = open_db().await;
        let op = Uuid::new_v4();
        let (a, b, other) = (create(op, "water low", 10), create(op, "road blocked", 90), create(Uuid::new_v4(), "water", 50));
        let found = db
            .transaction(move |tx| {
                let a = create_intel(tx, &a, Some("water low".into()), Utc::now())?;
                create_intel(tx, &b, Some("road blocked".into()), Utc::now())?;
                create_intel(tx, &other, Some("water".into()), Utc::now())?;
                invalidate_intel(tx, a.id)?;

                let by_text = intel(
                    tx,
                    &IntelFilters {
                        text: Some("WATER".into()),
                        include_invalid: true,
                        ..Default::default()
                    },
                )?;
                let valid_in_op = intel(
                    tx,
                    &IntelFilters {
                        operation: Some(op),
                        ..Default::default()
                    },
                )?;
                let important = intel(
                    tx,
                    &IntelFilters {
                        min_importance: Some(50),
                        ..Default::default()
                    },
                )?;
                Ok((by_text.len(), valid_in_op.len(), important.len()))
            })
            .await
            .unwrap();
        assert_eq!(found, (2, 1, 2));
    }
}
