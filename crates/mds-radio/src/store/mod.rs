// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transaction-scoped persistence for the radio-delivery service.
//!
//! Same conventions as the logistics store: functions take the open
//! transaction, never commit, and reads that expect a row fail with
//! not-found.

pub mod attempts;
pub mod channels;
pub mod deliveries;
pub mod operations;
pub mod users;

use std::time::Duration;

use mds_core::MdsError;

pub(crate) fn expect_affected(affected: usize, what: &str, id: impl std::fmt::Display) -> Result<(), MdsError> {
    if affected == 0 {
        return Err(MdsError::not_found(format!("{what} not found")).with_detail("id", id));
    }
    Ok(())
}

pub(crate) fn duration_to_ms(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

pub(crate) fn ms_to_duration(ms: i64) -> Duration {
    Duration::from_millis(u64::try_from(ms).unwrap_or(0))
}

#[cfg(test)]
pub(crate) mod testing {
    use chrono::{DateTime, Utc};
    use mds_core::{AcceptedIntelDeliveryAttempt, IntelDeliveryStatus};
    use mds_storage::Database;
    use tempfile::TempDir;
    use uuid::Uuid;

    /// Fresh radio database in a temp dir.
    pub async fn open_db() -> (Database, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("radio.db");
        let db = Database::open(path.to_str().unwrap(), crate::migrations::run_migrations)
            .await
            .unwrap();
        (db, dir)
    }

    pub fn accepted(operation: Uuid, channel: Uuid, importance: i32, created_at: DateTime<Utc>) -> AcceptedIntelDeliveryAttempt {
        AcceptedIntelDeliveryAttempt {
            id: Uuid::new_v4(),
            intel: Uuid::new_v4(),
            intel_operation: operation,
            intel_importance: importance,
            assigned_to: Uuid::new_v4(),
            assigned_to_label: "Relay station".into(),
            assigned_to_user: None,
            delivery: Uuid::new_v4(),
            channel,
            created_at,
            is_active: true,
            status: IntelDeliveryStatus::Open,
            status_ts: created_at,
            note: None,
            accepted_at: created_at,
        }
    }
}
