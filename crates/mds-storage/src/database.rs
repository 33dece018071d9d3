// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and
//! transactions.
//!
//! All access is serialized through tokio-rusqlite's single background
//! thread, and every transaction begins `IMMEDIATE`, taking the write lock
//! up front. This is the serialization primitive of the engine: two
//! transactions never interleave, so row locks (`FOR UPDATE WAIT` /
//! `SKIP LOCKED`) are unnecessary. A skip-locked selection simply never
//! finds a locked row.

use std::path::Path;

use mds_core::MdsError;
use rusqlite::{Transaction, TransactionBehavior};
use tracing::debug;

use crate::outbox;

/// Runs a service's embedded migrations against a freshly opened connection.
pub type Migrate = fn(&mut rusqlite::Connection) -> Result<(), MdsError>;

/// Handle to one service database. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at `path`, apply PRAGMAs, create the
    /// outbox table and run the given migrations.
    pub async fn open(path: &str, migrate: Migrate) -> Result<Self, MdsError> {
        Self::open_with(path, true, migrate).await
    }

    /// Like [`Database::open`] with explicit journal mode selection.
    pub async fn open_with(path: &str, wal_mode: bool, migrate: Migrate) -> Result<Self, MdsError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| MdsError::Storage {
                source: Box::new(e),
            })?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| MdsError::Storage {
                source: e.to_string().into(),
            })?;

        conn.call(move |conn| -> Result<(), MdsError> {
            if wal_mode {
                conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            }
            conn.execute_batch(
                "PRAGMA synchronous = NORMAL;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
            )?;
            outbox::ensure_schema(conn)?;
            migrate(conn)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        debug!(path, wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The underlying connection, for single statements outside a transaction.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Run `f` inside an immediate transaction. Commits when `f` returns
    /// `Ok`, rolls back otherwise.
    pub async fn transaction<T, F>(&self, f: F) -> Result<T, MdsError>
    where
        T: Send + 'static,
        F: FnOnce(&Transaction<'_>) -> Result<T, MdsError> + Send + 'static,
    {
        self.conn
            .call(move |conn| -> Result<T, MdsError> {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let out = f(&tx)?;
                tx.commit()?;
                Ok(out)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), MdsError> {
        self.conn
            .call(|conn| -> Result<(), MdsError> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        self.conn.close().await.map_err(|e| MdsError::Storage {
            source: e.to_string().into(),
        })?;
        debug!("database closed");
        Ok(())
    }
}

/// Unwrap a tokio-rusqlite error: domain errors raised inside the closure
/// pass through, connection-level failures become storage errors.
pub fn map_tr_err(e: tokio_rusqlite::Error<MdsError>) -> MdsError {
    match e {
        tokio_rusqlite::Error::Error(inner) => inner,
        other => MdsError::Storage {
            source: other.to_string().into(),
        },
    }
}
