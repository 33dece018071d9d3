// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Logistics controller.
//!
//! Public operations open one immediate transaction each, run the
//! transaction-scoped logic from the submodules and wake the outbox relay
//! once the transaction committed. Transaction-scoped helpers take the open
//! connection plus the `now` the operation started at, so they never read
//! the clock themselves.

pub mod channels;
pub mod delivery;
pub mod entries;
pub mod groups;
pub mod intel;
pub mod operations;
pub mod users;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mds_config::model::LogisticsConfig;
use mds_core::MdsError;
use mds_storage::Database;
use rusqlite::Connection;
use tokio::sync::Notify;

/// Entry point for every logistics operation. Cheap to clone.
#[derive(Clone)]
pub struct Controller {
    db: Database,
    outbox_waker: Arc<Notify>,
    config: LogisticsConfig,
}

impl Controller {
    /// `outbox_waker` is the relay's waker; it is notified after each
    /// committed transaction.
    pub fn new(db: Database, outbox_waker: Arc<Notify>, config: LogisticsConfig) -> Self {
        Self {
            db,
            outbox_waker,
            config,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &LogisticsConfig {
        &self.config
    }

    /// Run `f` in one transaction stamped with the current time.
    pub(crate) async fn run_in_tx<T, F>(&self, f: F) -> Result<T, MdsError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, DateTime<Utc>) -> Result<T, MdsError> + Send + 'static,
    {
        self.run_in_tx_at(Utc::now(), f).await
    }

    /// Like [`Controller::run_in_tx`] with an explicit clock reading.
    pub(crate) async fn run_in_tx_at<T, F>(&self, now: DateTime<Utc>, f: F) -> Result<T, MdsError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, DateTime<Utc>) -> Result<T, MdsError> + Send + 'static,
    {
        let out = self.db.transaction(move |tx| f(tx, now)).await?;
        self.outbox_waker.notify_one();
        Ok(out)
    }
}
