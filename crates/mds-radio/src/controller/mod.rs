// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Radio-delivery controller.
//!
//! Same transaction model as logistics: one immediate transaction per
//! operation, events appended to the outbox inside it, relay woken after
//! commit. Live notifications are scheduled only after commit, so
//! operators are never told about offers that were rolled back.

pub mod attempts;
pub mod deliveries;
pub mod mirror;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mds_config::model::RadioConfig;
use mds_core::MdsError;
use mds_storage::Database;
use rusqlite::Connection;
use tokio::sync::Notify;

use crate::multiplexer::Multiplexer;

#[derive(Clone)]
pub struct Controller {
    db: Database,
    outbox_waker: Arc<Notify>,
    multiplexer: Arc<Multiplexer>,
    pickup_timeout: Duration,
    pickup_timeout_check_interval: Duration,
}

impl Controller {
    /// Fails when the configuration carries no pickup timeout.
    pub fn new(
        db: Database,
        outbox_waker: Arc<Notify>,
        multiplexer: Arc<Multiplexer>,
        config: &RadioConfig,
    ) -> Result<Self, MdsError> {
        let pickup_timeout = config
            .pickup_timeout()
            .ok_or_else(|| MdsError::Config("radio.pickup_timeout_secs is required".into()))?;
        Ok(Self {
            db,
            outbox_waker,
            multiplexer,
            pickup_timeout,
            pickup_timeout_check_interval: config.pickup_timeout_check_interval(),
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn multiplexer(&self) -> &Arc<Multiplexer> {
        &self.multiplexer
    }

    pub fn pickup_timeout(&self) -> Duration {
        self.pickup_timeout
    }

    pub(crate) async fn run_in_tx<T, F>(&self, f: F) -> Result<T, MdsError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, DateTime<Utc>) -> Result<T, MdsError> + Send + 'static,
    {
        self.run_in_tx_at(Utc::now(), f).await
    }

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

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use chrono::{DateTime, Utc};
    use mds_config::model::RadioConfig;
    use mds_core::{AcceptedIntelDeliveryAttempt, Event, MdsError, RadioChannel};
    use mds_storage::outbox;
    use tempfile::TempDir;
    use tokio::sync::Notify;
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    use super::Controller;
    use crate::multiplexer::Multiplexer;
    use crate::store;

    pub const PICKUP_TIMEOUT_SECS: u64 = 300;

    pub struct Fixture {
        pub controller: Controller,
        pub operation: Uuid,
        pub operator: Uuid,
        pub channel: Uuid,
        _dir: TempDir,
    }

    impl Fixture {
        /// Controller with one operation, one operator as its member and one
        /// mirrored radio channel.
        pub async fn new() -> Self {
            let (db, dir) = store::testing::open_db().await;
            let multiplexer = Multiplexer::new(db.clone(), 16, CancellationToken::new());
            let config = RadioConfig {
                pickup_timeout_secs: Some(PICKUP_TIMEOUT_SECS),
                ..RadioConfig::default()
            };
            let controller = Controller::new(db, Arc::new(Notify::new()), multiplexer, &config).unwrap();
            let operation = Uuid::new_v4();
            let operator = Uuid::new_v4();
            let channel = RadioChannel {
                id: Uuid::new_v4(),
                entry: Uuid::new_v4(),
                label: "Radio".into(),
                timeout: std::time::Duration::from_secs(600),
                info: "channel 4".into(),
            };
            let channel_id = channel.id;
            controller
                .run_in_tx(move |tx, _| {
                    store::operations::update_operation_members(tx, operation, &[operator])?;
                    store::channels::create_radio_channel(tx, &channel)
                })
                .await
                .unwrap();
            Self {
                controller,
                operation,
                operator,
                channel: channel_id,
                _dir: dir,
            }
        }

        /// Accept a fresh attempt on the fixture channel.
        pub async fn accept(&self, importance: i32, created_at: DateTime<Utc>) -> AcceptedIntelDeliveryAttempt {
            let attempt = store::testing::accepted(self.operation, self.channel, importance, created_at);
            assert!(
                self.controller
                    .accept_intel_delivery_attempt(attempt.clone())
                    .await
                    .unwrap()
            );
            attempt
        }

        pub async fn take_events(&self) -> Vec<Event> {
            self.controller
                .database()
                .transaction(|tx| {
                    let events = outbox::pending_events(tx)?;
                    tx.execute("DELETE FROM outbox", [])?;
                    Ok::<_, MdsError>(events)
                })
                .await
                .unwrap()
        }
    }
}
