// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles both services the way `mds serve` does: temp
//! SQLite databases, one in-process bus, the two outbox relays, the two
//! event ports and the multiplexer consumer. Periodic sweeps are not
//! started; tests drive them explicitly with a chosen `now`.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mds_bus::{EventBus, Subscription};
use mds_config::model::MdsConfig;
use mds_core::{Connection, Event, EventEnvelope, EventPublisher, MdsError, Operation, User};
use mds_radio::Multiplexer;
use mds_storage::{Database, OutboxRelay};
use rusqlite::params;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::fixtures;
use crate::mock_connection::MockConnection;

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Poll `check` until it yields a value. Panics after a few seconds.
pub async fn eventually<T, F, Fut>(what: &str, mut check: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + WAIT_TIMEOUT;
    loop {
        if let Some(value) = check().await {
            return value;
        }
        if Instant::now() >= deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: MdsConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = MdsConfig::default();
        config.radio.pickup_timeout_secs = Some(300);
        config.outbox.relay_interval_ms = 20;
        Self { config }
    }

    pub fn with_pickup_timeout(mut self, timeout: Duration) -> Self {
        self.config.radio.pickup_timeout_secs = Some(timeout.as_secs());
        self
    }

    pub fn with_notify_request_buffer(mut self, buffer: usize) -> Self {
        self.config.radio.notify_request_buffer = buffer;
        self
    }

    /// Build the harness and start its background tasks.
    pub async fn build(self) -> Result<TestHarness, MdsError> {
        let temp_dir = tempfile::TempDir::new().map_err(|e| MdsError::Storage { source: e.into() })?;
        let mut config = self.config;
        config.storage.data_dir = temp_dir.path().display().to_string();

        let logistics_db = Database::open_with(
            &config.storage.logistics_database_path(),
            config.storage.wal_mode,
            mds_logistics::run_migrations,
        )
        .await?;
        let radio_db = Database::open_with(
            &config.storage.radio_database_path(),
            config.storage.wal_mode,
            mds_radio::run_migrations,
        )
        .await?;

        let bus = EventBus::new(config.bus.capacity);
        let publisher: Arc<dyn EventPublisher> = Arc::new(bus.clone());
        let cancel = CancellationToken::new();

        let logistics_relay = OutboxRelay::new(
            mds_logistics::notifier::SOURCE,
            logistics_db.clone(),
            Arc::clone(&publisher),
            config.outbox.relay_interval(),
            config.outbox.batch_size,
        );
        let radio_relay = OutboxRelay::new(
            mds_radio::notifier::SOURCE,
            radio_db.clone(),
            publisher,
            config.outbox.relay_interval(),
            config.outbox.batch_size,
        );

        let logistics = mds_logistics::Controller::new(logistics_db, logistics_relay.waker(), config.logistics.clone());
        let multiplexer = Multiplexer::new(radio_db.clone(), config.radio.notify_request_buffer, cancel.child_token());
        let radio = mds_radio::Controller::new(radio_db, radio_relay.waker(), Arc::clone(&multiplexer), &config.radio)?;

        // Subscribe before anything is published.
        let logistics_events = bus.subscribe();
        let radio_events = bus.subscribe();
        let recorded = Arc::new(Mutex::new(Vec::new()));

        let mut tasks = JoinSet::new();
        tasks.spawn(record(bus.subscribe(), Arc::clone(&recorded), cancel.clone()));
        tasks.spawn(logistics_relay.run(cancel.clone()));
        tasks.spawn(radio_relay.run(cancel.clone()));
        tasks.spawn(mds_logistics::EventPort::new(logistics.clone()).run(logistics_events, cancel.clone()));
        tasks.spawn(mds_radio::EventPort::new(radio.clone()).run(radio_events, cancel.clone()));
        tasks.spawn(Arc::clone(&multiplexer).run());

        Ok(TestHarness {
            bus,
            logistics,
            radio,
            multiplexer,
            config,
            recorded,
            cancel,
            tasks,
            _temp_dir: temp_dir,
        })
    }
}

async fn record(mut subscription: Subscription, recorded: Arc<Mutex<Vec<EventEnvelope>>>, cancel: CancellationToken) {
    loop {
        let envelope = tokio::select! {
            _ = cancel.cancelled() => return,
            received = subscription.recv() => match received {
                Some(envelope) => envelope,
                None => return,
            },
        };
        if let Ok(mut recorded) = recorded.lock() {
            recorded.push(envelope);
        }
    }
}

/// Both services running against temp storage on one bus.
pub struct TestHarness {
    /// The bus both services publish to and consume from.
    pub bus: EventBus,
    /// Logistics controller (delivery scheduler, address book, intel).
    pub logistics: mds_logistics::Controller,
    /// Radio-delivery controller.
    pub radio: mds_radio::Controller,
    /// Multiplexer of live operator connections.
    pub multiplexer: Arc<Multiplexer>,
    pub config: MdsConfig,
    recorded: Arc<Mutex<Vec<EventEnvelope>>>,
    cancel: CancellationToken,
    tasks: JoinSet<()>,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Publish an upstream event the way its owning service would, using the
    /// event's topic as source.
    pub async fn publish(&self, event: Event) {
        let envelope = EventEnvelope::new(event.topic(), event);
        if let Err(e) = self.bus.publish(envelope).await {
            panic!("publishing upstream event failed: {e}");
        }
    }

    /// Publish users, an operation and its members, then wait until both
    /// services mirrored the membership.
    pub async fn seed_operation(&self, title: &str, members: &[User]) -> Operation {
        let operation = fixtures::operation(title);
        for user in members {
            self.publish(Event::UserCreated(user.clone())).await;
        }
        self.publish(Event::OperationCreated(operation.clone())).await;
        self.publish(Event::OperationMembersUpdated {
            operation: operation.id,
            members: members.iter().map(|u| u.id).collect(),
        })
        .await;

        let expected = members.len();
        let logistics = self.logistics.database().clone();
        let radio = self.radio.database().clone();
        eventually("operation members to be mirrored", || {
            let (logistics, radio) = (logistics.clone(), radio.clone());
            async move {
                let mirrored = member_count(&logistics, operation.id).await == expected
                    && member_count(&radio, operation.id).await == expected;
                mirrored.then_some(())
            }
        })
        .await;
        operation
    }

    /// Open a mock operator connection and register it with the multiplexer.
    pub async fn connect(&self, user: Uuid) -> Arc<MockConnection> {
        let conn = Arc::new(MockConnection::new(user));
        self.multiplexer
            .accept(Arc::clone(&conn) as Arc<dyn Connection>)
            .await;
        conn
    }

    /// Every event seen on the bus so far, in bus order.
    pub fn events(&self) -> Vec<Event> {
        self.recorded
            .lock()
            .map(|recorded| recorded.iter().map(|e| e.event.clone()).collect())
            .unwrap_or_default()
    }

    /// Wait for the first bus event accepted by `extract`.
    pub async fn wait_for_event<T, F>(&self, what: &str, extract: F) -> T
    where
        F: Fn(&Event) -> Option<T>,
    {
        eventually(what, || {
            let found = self.events().iter().find_map(&extract);
            async move { found }
        })
        .await
    }

    /// Wait until the radio-delivery service holds a delivery for `attempt`.
    pub async fn wait_for_radio_delivery(&self, attempt: Uuid) {
        eventually("radio delivery to be accepted", || async move {
            self.radio.radio_delivery_by_attempt(attempt).await.ok().map(|_| ())
        })
        .await;
    }

    /// Stop all background tasks and wait for them to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        while self.tasks.join_next().await.is_some() {}
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn member_count(db: &Database, operation: Uuid) -> usize {
    db.transaction(move |tx| {
        let count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM operation_members WHERE operation = ?1",
            params![operation],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    })
    .await
    .unwrap_or(0)
}
