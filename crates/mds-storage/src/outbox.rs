// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transactional outbox.
//!
//! Producers append events with [`append`] inside the transaction that makes
//! the corresponding state change. The [`OutboxRelay`] publishes committed
//! rows in sequence order and deletes them once the publisher accepted them,
//! so subscribers see an event if and only if its state change committed.

use std::sync::Arc;
use std::time::Duration;

use mds_core::{Event, EventEnvelope, EventPublisher, MdsError};
use rusqlite::{Connection, params};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::database::{Database, map_tr_err};

/// Create the outbox table if absent.
pub(crate) fn ensure_schema(conn: &Connection) -> Result<(), MdsError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS outbox (
             seq INTEGER PRIMARY KEY AUTOINCREMENT,
             id BLOB NOT NULL UNIQUE,
             source TEXT NOT NULL,
             name TEXT NOT NULL,
             payload TEXT NOT NULL,
             created_at TEXT NOT NULL
         );",
    )?;
    Ok(())
}

/// Append an event to the outbox. Must be called inside the producing
/// transaction.
pub fn append(conn: &Connection, source: &str, event: Event) -> Result<EventEnvelope, MdsError> {
    let envelope = EventEnvelope::new(source, event);
    let payload = serde_json::to_string(&envelope)?;
    conn.execute(
        "INSERT INTO outbox (id, source, name, payload, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            envelope.id,
            envelope.source,
            envelope.event.name(),
            payload,
            envelope.emitted_at
        ],
    )?;
    Ok(envelope)
}

/// Oldest unpublished envelopes, with their sequence numbers.
pub fn pending(conn: &Connection, limit: usize) -> Result<Vec<(i64, EventEnvelope)>, MdsError> {
    let mut stmt = conn.prepare("SELECT seq, payload FROM outbox ORDER BY seq ASC LIMIT ?1")?;
    let rows = stmt
        .query_map(params![limit as i64], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter()
        .map(|(seq, payload)| Ok((seq, serde_json::from_str(&payload)?)))
        .collect()
}

/// All unpublished events in order. Mostly useful for assertions.
pub fn pending_events(conn: &Connection) -> Result<Vec<Event>, MdsError> {
    Ok(pending(conn, usize::MAX >> 1)?
        .into_iter()
        .map(|(_, envelope)| envelope.event)
        .collect())
}

/// Remove published rows up to and including `seq`.
pub fn remove_through(conn: &Connection, seq: i64) -> Result<usize, MdsError> {
    Ok(conn.execute("DELETE FROM outbox WHERE seq <= ?1", params![seq])?)
}

/// Publishes committed outbox rows through an [`EventPublisher`].
pub struct OutboxRelay {
    name: &'static str,
    db: Database,
    publisher: Arc<dyn EventPublisher>,
    wake: Arc<Notify>,
    interval: Duration,
    batch_size: usize,
}

impl OutboxRelay {
    pub fn new(
        name: &'static str,
        db: Database,
        publisher: Arc<dyn EventPublisher>,
        interval: Duration,
        batch_size: usize,
    ) -> Self {
        Self {
            name,
            db,
            publisher,
            wake: Arc::new(Notify::new()),
            interval,
            batch_size,
        }
    }

    /// Handle producers use to wake the relay right after a commit.
    pub fn waker(&self) -> Arc<Notify> {
        self.wake.clone()
    }

    /// Publish everything currently pending. Returns the number of published
    /// events. Stops at the first publish failure, keeping the failed event
    /// and everything after it for the next round.
    pub async fn relay_pending(&self) -> Result<usize, MdsError> {
        let mut published = 0;
        loop {
            let limit = self.batch_size;
            let batch = self
                .db
                .connection()
                .call(move |conn| pending(conn, limit))
                .await
                .map_err(map_tr_err)?;
            if batch.is_empty() {
                return Ok(published);
            }

            let mut last_ok = None;
            let mut failure = None;
            for (seq, envelope) in batch {
                let name = envelope.event.name();
                match self.publisher.publish(envelope).await {
                    Ok(()) => last_ok = Some(seq),
                    Err(e) => {
                        warn!(relay = self.name, seq, event = name, error = %e, "publishing outbox event failed");
                        failure = Some(e);
                        break;
                    }
                }
            }

            if let Some(seq) = last_ok {
                let removed = self
                    .db
                    .connection()
                    .call(move |conn| remove_through(conn, seq))
                    .await
                    .map_err(map_tr_err)?;
                published += removed;
            }
            if let Some(e) = failure {
                return Err(e);
            }
        }
    }

    /// Relay until `cancel` fires. Wakes on commit notifications and on the
    /// fallback interval.
    pub async fn run(self, cancel: CancellationToken) {
        info!(relay = self.name, "outbox relay started");
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(relay = self.name, "outbox relay shutting down");
                    return;
                }
                _ = self.wake.notified() => {}
                _ = interval.tick() => {}
            }
            // Publishing waits on subscriber queues. Rows not yet removed
            // are published again by the next relay.
            let round = tokio::select! {
                _ = cancel.cancelled() => {
                    info!(relay = self.name, "outbox relay shutting down");
                    return;
                }
                round = self.relay_pending() => round,
            };
            match round {
                Ok(0) => {}
                Ok(n) => debug!(relay = self.name, published = n, "relayed outbox events"),
                Err(e) => warn!(relay = self.name, error = %e, "outbox relay round failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mds_core::Event;
    use std::sync::Mutex;
    use tempfile::tempdir;
    use uuid::Uuid;

    fn no_migrations(_conn: &mut rusqlite::Connection) -> Result<(), MdsError> {
        Ok(())
    }

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("outbox.db");
        let db = Database::open(db_path.to_str().unwrap(), no_migrations)
            .await
            .unwrap();
        (db, dir)
    }

    #[derive(Default)]
    struct Recording {
        published: Mutex<Vec<EventEnvelope>>,
        fail_after: Option<usize>,
    }

    #[async_trait]
    impl EventPublisher for Recording {
        async fn publish(&self, envelope: EventEnvelope) -> Result<(), MdsError> {
            let mut published = self.published.lock().unwrap();
            if let Some(limit) = self.fail_after
                && published.len() >= limit
            {
                return Err(MdsError::internal("bus unavailable"));
            }
            published.push(envelope);
            Ok(())
        }
    }

    fn user_deleted(n: u128) -> Event {
        Event::UserDeleted {
            user: Uuid::from_u128(n),
        }
    }

    #[tokio::test]
    async fn rolled_back_events_are_never_published() {
        let (db, _dir) = setup_db().await;
        let _ = db
            .transaction(|tx| -> Result<(), MdsError> {
                append(tx, "test", user_deleted(1))?;
                Err(MdsError::bad_input("abort"))
            })
            .await;
        db.transaction(|tx| append(tx, "test", user_deleted(2)).map(|_| ()))
            .await
            .unwrap();

        let publisher = Arc::new(Recording::default());
        let relay = OutboxRelay::new("test", db.clone(), publisher.clone(), Duration::from_secs(1), 10);
        assert_eq!(relay.relay_pending().await.unwrap(), 1);

        let published = publisher.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].event, user_deleted(2));
        assert_eq!(published[0].source, "test");
    }

    #[tokio::test]
    async fn relay_preserves_order_across_batches() {
        let (db, _dir) = setup_db().await;
        db.transaction(|tx| {
            for n in 0..5 {
                append(tx, "test", user_deleted(n))?;
            }
            Ok(())
        })
        .await
        .unwrap();

        let publisher = Arc::new(Recording::default());
        let relay = OutboxRelay::new("test", db.clone(), publisher.clone(), Duration::from_secs(1), 2);
        assert_eq!(relay.relay_pending().await.unwrap(), 5);

        let events: Vec<Event> = publisher
            .published
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.event.clone())
            .collect();
        assert_eq!(events, (0..5).map(user_deleted).collect::<Vec<_>>());

        let left = db.transaction(|tx| pending_events(tx)).await.unwrap();
        assert!(left.is_empty());
    }

    #[tokio::test]
    async fn failed_publish_keeps_remaining_rows() {
        let (db, _dir) = setup_db().await;
        db.transaction(|tx| {
            for n in 0..3 {
                append(tx, "test", user_deleted(n))?;
            }
            Ok(())
        })
        .await
        .unwrap();

        let publisher = Arc::new(Recording {
            fail_after: Some(1),
            ..Default::default()
        });
        let relay = OutboxRelay::new("test", db.clone(), publisher.clone(), Duration::from_secs(1), 10);
        assert!(relay.relay_pending().await.is_err());

        let left = db.transaction(|tx| pending_events(tx)).await.unwrap();
        assert_eq!(left, vec![user_deleted(1), user_deleted(2)]);
    }

    #[tokio::test]
    async fn burst_larger_than_bus_capacity_reaches_subscriber() {
        let (db, _dir) = setup_db().await;
        db.transaction(|tx| {
            for n in 0..10 {
                append(tx, "test", user_deleted(n))?;
            }
            Ok(())
        })
        .await
        .unwrap();

        let bus = mds_bus::EventBus::new(4);
        let mut sub = bus.subscribe();
        let relay = OutboxRelay::new("test", db.clone(), Arc::new(bus), Duration::from_secs(1), 10);
        let relayed = tokio::spawn(async move { relay.relay_pending().await });

        let mut received = Vec::new();
        while received.len() < 10 {
            received.push(sub.recv().await.unwrap().event);
        }
        assert_eq!(relayed.await.unwrap().unwrap(), 10);
        assert_eq!(received, (0..10).map(user_deleted).collect::<Vec<_>>());

        let left = db.transaction(|tx| pending_events(tx)).await.unwrap();
        assert!(left.is_empty());
    }

    #[tokio::test]
    async fn cancel_stops_relay_blocked_on_full_subscriber() {
        let (db, _dir) = setup_db().await;
        db.transaction(|tx| {
            for n in 0..3 {
                append(tx, "test", user_deleted(n))?;
            }
            Ok(())
        })
        .await
        .unwrap();

        let bus = mds_bus::EventBus::new(1);
        let _idle = bus.subscribe();
        let relay = OutboxRelay::new("test", db.clone(), Arc::new(bus), Duration::from_millis(10), 10);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(relay.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("relay must stop while blocked")
            .unwrap();

        // Nothing was removed: the batch never fully reached the subscriber.
        let left = db.transaction(|tx| pending_events(tx)).await.unwrap();
        assert_eq!(left.len(), 3);
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let (db, _dir) = setup_db().await;
        let publisher = Arc::new(Recording::default());
        let relay = OutboxRelay::new("test", db.clone(), publisher.clone(), Duration::from_millis(10), 10);
        let waker = relay.waker();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(relay.run(cancel.clone()));

        db.transaction(|tx| append(tx, "test", user_deleted(9)).map(|_| ()))
            .await
            .unwrap();
        waker.notify_one();

        for _ in 0..100 {
            if !publisher.published.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(publisher.published.lock().unwrap().len(), 1);

        cancel.cancel();
        handle.await.unwrap();
    }
}
