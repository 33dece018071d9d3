// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection multiplexer for live radio operators.
//!
//! Keeps every live [`Connection`] and buckets them by the operations their
//! user is a member of. Buckets are rebuilt from the store on connect,
//! disconnect and membership changes, never on notification. Notifications
//! are best-effort: the store stays authoritative, so a failed or dropped
//! notification only delays an operator's view.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::join_all;
use mds_core::{Connection, MdsError};
use mds_storage::Database;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::store::operations;

type ConnectionId = u64;

#[derive(Default)]
struct State {
    connections: Vec<(ConnectionId, Arc<dyn Connection>)>,
    by_operation: HashMap<Uuid, Vec<Arc<dyn Connection>>>,
}

pub struct Multiplexer {
    db: Database,
    state: RwLock<State>,
    next_id: AtomicU64,
    requests: mpsc::Sender<Uuid>,
    inbox: Mutex<Option<mpsc::Receiver<Uuid>>>,
    lifetime: CancellationToken,
}

impl Multiplexer {
    /// Create a multiplexer whose queued notify requests hold at most
    /// `buffer` operations. Everything it spawns ends when `lifetime` is
    /// cancelled.
    pub fn new(db: Database, buffer: usize, lifetime: CancellationToken) -> Arc<Self> {
        let (requests, inbox) = mpsc::channel(buffer.max(1));
        Arc::new(Self {
            db,
            state: RwLock::new(State::default()),
            next_id: AtomicU64::new(0),
            requests,
            inbox: Mutex::new(Some(inbox)),
            lifetime,
        })
    }

    /// Register a live connection. It is removed again once its lifetime
    /// token is cancelled.
    pub async fn accept(self: &Arc<Self>, conn: Arc<dyn Connection>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let user_id = conn.user_id();
        {
            let mut state = self.state.write().await;
            state.connections.push((id, Arc::clone(&conn)));
            self.rebuild(&mut state).await;
        }
        debug!(%user_id, connection_id = id, "connection accepted");

        let this = Arc::clone(self);
        let closed = conn.lifetime();
        tokio::spawn(async move {
            tokio::select! {
                _ = closed.cancelled() => this.remove(id, user_id).await,
                _ = this.lifetime.cancelled() => {}
            }
        });
    }

    async fn remove(&self, id: ConnectionId, user_id: Uuid) {
        let mut state = self.state.write().await;
        let before = state.connections.len();
        state.connections.retain(|(other, _)| *other != id);
        if state.connections.len() == before {
            error!(%user_id, connection_id = id, "closed connection not registered");
            return;
        }
        self.rebuild(&mut state).await;
        debug!(%user_id, connection_id = id, "connection removed");
    }

    /// Re-resolve operation buckets for all connections, e.g. after
    /// operation members changed.
    pub async fn reassign(&self) {
        let mut state = self.state.write().await;
        self.rebuild(&mut state).await;
    }

    /// Number of registered connections.
    pub async fn connection_count(&self) -> usize {
        self.state.read().await.connections.len()
    }

    /// Rebuild the buckets under the caller's write lock. On failure the
    /// previous buckets stay in place.
    async fn rebuild(&self, state: &mut State) {
        let users: Vec<Uuid> = state.connections.iter().map(|(_, c)| c.user_id()).collect();
        let resolved = self
            .db
            .transaction(move |tx| {
                users
                    .into_iter()
                    .map(|user| operations::operations_by_member(tx, user))
                    .collect::<Result<Vec<_>, MdsError>>()
            })
            .await;
        let memberships = match resolved {
            Ok(memberships) => memberships,
            Err(e) => {
                error!(error = %e, "reassigning connections to operations failed, keeping previous assignment");
                return;
            }
        };

        let mut by_operation: HashMap<Uuid, Vec<Arc<dyn Connection>>> = HashMap::new();
        for ((_, conn), operations) in state.connections.iter().zip(memberships) {
            for operation in operations {
                by_operation.entry(operation).or_default().push(Arc::clone(conn));
            }
        }
        state.by_operation = by_operation;
    }

    /// Notify every connection bucketed under the given operations and wait
    /// for all of them. Sink failures are logged and otherwise ignored.
    pub async fn notify(&self, operations: &[Uuid]) {
        let targets: Vec<(Uuid, Arc<dyn Connection>)> = {
            let state = self.state.read().await;
            operations
                .iter()
                .flat_map(|op| {
                    state
                        .by_operation
                        .get(op)
                        .into_iter()
                        .flatten()
                        .map(move |conn| (*op, Arc::clone(conn)))
                })
                .collect()
        };
        join_all(targets.into_iter().map(|(operation, conn)| async move {
            if let Err(e) = conn.notify_new_available(operation).await {
                debug!(user_id = %conn.user_id(), operation_id = %operation, error = %e, "notify new available failed");
            }
        }))
        .await;
    }

    /// Queue notifications for the given operations. Waits for queue space;
    /// requests still waiting when the multiplexer shuts down are dropped.
    pub async fn schedule_notify(&self, operations: &[Uuid]) {
        for operation in operations {
            tokio::select! {
                _ = self.lifetime.cancelled() => {
                    debug!(operation_id = %operation, "dropping notify request for operation");
                    return;
                }
                sent = self.requests.send(*operation) => {
                    if sent.is_err() {
                        debug!(operation_id = %operation, "dropping notify request for operation, consumer gone");
                        return;
                    }
                }
            }
        }
    }

    /// Drain queued notify requests until the lifetime ends. Each request
    /// is served by its own task. Only the first call consumes requests.
    pub async fn run(self: Arc<Self>) {
        let Some(mut inbox) = self.inbox.lock().await.take() else {
            error!("multiplexer consumer already running");
            return;
        };
        info!("connection multiplexer started");
        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                _ = self.lifetime.cancelled() => break,
                request = inbox.recv() => {
                    let Some(operation) = request else { break };
                    let this = Arc::clone(&self);
                    tasks.spawn(async move { this.notify(&[operation]).await });
                }
            }
            while tasks.try_join_next().is_some() {}
        }
        tasks.shutdown().await;
        info!("connection multiplexer stopped");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    /// Connection recording the operations it was notified for.
    pub struct RecordingConnection {
        pub user: Uuid,
        pub notified: Mutex<Vec<Uuid>>,
        pub fail: bool,
        pub lifetime: CancellationToken,
    }

    impl RecordingConnection {
        pub fn new(user: Uuid) -> Arc<Self> {
            Arc::new(Self {
                user,
                notified: Mutex::new(Vec::new()),
                fail: false,
                lifetime: CancellationToken::new(),
            })
        }

        pub fn notified(&self) -> Vec<Uuid> {
            self.notified.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Connection for RecordingConnection {
        fn user_id(&self) -> Uuid {
            self.user
        }

        async fn notify_new_available(&self, operation: Uuid) -> Result<(), MdsError> {
            self.notified.lock().unwrap().push(operation);
            if self.fail {
                return Err(MdsError::internal("socket closed"));
            }
            Ok(())
        }

        fn lifetime(&self) -> CancellationToken {
            self.lifetime.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::testing::RecordingConnection;
    use super::*;
    use crate::store::testing::open_db;
    use tracing_test::traced_test;

    async fn set_members(db: &Database, operation: Uuid, members: Vec<Uuid>) {
        db.transaction(move |tx| operations::update_operation_members(tx, operation, &members))
            .await
            .unwrap();
    }

    async fn wait_for<F: Fn() -> bool>(check: F) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn notifies_members_of_operation_only() {
        let (db, _dir) = open_db().await;
        let op = Uuid::new_v4();
        let member = Uuid::new_v4();
        let outsider = Uuid::new_v4();
        set_members(&db, op, vec![member]).await;

        let mux = Multiplexer::new(db, 8, CancellationToken::new());
        let a = RecordingConnection::new(member);
        let b = RecordingConnection::new(outsider);
        mux.accept(a.clone()).await;
        mux.accept(b.clone()).await;

        mux.notify(&[op]).await;
        assert_eq!(a.notified(), vec![op]);
        assert!(b.notified().is_empty());
    }

    #[tokio::test]
    async fn sink_failures_do_not_stop_fan_out() {
        let (db, _dir) = open_db().await;
        let op = Uuid::new_v4();
        let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());
        set_members(&db, op, vec![u1, u2]).await;

        let mux = Multiplexer::new(db, 8, CancellationToken::new());
        let failing = Arc::new(RecordingConnection {
            user: u1,
            notified: std::sync::Mutex::new(Vec::new()),
            fail: true,
            lifetime: CancellationToken::new(),
        });
        let healthy = RecordingConnection::new(u2);
        mux.accept(failing.clone()).await;
        mux.accept(healthy.clone()).await;

        mux.notify(&[op]).await;
        assert_eq!(failing.notified(), vec![op]);
        assert_eq!(healthy.notified(), vec![op]);
    }

    #[tokio::test]
    async fn closed_connections_are_removed() {
        let (db, _dir) = open_db().await;
        let op = Uuid::new_v4();
        let user = Uuid::new_v4();
        set_members(&db, op, vec![user]).await;

        let mux = Multiplexer::new(db, 8, CancellationToken::new());
        let conn = RecordingConnection::new(user);
        mux.accept(conn.clone()).await;
        assert_eq!(mux.connection_count().await, 1);

        conn.lifetime.cancel();
        for _ in 0..200 {
            if mux.connection_count().await == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(mux.connection_count().await, 0);
        mux.notify(&[op]).await;
        assert!(conn.notified().is_empty());
    }

    #[tokio::test]
    async fn reassign_picks_up_membership_changes() {
        let (db, _dir) = open_db().await;
        let op = Uuid::new_v4();
        let user = Uuid::new_v4();
        let mux = Multiplexer::new(db.clone(), 8, CancellationToken::new());
        let conn = RecordingConnection::new(user);
        mux.accept(conn.clone()).await;

        mux.notify(&[op]).await;
        assert!(conn.notified().is_empty());

        set_members(&db, op, vec![user]).await;
        mux.reassign().await;
        mux.notify(&[op]).await;
        assert_eq!(conn.notified(), vec![op]);
    }

    #[tokio::test]
    async fn scheduled_requests_are_served_by_run_loop() {
        let (db, _dir) = open_db().await;
        let op = Uuid::new_v4();
        let user = Uuid::new_v4();
        set_members(&db, op, vec![user]).await;

        let lifetime = CancellationToken::new();
        let mux = Multiplexer::new(db, 8, lifetime.clone());
        let conn = RecordingConnection::new(user);
        mux.accept(conn.clone()).await;
        let consumer = tokio::spawn(Arc::clone(&mux).run());

        mux.schedule_notify(&[op]).await;
        wait_for(|| conn.notified() == vec![op]).await;

        lifetime.cancel();
        consumer.await.unwrap();
    }

    #[tokio::test]
    #[traced_test]
    async fn schedule_after_shutdown_is_dropped() {
        let (db, _dir) = open_db().await;
        let lifetime = CancellationToken::new();
        let mux = Multiplexer::new(db, 1, lifetime.clone());
        lifetime.cancel();
        // Queue holds one request; the rest must not block.
        mux.schedule_notify(&[Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()])
            .await;
        assert!(logs_contain("dropping notify request"));
    }
}
