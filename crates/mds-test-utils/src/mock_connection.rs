// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock live connection for deterministic testing.
//!
//! `MockConnection` implements [`Connection`] and captures every
//! new-available notification for assertion in tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mds_core::{Connection, MdsError};
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A mock operator connection.
///
/// Notified operations are captured in order and retrievable via
/// `notifications()`. A failing connection still records the call before
/// returning an error.
pub struct MockConnection {
    user: Uuid,
    notified: Arc<Mutex<Vec<Uuid>>>,
    notify: Arc<Notify>,
    failing: AtomicBool,
    lifetime: CancellationToken,
}

impl MockConnection {
    /// Create an open connection for `user`.
    pub fn new(user: Uuid) -> Self {
        Self {
            user,
            notified: Arc::new(Mutex::new(Vec::new())),
            notify: Arc::new(Notify::new()),
            failing: AtomicBool::new(false),
            lifetime: CancellationToken::new(),
        }
    }

    /// Make every following notification fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Operations notified so far, oldest first.
    pub async fn notifications(&self) -> Vec<Uuid> {
        self.notified.lock().await.clone()
    }

    pub async fn notification_count(&self) -> usize {
        self.notified.lock().await.len()
    }

    pub async fn clear_notifications(&self) {
        self.notified.lock().await.clear();
    }

    /// Wait until `operation` was notified. Returns `false` on timeout.
    pub async fn wait_for_notification(&self, operation: Uuid, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            loop {
                if self.notified.lock().await.contains(&operation) {
                    return;
                }
                self.notify.notified().await;
            }
        })
        .await
        .is_ok()
    }

    /// Close the connection. The multiplexer drops it shortly after.
    pub fn close(&self) {
        self.lifetime.cancel();
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn user_id(&self) -> Uuid {
        self.user
    }

    async fn notify_new_available(&self, operation: Uuid) -> Result<(), MdsError> {
        self.notified.lock().await.push(operation);
        self.notify.notify_one();
        if self.failing.load(Ordering::SeqCst) {
            return Err(MdsError::internal("mock connection failure").with_detail("operation_id", operation));
        }
        Ok(())
    }

    fn lifetime(&self) -> CancellationToken {
        self.lifetime.clone()
    }
}
