// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User mirror.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use mds_core::{Channel, MdsError, User};
use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use super::Controller;
use super::channels::{look_after_all, notify_channels, remove_channels};
use crate::store::{channels, users};

/// Remove forwarding channels that point at a deleted user or group, then
/// run `delete_target`. Affected deliveries are looked after and affected
/// entries announce their new channel list.
pub(super) fn remove_forwarding_channels<F>(
    conn: &Connection,
    forwarding: Vec<Channel>,
    now: DateTime<Utc>,
    delete_target: F,
) -> Result<(), MdsError>
where
    F: FnOnce(&Connection) -> Result<(), MdsError>,
{
    let ids: Vec<Uuid> = forwarding.iter().map(|c| c.id).collect();
    let affected_entries: BTreeSet<Uuid> = forwarding.iter().map(|c| c.entry).collect();
    let affected_deliveries = remove_channels(conn, &ids, now)?;
    delete_target(conn)?;
    look_after_all(conn, &affected_deliveries, now)?;
    for entry in affected_entries {
        notify_channels(conn, entry)?;
    }
    Ok(())
}

impl Controller {
    pub async fn create_user(&self, create: User) -> Result<(), MdsError> {
        self.run_in_tx(move |tx, _| users::create_user(tx, &create))
            .await
    }

    pub async fn update_user(&self, update: User) -> Result<(), MdsError> {
        self.run_in_tx(move |tx, _| users::update_user(tx, &update))
            .await
    }

    /// Delete a user. Forward-to-user channels targeting the user are
    /// removed first.
    pub async fn delete_user_by_id(&self, user_id: Uuid) -> Result<(), MdsError> {
        self.run_in_tx(move |tx, now| {
            let forwarding = channels::forward_to_user_channels_by_user(tx, user_id)?;
            debug!(%user_id, channels = forwarding.len(), "removing forward-to-user channels of deleted user");
            remove_forwarding_channels(tx, forwarding, now, |conn| users::delete_user(conn, user_id))
        })
        .await
    }
}
