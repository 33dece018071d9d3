// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel lifecycle of address-book entries.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use mds_core::{Channel, MdsError};
use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use super::Controller;
use super::delivery::{cancel_attempts_for_deleted_channels, look_after};
use crate::notifier;
use crate::store::{channels, entries};

/// Cancel attempts on the given channels and delete them. Returns the
/// deliveries that lost an active attempt.
pub(crate) fn remove_channels(
    conn: &Connection,
    channel_ids: &[Uuid],
    now: DateTime<Utc>,
) -> Result<BTreeSet<Uuid>, MdsError> {
    let affected = cancel_attempts_for_deleted_channels(conn, channel_ids, now)?;
    for id in channel_ids {
        channels::delete_channel(conn, *id)?;
    }
    Ok(affected)
}

/// Look after each delivery, in id order.
pub(crate) fn look_after_all(
    conn: &Connection,
    deliveries: &BTreeSet<Uuid>,
    now: DateTime<Utc>,
) -> Result<(), MdsError> {
    for delivery in deliveries {
        look_after(conn, *delivery, now)?;
    }
    Ok(())
}

/// Emit the current channel list of an entry.
pub(crate) fn notify_channels(conn: &Connection, entry: Uuid) -> Result<(), MdsError> {
    let current = channels::channels_by_entry(conn, entry)?;
    notifier::address_book_entry_channels_updated(conn, entry, current)
}

/// Replace the channel set of an entry. A nil id creates a channel, a known
/// id updates it and known ids missing from `new_channels` are deleted.
pub(crate) fn update_channels_by_entry(
    conn: &Connection,
    entry: Uuid,
    new_channels: Vec<Channel>,
    now: DateTime<Utc>,
) -> Result<Vec<Channel>, MdsError> {
    let existing: HashMap<Uuid, Channel> = channels::channels_by_entry(conn, entry)?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    let mut seen = HashSet::new();
    let mut creates = Vec::new();
    let mut updates = Vec::new();
    for mut channel in new_channels {
        channel.entry = entry;
        channels::validate_channel(&channel).into_result("channel")?;
        if channel.id.is_nil() {
            channel.id = Uuid::new_v4();
            creates.push(channel);
            continue;
        }
        if !seen.insert(channel.id) {
            return Err(MdsError::bad_input("duplicate channel id").with_detail("channel_id", channel.id));
        }
        if !existing.contains_key(&channel.id) {
            return Err(MdsError::bad_input("channel not found for entry")
                .with_detail("channel_id", channel.id)
                .with_detail("entry_id", entry));
        }
        updates.push(channel);
    }

    let mut deletes: Vec<Uuid> = existing.keys().filter(|id| !seen.contains(*id)).copied().collect();
    deletes.sort();

    let affected = remove_channels(conn, &deletes, now)?;
    for channel in &creates {
        channels::create_channel(conn, channel)?;
    }
    for channel in &updates {
        if existing.get(&channel.id) != Some(channel) {
            channels::update_channel(conn, channel)?;
        }
    }
    debug!(
        entry_id = %entry,
        created = creates.len(),
        updated = updates.len(),
        deleted = deletes.len(),
        affected_deliveries = affected.len(),
        "channels updated"
    );

    look_after_all(conn, &affected, now)?;
    let current = channels::channels_by_entry(conn, entry)?;
    notifier::address_book_entry_channels_updated(conn, entry, current.clone())?;
    Ok(current)
}

impl Controller {
    /// Channels of an entry, highest priority first. With `limit_to_user`,
    /// entries not bound to that user read as not-found.
    pub async fn channels_by_entry(&self, entry_id: Uuid, limit_to_user: Option<Uuid>) -> Result<Vec<Channel>, MdsError> {
        self.run_in_tx(move |tx, _| {
            let entry = entries::entry_by_id(tx, entry_id, None)?;
            if let Some(user) = limit_to_user
                && entry.user != Some(user)
            {
                return Err(MdsError::not_found("address book entry not found")
                    .with_detail("entry_id", entry_id)
                    .with_detail("limit_to_user", user));
            }
            channels::channels_by_entry(tx, entry_id)
        })
        .await
    }

    /// Replace the channel set of an entry. Active attempts on removed
    /// channels are canceled and their deliveries rescheduled. With
    /// `limit_to_user`, only the user the entry is bound to may update.
    pub async fn update_channels_by_entry(
        &self,
        entry_id: Uuid,
        new_channels: Vec<Channel>,
        limit_to_user: Option<Uuid>,
    ) -> Result<Vec<Channel>, MdsError> {
        self.run_in_tx(move |tx, now| {
            let entry = entries::entry_by_id(tx, entry_id, None)?;
            if let Some(user) = limit_to_user
                && entry.user != Some(user)
            {
                return Err(MdsError::forbidden("user not associated with entry")
                    .with_detail("entry_id", entry_id)
                    .with_detail("limit_to_user", user));
            }
            update_channels_by_entry(tx, entry_id, new_channels, now)
        })
        .await
    }
}
