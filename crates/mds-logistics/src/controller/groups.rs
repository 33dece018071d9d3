// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Group mirror.

use mds_core::{Group, MdsError};
use tracing::debug;
use uuid::Uuid;

use super::Controller;
use super::users::remove_forwarding_channels;
use crate::store::{channels, groups};

impl Controller {
    pub async fn create_group(&self, create: Group) -> Result<(), MdsError> {
        self.run_in_tx(move |tx, _| groups::create_group(tx, &create))
            .await
    }

    pub async fn update_group(&self, update: Group) -> Result<(), MdsError> {
        self.run_in_tx(move |tx, _| groups::update_group(tx, &update))
            .await
    }

    /// Delete a group. Forward-to-group channels targeting the group are
    /// removed first.
    pub async fn delete_group_by_id(&self, group_id: Uuid) -> Result<(), MdsError> {
        self.run_in_tx(move |tx, now| {
            let forwarding = channels::forward_to_group_channels_by_group(tx, group_id)?;
            debug!(%group_id, channels = forwarding.len(), "removing forward-to-group channels of deleted group");
            remove_forwarding_channels(tx, forwarding, now, |conn| groups::delete_group(conn, group_id))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::testing::{Fixture, event_names};
    use mds_core::{ChannelDetails, Event};

    #[tokio::test]
    async fn deleting_group_without_fallback_fails_delivery() {
        let fx = Fixture::new().await;
        let group = Group {
            id: Uuid::new_v4(),
            title: "Medics".into(),
            description: String::new(),
            operation: Some(fx.operation),
            members: vec![fx.creator],
        };
        fx.controller.create_group(group.clone()).await.unwrap();
        let entry = fx.entry(None).await;
        fx.channel(
            entry.id,
            10,
            ChannelDetails::ForwardToGroup {
                groups: vec![group.id],
            },
        )
        .await;
        fx.controller
            .create_intel(fx.create_intel(10, vec![entry.id]))
            .await
            .unwrap();
        fx.take_events().await;

        fx.controller.delete_group_by_id(group.id).await.unwrap();
        let events = fx.take_events().await;
        assert_eq!(
            event_names(&events),
            vec![
                "intel-delivery-attempt-status-updated",
                "intel-delivery-status-updated",
                "address-book-entry-channels-updated"
            ]
        );
        assert_eq!(
            events[2],
            Event::AddressBookEntryChannelsUpdated {
                entry: entry.id,
                channels: Vec::new(),
            }
        );
    }
}
