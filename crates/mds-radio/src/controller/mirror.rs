// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mirrors of users, operation members and radio channels.

use mds_core::{MdsError, RadioChannel, User};
use tracing::debug;
use uuid::Uuid;

use super::Controller;
use crate::store::{channels, operations, users};

impl Controller {
    pub async fn create_user(&self, create: User) -> Result<(), MdsError> {
        self.run_in_tx(move |tx, _| users::create_user(tx, &create))
            .await
    }

    pub async fn update_user(&self, update: User) -> Result<(), MdsError> {
        self.run_in_tx(move |tx, _| users::update_user(tx, &update))
            .await
    }

    /// Replace the members of an operation and re-resolve which live
    /// connections belong to which operation.
    pub async fn update_operation_members(&self, operation: Uuid, members: Vec<Uuid>) -> Result<(), MdsError> {
        self.run_in_tx(move |tx, _| operations::update_operation_members(tx, operation, &members))
            .await?;
        self.multiplexer.reassign().await;
        Ok(())
    }

    /// Replace the radio channels of an entry.
    pub async fn update_radio_channels_by_entry(&self, entry: Uuid, create: Vec<RadioChannel>) -> Result<(), MdsError> {
        self.run_in_tx(move |tx, _| {
            let removed = channels::delete_radio_channels_by_entry(tx, entry)?;
            for channel in &create {
                if channel.entry != entry {
                    return Err(MdsError::internal("radio channel entry differs from updated entry")
                        .with_detail("entry_id", entry)
                        .with_detail("channel_entry_id", channel.entry));
                }
                channels::create_radio_channel(tx, channel)?;
            }
            debug!(entry_id = %entry, removed, created = create.len(), "radio channels updated");
            Ok(())
        })
        .await
    }

    pub async fn delete_radio_channels_by_entry(&self, entry: Uuid) -> Result<(), MdsError> {
        self.run_in_tx(move |tx, _| channels::delete_radio_channels_by_entry(tx, entry).map(|_| ()))
            .await
    }

    pub async fn radio_channels_by_entry(&self, entry: Uuid) -> Result<Vec<RadioChannel>, MdsError> {
        self.run_in_tx(move |tx, _| channels::radio_channels_by_entry(tx, entry))
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::controller::testing::Fixture;
    use crate::multiplexer::testing::RecordingConnection;

    fn radio(entry: Uuid, label: &str) -> RadioChannel {
        RadioChannel {
            id: Uuid::new_v4(),
            entry,
            label: label.into(),
            timeout: Duration::from_secs(120),
            info: "channel 7".into(),
        }
    }

    #[tokio::test]
    async fn channel_update_replaces_entry_channels() {
        let fx = Fixture::new().await;
        let entry = Uuid::new_v4();
        fx.controller
            .update_radio_channels_by_entry(entry, vec![radio(entry, "a"), radio(entry, "b")])
            .await
            .unwrap();
        let replacement = radio(entry, "c");
        fx.controller
            .update_radio_channels_by_entry(entry, vec![replacement.clone()])
            .await
            .unwrap();
        assert_eq!(
            fx.controller.radio_channels_by_entry(entry).await.unwrap(),
            vec![replacement]
        );

        let err = fx
            .controller
            .update_radio_channels_by_entry(entry, vec![radio(Uuid::new_v4(), "x")])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), mds_core::ErrorKind::Internal);

        fx.controller.delete_radio_channels_by_entry(entry).await.unwrap();
        assert!(fx.controller.radio_channels_by_entry(entry).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn member_update_reassigns_connections() {
        let fx = Fixture::new().await;
        let newcomer = Uuid::new_v4();
        let conn = RecordingConnection::new(newcomer);
        fx.controller.multiplexer().accept(conn.clone()).await;

        fx.controller.multiplexer().notify(&[fx.operation]).await;
        assert!(conn.notified().is_empty());

        fx.controller
            .update_operation_members(fx.operation, vec![fx.operator, newcomer])
            .await
            .unwrap();
        fx.controller.multiplexer().notify(&[fx.operation]).await;
        assert_eq!(conn.notified(), vec![fx.operation]);
    }
}
