// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Address-book entries and their auto-delivery flag.

use chrono::{DateTime, Utc};
use mds_core::{AddressBookEntry, MdsError};
use mds_intel::ValidationReport;
use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use super::Controller;
use super::channels::remove_channels;
use crate::notifier;
use crate::store::entries::{self, EntryFilters};
use crate::store::{channels, deliveries};

const NOTE_ENTRY_DELETED: &str = "address book entry deleted";

fn validate_entry(entry: &AddressBookEntry) -> ValidationReport {
    let mut report = ValidationReport::default();
    if entry.label.trim().is_empty() {
        report.add_error("missing label");
    }
    report
}

/// Load an entry for modification. With `limit_to_user`, entries bound to
/// another user read as not-found.
fn entry_for_user(conn: &Connection, id: Uuid, limit_to_user: Option<Uuid>) -> Result<AddressBookEntry, MdsError> {
    let entry = entries::entry_by_id(conn, id, None)?;
    if let Some(user) = limit_to_user
        && entry.user != Some(user)
    {
        return Err(MdsError::not_found("address book entry not found")
            .with_detail("entry_id", id)
            .with_detail("limit_to_user", user));
    }
    Ok(entry)
}

/// Delete an entry with its channels. Active deliveries to it fail, as no
/// channel is left to reach it.
fn delete_entry(conn: &Connection, id: Uuid, now: DateTime<Utc>) -> Result<(), MdsError> {
    let channel_ids: Vec<Uuid> = channels::channels_by_entry(conn, id)?
        .into_iter()
        .map(|c| c.id)
        .collect();
    remove_channels(conn, &channel_ids, now)?;

    for delivery in deliveries::active_deliveries(conn)?.into_iter().filter(|d| d.to == id) {
        deliveries::update_delivery_status(conn, delivery.id, false, false, Some(NOTE_ENTRY_DELETED))?;
        notifier::intel_delivery_status_updated(
            conn,
            delivery.id,
            false,
            false,
            Some(NOTE_ENTRY_DELETED.to_string()),
        )?;
    }

    entries::delete_entry(conn, id)?;
    notifier::address_book_entry_deleted(conn, id)
}

impl Controller {
    pub async fn create_address_book_entry(&self, mut create: AddressBookEntry) -> Result<AddressBookEntry, MdsError> {
        validate_entry(&create).into_result("address book entry")?;
        if create.id.is_nil() {
            create.id = Uuid::new_v4();
        }
        self.run_in_tx(move |tx, _| {
            entries::create_entry(tx, &create)?;
            notifier::address_book_entry_created(tx, &create)?;
            debug!(entry_id = %create.id, "address book entry created");
            Ok(create)
        })
        .await
    }

    pub async fn update_address_book_entry(
        &self,
        update: AddressBookEntry,
        limit_to_user: Option<Uuid>,
    ) -> Result<(), MdsError> {
        validate_entry(&update).into_result("address book entry")?;
        self.run_in_tx(move |tx, _| {
            entry_for_user(tx, update.id, limit_to_user)?;
            entries::update_entry(tx, &update)?;
            notifier::address_book_entry_updated(tx, &update)
        })
        .await
    }

    /// Delete an entry. Its channels go through the same cancel path as a
    /// channel update.
    pub async fn delete_address_book_entry_by_id(&self, id: Uuid, limit_to_user: Option<Uuid>) -> Result<(), MdsError> {
        self.run_in_tx(move |tx, now| {
            entry_for_user(tx, id, limit_to_user)?;
            delete_entry(tx, id, now)
        })
        .await
    }

    pub async fn address_book_entry_by_id(
        &self,
        id: Uuid,
        visible_by: Option<Uuid>,
    ) -> Result<AddressBookEntry, MdsError> {
        self.run_in_tx(move |tx, _| entries::entry_by_id(tx, id, visible_by))
            .await
    }

    pub async fn address_book_entries(&self, filters: EntryFilters) -> Result<Vec<AddressBookEntry>, MdsError> {
        self.run_in_tx(move |tx, _| entries::entries(tx, &filters)).await
    }

    pub async fn is_auto_intel_delivery_enabled_for_entry(&self, entry_id: Uuid) -> Result<bool, MdsError> {
        self.run_in_tx(move |tx, _| {
            if !entries::entry_exists(tx, entry_id)? {
                return Err(MdsError::not_found("address book entry not found").with_detail("entry_id", entry_id));
            }
            entries::is_auto_delivery_enabled(tx, entry_id)
        })
        .await
    }

    pub async fn set_auto_intel_delivery_enabled_for_entry(&self, entry_id: Uuid, enabled: bool) -> Result<(), MdsError> {
        self.run_in_tx(move |tx, _| {
            entries::set_auto_delivery_enabled(tx, entry_id, enabled)?;
            notifier::address_book_entry_auto_delivery_updated(tx, entry_id, enabled)
        })
        .await
    }

    /// Replace the set of entries with auto delivery enabled. Every listed
    /// entry is announced as enabled, every dropped one as disabled.
    pub async fn set_address_book_entries_with_auto_delivery_enabled(&self, entry_ids: Vec<Uuid>) -> Result<(), MdsError> {
        self.run_in_tx(move |tx, _| {
            let disabled = entries::set_entries_with_auto_delivery_enabled(tx, &entry_ids)?;
            for entry in &entry_ids {
                notifier::address_book_entry_auto_delivery_updated(tx, *entry, true)?;
            }
            for entry in disabled {
                notifier::address_book_entry_auto_delivery_updated(tx, entry, false)?;
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::testing::{Fixture, direct, event_names};
    use mds_core::{ErrorKind, Event};

    fn new_entry(user: Option<Uuid>) -> AddressBookEntry {
        AddressBookEntry {
            id: Uuid::nil(),
            label: "Water rescue".into(),
            description: "boat 2".into(),
            operation: None,
            user,
        }
    }

    #[tokio::test]
    async fn create_assigns_id_and_emits() {
        let fx = Fixture::new().await;
        let created = fx
            .controller
            .create_address_book_entry(new_entry(None))
            .await
            .unwrap();
        assert!(!created.id.is_nil());
        assert_eq!(fx.take_events().await, vec![Event::AddressBookEntryCreated(created.clone())]);
        assert!(
            fx.controller
                .is_auto_intel_delivery_enabled_for_entry(created.id)
                .await
                .unwrap()
        );

        let mut blank = new_entry(None);
        blank.label = "  ".into();
        let err = fx.controller.create_address_book_entry(blank).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadInput);
    }

    #[tokio::test]
    async fn limited_update_and_delete_hide_foreign_entries() {
        let fx = Fixture::new().await;
        let owner = Uuid::new_v4();
        let created = fx
            .controller
            .create_address_book_entry(new_entry(Some(owner)))
            .await
            .unwrap();

        let mut update = created.clone();
        update.label = "Boat 2".into();
        let err = fx
            .controller
            .update_address_book_entry(update.clone(), Some(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        fx.controller
            .update_address_book_entry(update.clone(), Some(owner))
            .await
            .unwrap();
        assert_eq!(
            fx.controller.address_book_entry_by_id(created.id, None).await.unwrap(),
            update
        );

        let err = fx
            .controller
            .delete_address_book_entry_by_id(created.id, Some(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        fx.controller
            .delete_address_book_entry_by_id(created.id, Some(owner))
            .await
            .unwrap();
        assert!(
            fx.controller
                .address_book_entry_by_id(created.id, None)
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn deleting_entry_cancels_attempts_and_fails_deliveries() {
        let fx = Fixture::new().await;
        let entry = fx.entry(None).await;
        fx.channel(entry.id, 10, direct()).await;
        fx.controller
            .create_intel(fx.create_intel(10, vec![entry.id]))
            .await
            .unwrap();
        fx.take_events().await;

        fx.controller
            .delete_address_book_entry_by_id(entry.id, None)
            .await
            .unwrap();
        let events = fx.take_events().await;
        assert_eq!(
            event_names(&events),
            vec![
                "intel-delivery-attempt-status-updated",
                "intel-delivery-status-updated",
                "address-book-entry-deleted"
            ]
        );
        let Event::IntelDeliveryStatusUpdated { note, success, .. } = &events[1] else {
            panic!("unexpected event {:?}", events[1]);
        };
        assert!(!success);
        assert_eq!(note.as_deref(), Some("address book entry deleted"));
    }

    #[tokio::test]
    async fn replacing_auto_delivery_set_announces_changes() {
        let fx = Fixture::new().await;
        let a = fx.entry(None).await;
        let b = fx.entry(None).await;

        fx.controller
            .set_address_book_entries_with_auto_delivery_enabled(vec![a.id])
            .await
            .unwrap();
        let events = fx.take_events().await;
        assert_eq!(
            events,
            vec![
                Event::AddressBookEntryAutoDeliveryUpdated {
                    entry: a.id,
                    enabled: true
                },
                Event::AddressBookEntryAutoDeliveryUpdated {
                    entry: b.id,
                    enabled: false
                },
            ]
        );
        assert!(!fx.controller.is_auto_intel_delivery_enabled_for_entry(b.id).await.unwrap());

        let err = fx
            .controller
            .set_address_book_entries_with_auto_delivery_enabled(vec![Uuid::new_v4()])
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
