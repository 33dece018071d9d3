// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Intel creation, invalidation and retrieval.

use chrono::{DateTime, Utc};
use mds_core::{CreateIntel, Intel, MdsError};
use mds_intel::{IntelDirectory, IntelNotifier, authorizer};
use rusqlite::Connection;
use uuid::Uuid;

use super::Controller;
use super::delivery::schedule_deliveries_for_intel;
use crate::notifier;
use crate::store::intel::IntelFilters;
use crate::store::{entries, intel, operations};

/// Directory and notifier bound to one open transaction.
struct TxDirectory<'a> {
    conn: &'a Connection,
    now: DateTime<Utc>,
}

impl IntelDirectory for TxDirectory<'_> {
    fn is_operation_member(&self, operation: Uuid, user: Uuid) -> Result<bool, MdsError> {
        operations::is_operation_member(self.conn, operation, user)
    }

    fn address_book_entry_exists(&self, entry: Uuid) -> Result<bool, MdsError> {
        entries::entry_exists(self.conn, entry)
    }

    fn create_intel(&self, create: &CreateIntel, search_text: Option<String>) -> Result<Intel, MdsError> {
        intel::create_intel(self.conn, create, search_text, self.now)
    }

    fn intel_by_id(&self, id: Uuid) -> Result<Intel, MdsError> {
        intel::intel_by_id(self.conn, id)
    }

    fn invalidate_intel(&self, id: Uuid) -> Result<(), MdsError> {
        intel::invalidate_intel(self.conn, id)
    }
}

impl IntelNotifier for TxDirectory<'_> {
    fn notify_intel_created(&self, created: &Intel) -> Result<(), MdsError> {
        notifier::intel_created(self.conn, created)
    }

    fn notify_intel_invalidated(&self, id: Uuid, by: Uuid) -> Result<(), MdsError> {
        notifier::intel_invalidated(self.conn, id, by)
    }
}

/// Restrict filters to intel delivered to entries of `user`. `None` means
/// the user has no entries and must see nothing.
fn limit_filters_to_user(
    conn: &Connection,
    mut filters: IntelFilters,
    user: Uuid,
) -> Result<Option<IntelFilters>, MdsError> {
    let user_entries = entries::entry_ids_by_user(conn, user)?;
    if user_entries.is_empty() {
        return Ok(None);
    }
    filters
        .one_of_delivery_for_entries
        .retain(|entry| user_entries.contains(entry));
    if filters.one_of_delivery_for_entries.is_empty() {
        filters.one_of_delivery_for_entries = user_entries;
    }
    Ok(Some(filters))
}

impl Controller {
    /// Create intel and schedule one delivery per assignment, all in one
    /// transaction.
    pub async fn create_intel(&self, create: CreateIntel) -> Result<Intel, MdsError> {
        self.run_in_tx(move |tx, now| {
            let dir = TxDirectory { conn: tx, now };
            let created = authorizer::create_intel(&dir, &dir, &create)?;
            schedule_deliveries_for_intel(tx, created.id, now)?;
            Ok(created)
        })
        .await
    }

    /// Invalidate intel on behalf of `by`, who must be a member of the
    /// intel's operation.
    pub async fn invalidate_intel_by_id(&self, intel_id: Uuid, by: Uuid) -> Result<(), MdsError> {
        self.run_in_tx(move |tx, now| {
            let dir = TxDirectory { conn: tx, now };
            authorizer::invalidate_intel(&dir, &dir, intel_id, by)
        })
        .await
    }

    /// Intel by id. With `limit_to_user`, the user must be bound to one of
    /// the recipient entries.
    pub async fn intel_by_id(&self, intel_id: Uuid, limit_to_user: Option<Uuid>) -> Result<Intel, MdsError> {
        self.run_in_tx(move |tx, now| {
            let dir = TxDirectory { conn: tx, now };
            authorizer::intel_by_id(&dir, intel_id, limit_to_user, |found| {
                intel::users_with_deliveries_by_intel(tx, found.id)
            })
        })
        .await
    }

    /// Intel matching the filters, newest first. With `limit_to_user`, only
    /// intel delivered to one of the user's entries is listed.
    pub async fn intel(&self, filters: IntelFilters, limit_to_user: Option<Uuid>) -> Result<Vec<Intel>, MdsError> {
        self.run_in_tx(move |tx, _| {
            let filters = match limit_to_user {
                Some(user) => match limit_filters_to_user(tx, filters, user)? {
                    Some(limited) => limited,
                    None => return Ok(Vec::new()),
                },
                None => filters,
            };
            intel::intel(tx, &filters)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::testing::{Fixture, event_names};
    use mds_core::ErrorKind;
    use serde_json::json;

    #[tokio::test]
    async fn non_member_cannot_create_and_nothing_is_emitted() {
        let fx = Fixture::new().await;
        let entry = fx.entry(None).await;
        let mut create = fx.create_intel(10, vec![entry.id]);
        create.created_by = Uuid::new_v4();

        let err = fx.controller.create_intel(create).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert!(fx.take_events().await.is_empty());
        assert!(
            fx.controller
                .intel(IntelFilters::default(), None)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn unknown_assignee_is_bad_input() {
        let fx = Fixture::new().await;
        let err = fx
            .controller
            .create_intel(fx.create_intel(10, vec![Uuid::new_v4()]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadInput);
    }

    #[tokio::test]
    async fn empty_text_is_bad_input() {
        let fx = Fixture::new().await;
        let entry = fx.entry(None).await;
        let mut create = fx.create_intel(10, vec![entry.id]);
        create.content = json!({ "text": "" });
        let err = fx.controller.create_intel(create).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadInput);
    }

    #[tokio::test]
    async fn creation_without_channels_fails_delivery_immediately() {
        let fx = Fixture::new().await;
        let entry = fx.entry(None).await;
        let created = fx
            .controller
            .create_intel(fx.create_intel(10, vec![entry.id]))
            .await
            .unwrap();
        assert_eq!(created.search_text.as_deref(), Some("bridge closed"));
        assert_eq!(
            event_names(&fx.take_events().await),
            vec!["intel-created", "intel-delivery-created", "intel-delivery-status-updated"]
        );
    }

    #[tokio::test]
    async fn invalidation_requires_membership() {
        let fx = Fixture::new().await;
        let entry = fx.entry(None).await;
        let created = fx
            .controller
            .create_intel(fx.create_intel(10, vec![entry.id]))
            .await
            .unwrap();

        let err = fx
            .controller
            .invalidate_intel_by_id(created.id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        fx.controller
            .invalidate_intel_by_id(created.id, fx.creator)
            .await
            .unwrap();
        let reloaded = fx.controller.intel_by_id(created.id, None).await.unwrap();
        assert!(!reloaded.is_valid);
        assert!(
            fx.controller
                .intel(IntelFilters::default(), None)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn limited_reads_require_assignment() {
        let fx = Fixture::new().await;
        let recipient = Uuid::new_v4();
        let entry = fx.entry(Some(recipient)).await;
        let other_entry = fx.entry(None).await;
        let created = fx
            .controller
            .create_intel(fx.create_intel(10, vec![entry.id]))
            .await
            .unwrap();
        fx.controller
            .create_intel(fx.create_intel(10, vec![other_entry.id]))
            .await
            .unwrap();

        let read = fx.controller.intel_by_id(created.id, Some(recipient)).await.unwrap();
        assert_eq!(read.id, created.id);
        let err = fx
            .controller
            .intel_by_id(created.id, Some(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let listed = fx
            .controller
            .intel(
                IntelFilters {
                    one_of_delivery_for_entries: vec![other_entry.id],
                    ..Default::default()
                },
                Some(recipient),
            )
            .await
            .unwrap();
        assert_eq!(listed.iter().map(|i| i.id).collect::<Vec<_>>(), vec![created.id]);

        let none = fx
            .controller
            .intel(IntelFilters::default(), Some(Uuid::new_v4()))
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
