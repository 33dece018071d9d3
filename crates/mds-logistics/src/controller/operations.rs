// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operation mirror and membership.

use std::collections::BTreeSet;

use mds_core::{MdsError, Operation};
use tracing::debug;
use uuid::Uuid;

use super::Controller;
use crate::store::{entries, operations};

/// Outcome of replacing an operation's member set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipChange {
    pub added: Vec<Uuid>,
    pub removed: Vec<Uuid>,
    /// Entries bound to an added or removed user. Their visibility changed.
    pub affected_entries: Vec<Uuid>,
}

impl MembershipChange {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

impl Controller {
    pub async fn create_operation(&self, create: Operation) -> Result<(), MdsError> {
        self.run_in_tx(move |tx, _| operations::create_operation(tx, &create))
            .await
    }

    pub async fn update_operation(&self, update: Operation) -> Result<(), MdsError> {
        self.run_in_tx(move |tx, _| operations::update_operation(tx, &update))
            .await
    }

    /// Replace the members of an operation.
    pub async fn update_operation_members(
        &self,
        operation_id: Uuid,
        members: Vec<Uuid>,
    ) -> Result<MembershipChange, MdsError> {
        self.run_in_tx(move |tx, _| {
            let previous: BTreeSet<Uuid> = operations::update_operation_members(tx, operation_id, &members)?
                .into_iter()
                .collect();
            let next: BTreeSet<Uuid> = members.into_iter().collect();
            let mut change = MembershipChange {
                added: next.difference(&previous).copied().collect(),
                removed: previous.difference(&next).copied().collect(),
                affected_entries: Vec::new(),
            };
            for user in change.added.iter().chain(&change.removed) {
                change.affected_entries.extend(entries::entry_ids_by_user(tx, *user)?);
            }
            change.affected_entries.sort();
            change.affected_entries.dedup();
            debug!(
                %operation_id,
                added = change.added.len(),
                removed = change.removed.len(),
                affected_entries = change.affected_entries.len(),
                "operation members updated"
            );
            Ok(change)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::testing::Fixture;

    #[tokio::test]
    async fn membership_diff_reports_affected_entries() {
        let fx = Fixture::new().await;
        let joining = Uuid::new_v4();
        let entry = fx.entry(Some(joining)).await;

        let change = fx
            .controller
            .update_operation_members(fx.operation, vec![joining])
            .await
            .unwrap();
        assert_eq!(change.added, vec![joining]);
        assert_eq!(change.removed, vec![fx.creator]);
        assert_eq!(change.affected_entries, vec![entry.id]);

        let unchanged = fx
            .controller
            .update_operation_members(fx.operation, vec![joining])
            .await
            .unwrap();
        assert!(unchanged.is_empty());
    }
}
