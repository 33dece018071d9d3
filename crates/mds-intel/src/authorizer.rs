// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authorization contracts for intel state changes.
//!
//! Each function runs against a caller-supplied directory and notifier that
//! are both bound to one open transaction. Any error aborts the caller's
//! transaction, so nothing is stored or emitted unless every check passed.

use mds_core::{CreateIntel, Intel, MdsError};
use tracing::debug;
use uuid::Uuid;

use crate::{search_text, validate_create_intel};

/// Transaction-bound reads and writes the authorizer needs.
pub trait IntelDirectory {
    fn is_operation_member(&self, operation: Uuid, user: Uuid) -> Result<bool, MdsError>;

    fn address_book_entry_exists(&self, entry: Uuid) -> Result<bool, MdsError>;

    /// Persist new intel together with its assignments.
    fn create_intel(
        &self,
        create: &CreateIntel,
        search_text: Option<String>,
    ) -> Result<Intel, MdsError>;

    /// Fails with not-found when absent.
    fn intel_by_id(&self, intel: Uuid) -> Result<Intel, MdsError>;

    fn invalidate_intel(&self, intel: Uuid) -> Result<(), MdsError>;
}

/// Transaction-bound event emission for intel.
pub trait IntelNotifier {
    fn notify_intel_created(&self, intel: &Intel) -> Result<(), MdsError>;

    fn notify_intel_invalidated(&self, intel: Uuid, by: Uuid) -> Result<(), MdsError>;
}

/// Validate, authorize and persist new intel, then emit `intel-created`.
pub fn create_intel<D, N>(dir: &D, notifier: &N, create: &CreateIntel) -> Result<Intel, MdsError>
where
    D: IntelDirectory + ?Sized,
    N: IntelNotifier + ?Sized,
{
    validate_create_intel(create).into_result("intel")?;

    if !dir.is_operation_member(create.operation, create.created_by)? {
        return Err(MdsError::forbidden("creator is not member of intel operation")
            .with_detail("created_by", create.created_by)
            .with_detail("operation", create.operation));
    }
    for to in &create.assignments {
        if !dir.address_book_entry_exists(*to)? {
            return Err(MdsError::bad_input("assigned address book entry not found")
                .with_detail("entry", to));
        }
    }

    let search_text = search_text::generate(create.intel_type, &create.content)?;
    let intel = dir.create_intel(create, search_text)?;
    notifier.notify_intel_created(&intel)?;
    debug!(intel_id = %intel.id, assignments = intel.assignments.len(), "intel created");
    Ok(intel)
}

/// Mark intel as invalid on behalf of `by` and emit `intel-invalidated`.
pub fn invalidate_intel<D, N>(dir: &D, notifier: &N, intel: Uuid, by: Uuid) -> Result<(), MdsError>
where
    D: IntelDirectory + ?Sized,
    N: IntelNotifier + ?Sized,
{
    let current = dir.intel_by_id(intel)?;
    if !dir.is_operation_member(current.operation, by)? {
        return Err(MdsError::forbidden("user is not member of intel operation")
            .with_detail("user", by)
            .with_detail("operation", current.operation));
    }
    dir.invalidate_intel(intel)?;
    notifier.notify_intel_invalidated(intel, by)
}

/// Read intel. With `limit_to_user`, the user must be assigned to it via an
/// address-book entry.
pub fn intel_by_id<D, F>(
    dir: &D,
    intel: Uuid,
    limit_to_user: Option<Uuid>,
    assigned_users: F,
) -> Result<Intel, MdsError>
where
    D: IntelDirectory + ?Sized,
    F: FnOnce(&Intel) -> Result<Vec<Uuid>, MdsError>,
{
    let found = dir.intel_by_id(intel)?;
    if let Some(user) = limit_to_user
        && !assigned_users(&found)?.contains(&user)
    {
        return Err(MdsError::forbidden("intel not assigned to user")
            .with_detail("intel", intel)
            .with_detail("user", user));
    }
    Ok(found)
}
