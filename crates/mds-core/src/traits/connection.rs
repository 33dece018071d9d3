// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live operator connection trait.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::MdsError;

/// A live connection to a radio operator, able to receive "new offer
/// available" notifications.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Id of the user the connection is established to.
    fn user_id(&self) -> Uuid;

    /// Notifies that new offers might be available for the given operation.
    async fn notify_new_available(&self, operation: Uuid) -> Result<(), MdsError>;

    /// Cancelled when the connection closes. Implementations must cancel it
    /// eventually, otherwise the connection is never released.
    fn lifetime(&self) -> CancellationToken;
}
