// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded logistics schema migrations.

use mds_core::MdsError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Run all pending logistics migrations. Matches [`mds_storage::Migrate`].
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), MdsError> {
    embedded::migrations::runner()
        .run(conn)
        .map_err(|e| MdsError::Storage {
            source: Box::new(e),
        })?;
    Ok(())
}
