// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the MDS delivery engine.
//!
//! Provides WAL-mode SQLite storage with per-service embedded migrations, a
//! single-writer transaction model via `tokio-rusqlite`, and the
//! transactional outbox that makes event emission atomic with the state
//! change producing it.

pub mod database;
pub mod outbox;

pub use database::{Database, Migrate, map_tr_err};
pub use outbox::OutboxRelay;
