// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Logistics service of the MDS delivery engine.
//!
//! Owns intel, address-book entries and their channels, and schedules
//! intel deliveries over those channels. All state changes run in one
//! SQLite transaction each and append their events to the outbox in that
//! same transaction.

pub mod controller;
pub mod eventport;
pub mod migrations;
pub mod notifier;
pub mod store;

pub use controller::Controller;
pub use controller::operations::MembershipChange;
pub use eventport::EventPort;
pub use migrations::run_migrations;
pub use store::entries::EntryFilters;
pub use store::intel::IntelFilters;
