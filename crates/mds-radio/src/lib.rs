// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Radio-delivery service of the MDS delivery engine.
//!
//! Accepts intel-delivery attempts on radio channels for human handling,
//! hands them to radio operators by pickup, releases stalled pickups and
//! reports results back over the bus. Connected operators are told about
//! new offers through the [`Multiplexer`].

pub mod controller;
pub mod eventport;
pub mod migrations;
pub mod multiplexer;
pub mod notifier;
pub mod pickup;
pub mod store;

pub use controller::Controller;
pub use eventport::EventPort;
pub use migrations::run_migrations;
pub use multiplexer::Multiplexer;
pub use pickup::{PickupOrder, next_to_pick_up};
pub use store::deliveries::ActiveRadioDelivery;
