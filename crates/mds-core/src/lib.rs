// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the MDS intel-delivery engine.
//!
//! Provides the error type, the domain types shared by the logistics and
//! radio-delivery services, the event vocabulary exchanged over the bus, and
//! the trait seams to external collaborators.

pub mod error;
pub mod event;
pub mod traits;
pub mod types;

pub use error::{Details, ErrorKind, MdsError};
pub use event::{Event, EventEnvelope};
pub use traits::{Connection, EventPublisher};
pub use types::{
    AcceptedIntelDeliveryAttempt, AddressBookEntry, Channel, ChannelDetails, ChannelType,
    CreateIntel, Group, Intel, IntelAssignment, IntelDelivery, IntelDeliveryAttempt,
    IntelDeliveryStatus, IntelType, Operation, RadioChannel, RadioDelivery, User,
};
