// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the engine and its collaborators.
//!
//! Async traits use `#[async_trait]` for dynamic dispatch compatibility.

pub mod connection;
pub mod publisher;

pub use connection::Connection;
pub use publisher::EventPublisher;
