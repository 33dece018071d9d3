// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for MDS integration tests.
//!
//! Provides a full two-service harness and mock operator connections for
//! fast, deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`TestHarness`] - Both services on temp storage and one in-process bus
//! - [`MockConnection`] - Live connection capturing notifications
//! - [`fixtures`] - Builders for master data, channels and intel requests

pub mod fixtures;
pub mod harness;
pub mod mock_connection;

pub use harness::{TestHarness, eventually};
pub use mock_connection::MockConnection;
