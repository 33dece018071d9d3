// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Intel validation and assignment authorization.
//!
//! - [`content`] decodes and validates intel payloads per type.
//! - [`search_text`] derives the searchable string for a payload.
//! - [`validation`] validates a whole [`CreateIntel`](mds_core::CreateIntel).
//! - [`authorizer`] runs the create / invalidate / read contracts against a
//!   caller-supplied transaction.

pub mod authorizer;
pub mod content;
pub mod search_text;
pub mod validation;

pub use authorizer::{IntelDirectory, IntelNotifier, create_intel, intel_by_id, invalidate_intel};
pub use validation::{ValidationReport, validate_create_intel};
