// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the MDS delivery engine.
//!
//! Callers only ever observe one of four kinds (see [`ErrorKind`]) together
//! with a message and a key-value detail bag. Storage and configuration
//! failures are internal from the caller's point of view.

use std::collections::BTreeMap;
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Key-value context attached to an error.
pub type Details = BTreeMap<String, String>;

/// The standardized error kinds surfaced to callers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    NotFound,
    BadInput,
    Forbidden,
    Internal,
}

/// The primary error type used across all MDS crates.
#[derive(Debug, Error)]
pub enum MdsError {
    /// A row that a read expected is absent.
    #[error("not found: {message}")]
    NotFound { message: String, details: Details },

    /// Caller-supplied data violates a precondition.
    #[error("bad input: {message}")]
    BadInput { message: String, details: Details },

    /// An authorization precondition does not hold.
    #[error("forbidden: {message}")]
    Forbidden { message: String, details: Details },

    /// An internal invariant was violated.
    #[error("internal error: {message}")]
    Internal { message: String, details: Details },

    /// Storage backend errors (connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration errors.
    #[error("configuration error: {0}")]
    Config(String),
}

impl MdsError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            details: Details::new(),
        }
    }

    pub fn bad_input(message: impl Into<String>) -> Self {
        Self::BadInput {
            message: message.into(),
            details: Details::new(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
            details: Details::new(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            details: Details::new(),
        }
    }

    /// Attach a detail to the error. Storage and config errors carry no
    /// detail bag and are returned unchanged.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Display) -> Self {
        if let Some(details) = self.details_mut() {
            details.insert(key.into(), value.to_string());
        }
        self
    }

    /// The kind visible to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::BadInput { .. } => ErrorKind::BadInput,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::Internal { .. } | Self::Storage { .. } | Self::Config(_) => ErrorKind::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// The detail bag, empty for storage and config errors.
    pub fn details(&self) -> Details {
        match self {
            Self::NotFound { details, .. }
            | Self::BadInput { details, .. }
            | Self::Forbidden { details, .. }
            | Self::Internal { details, .. } => details.clone(),
            Self::Storage { .. } | Self::Config(_) => Details::new(),
        }
    }

    fn details_mut(&mut self) -> Option<&mut Details> {
        match self {
            Self::NotFound { details, .. }
            | Self::BadInput { details, .. }
            | Self::Forbidden { details, .. }
            | Self::Internal { details, .. } => Some(details),
            Self::Storage { .. } | Self::Config(_) => None,
        }
    }
}

impl From<serde_json::Error> for MdsError {
    fn from(e: serde_json::Error) -> Self {
        MdsError::internal("json encoding").with_detail("error", e)
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for MdsError {
    fn from(e: rusqlite::Error) -> Self {
        MdsError::Storage {
            source: Box::new(e),
        }
    }
}
