// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-type intel payloads and their validation.

use mds_core::{IntelType, MdsError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::validation::ValidationReport;

/// Payload of [`IntelType::PlaintextMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextMessageContent {
    pub text: String,
}

/// Payload of [`IntelType::AnalogRadioMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalogRadioMessageContent {
    /// Radio channel used for the communication.
    pub channel: String,
    /// Callsign of the sender.
    pub callsign: String,
    pub head: String,
    pub content: String,
}

/// A payload that can check its own fields.
pub trait ValidateContent {
    fn validate(&self) -> ValidationReport;
}

impl ValidateContent for PlaintextMessageContent {
    fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();
        if self.text.is_empty() {
            report.add_error("text content must not be empty");
        }
        report
    }
}

impl ValidateContent for AnalogRadioMessageContent {
    fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();
        if self.callsign.is_empty() {
            report.add_error("missing callsign");
        }
        if self.content.is_empty() {
            report.add_error("missing content");
        }
        report
    }
}

/// Decode a raw payload as `T`. Decoding failures are bad input.
pub fn decode<T: DeserializeOwned>(raw: &Value) -> Result<T, MdsError> {
    T::deserialize(raw).map_err(|e| {
        MdsError::bad_input("parse content")
            .with_detail("error", e)
            .with_detail("raw", raw)
    })
}

fn decode_and_validate<T: DeserializeOwned + ValidateContent>(raw: &Value) -> ValidationReport {
    match T::deserialize(raw) {
        Ok(content) => content.validate(),
        Err(e) => {
            let mut report = ValidationReport::default();
            report.add_error(format!("invalid message content: {e}"));
            report
        }
    }
}

/// Validate a raw payload against the decoder for its type.
pub fn validate_content(intel_type: IntelType, raw: &Value) -> ValidationReport {
    match intel_type {
        IntelType::PlaintextMessage => decode_and_validate::<PlaintextMessageContent>(raw),
        IntelType::AnalogRadioMessage => decode_and_validate::<AnalogRadioMessageContent>(raw),
    }
}
