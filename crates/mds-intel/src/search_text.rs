// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Search-text generation for intel payloads.

use mds_core::{IntelType, MdsError};
use serde_json::Value;

use crate::content::{self, AnalogRadioMessageContent, PlaintextMessageContent};

/// Derive the search string for a payload of the given type.
pub fn generate(intel_type: IntelType, raw: &Value) -> Result<Option<String>, MdsError> {
    match intel_type {
        IntelType::PlaintextMessage => {
            let content: PlaintextMessageContent = content::decode(raw)?;
            Ok(Some(content.text))
        }
        IntelType::AnalogRadioMessage => {
            let content: AnalogRadioMessageContent = content::decode(raw)?;
            Ok(Some(join_non_empty(&[
                &content.channel,
                &content.callsign,
                &content.head,
                &content.content,
            ])))
        }
    }
}

fn join_non_empty(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plaintext_yields_text() {
        let text = generate(IntelType::PlaintextMessage, &json!({"text": "road blocked"})).unwrap();
        assert_eq!(text.as_deref(), Some("road blocked"));
    }

    #[test]
    fn analog_radio_concatenates_human_fields() {
        let text = generate(
            IntelType::AnalogRadioMessage,
            &json!({"channel": "ch 4", "callsign": "Florian 1", "head": "", "content": "need water"}),
        )
        .unwrap();
        assert_eq!(text.as_deref(), Some("ch 4 Florian 1 need water"));
    }
}
