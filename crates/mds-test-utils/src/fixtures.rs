// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builders for master data and requests used across integration tests.

use std::time::Duration;

use chrono::Utc;
use mds_core::{AddressBookEntry, Channel, ChannelDetails, CreateIntel, IntelType, Operation, User};
use serde_json::json;
use uuid::Uuid;

pub fn user(username: &str) -> User {
    User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        first_name: username.to_string(),
        last_name: "Tester".to_string(),
        is_active: true,
    }
}

pub fn operation(title: &str) -> Operation {
    Operation {
        id: Uuid::new_v4(),
        title: title.to_string(),
        description: String::new(),
        start: Utc::now(),
        end: None,
        is_archived: false,
    }
}

/// Entry in `operation` with a nil id, so creation assigns one.
pub fn entry(operation: Uuid, label: &str) -> AddressBookEntry {
    AddressBookEntry {
        id: Uuid::nil(),
        label: label.to_string(),
        description: String::new(),
        operation: Some(operation),
        user: None,
    }
}

/// Active channel with a nil id and a one minute timeout. The entry is set
/// when the channel list is applied.
pub fn channel(priority: i32, details: ChannelDetails) -> Channel {
    Channel {
        id: Uuid::nil(),
        entry: Uuid::nil(),
        label: format!("{:?} {priority}", details.channel_type()),
        priority,
        min_importance: 0,
        timeout: Duration::from_secs(60),
        is_active: true,
        details,
    }
}

pub fn direct(info: &str) -> ChannelDetails {
    ChannelDetails::Direct { info: info.to_string() }
}

pub fn email(address: &str) -> ChannelDetails {
    ChannelDetails::Email {
        email: address.to_string(),
    }
}

pub fn radio(info: &str) -> ChannelDetails {
    ChannelDetails::Radio { info: info.to_string() }
}

/// Plaintext intel request assigned to `to`.
pub fn plaintext_intel(created_by: Uuid, operation: Uuid, importance: i32, to: Vec<Uuid>) -> CreateIntel {
    CreateIntel {
        created_by,
        operation,
        intel_type: IntelType::PlaintextMessage,
        content: json!({ "text": "bridge at north gate closed" }),
        importance,
        assignments: to,
    }
}
