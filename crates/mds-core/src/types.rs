// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the logistics and radio-delivery services.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user as mirrored from the upstream master-data service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub is_archived: bool,
}

/// A group of users. Members keep their insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub operation: Option<Uuid>,
    pub members: Vec<Uuid>,
}

/// A logical recipient of intel.
///
/// An entry is visible by a user iff it has no associated user, or the
/// associated user shares at least one operation with the viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBookEntry {
    pub id: Uuid,
    pub label: String,
    pub description: String,
    pub operation: Option<Uuid>,
    pub user: Option<Uuid>,
}

/// The closed set of channel types.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ChannelType {
    Direct,
    Email,
    Phone,
    Radio,
    InAppNotification,
    Push,
    ForwardToUser,
    ForwardToGroup,
}

/// Type-specific channel details. The variant determines the channel type,
/// so details and type can never disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "details", rename_all = "kebab-case")]
pub enum ChannelDetails {
    Direct { info: String },
    Email { email: String },
    Phone { phone: String },
    Radio { info: String },
    InAppNotification,
    Push,
    ForwardToUser { users: Vec<Uuid> },
    ForwardToGroup { groups: Vec<Uuid> },
}

impl ChannelDetails {
    pub fn channel_type(&self) -> ChannelType {
        match self {
            Self::Direct { .. } => ChannelType::Direct,
            Self::Email { .. } => ChannelType::Email,
            Self::Phone { .. } => ChannelType::Phone,
            Self::Radio { .. } => ChannelType::Radio,
            Self::InAppNotification => ChannelType::InAppNotification,
            Self::Push => ChannelType::Push,
            Self::ForwardToUser { .. } => ChannelType::ForwardToUser,
            Self::ForwardToGroup { .. } => ChannelType::ForwardToGroup,
        }
    }
}

/// A typed, prioritized means of contacting an address-book entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: Uuid,
    pub entry: Uuid,
    pub label: String,
    /// Higher wins.
    pub priority: i32,
    pub min_importance: i32,
    pub timeout: Duration,
    pub is_active: bool,
    #[serde(flatten)]
    pub details: ChannelDetails,
}

impl Channel {
    pub fn channel_type(&self) -> ChannelType {
        self.details.channel_type()
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum IntelType {
    PlaintextMessage,
    AnalogRadioMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntelAssignment {
    pub id: Uuid,
    pub intel: Uuid,
    pub to: Uuid,
}

/// A typed message authored for an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intel {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub created_by: Uuid,
    pub operation: Uuid,
    pub intel_type: IntelType,
    /// Opaque payload; only the validator and search-text generator look
    /// inside.
    pub content: serde_json::Value,
    pub search_text: Option<String>,
    pub importance: i32,
    pub is_valid: bool,
    pub assignments: Vec<IntelAssignment>,
}

/// Input for creating intel. `assignments` lists the address-book entries
/// to deliver to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateIntel {
    pub created_by: Uuid,
    pub operation: Uuid,
    pub intel_type: IntelType,
    pub content: serde_json::Value,
    pub importance: i32,
    pub assignments: Vec<Uuid>,
}

/// Runtime state of handing one intel to one assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntelDelivery {
    pub id: Uuid,
    pub intel: Uuid,
    pub to: Uuid,
    pub is_active: bool,
    pub success: bool,
    pub note: Option<String>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum IntelDeliveryStatus {
    Open,
    AwaitingDelivery,
    Delivering,
    AwaitingAck,
    Delivered,
    Timeout,
    Canceled,
    Failed,
}

impl IntelDeliveryStatus {
    /// Whether an attempt in this status is still being worked on.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Open | Self::AwaitingDelivery | Self::Delivering | Self::AwaitingAck
        )
    }
}

/// A single attempt to transport a delivery via one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntelDeliveryAttempt {
    pub id: Uuid,
    pub delivery: Uuid,
    pub channel: Uuid,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
    pub status: IntelDeliveryStatus,
    pub status_ts: DateTime<Utc>,
    pub note: Option<String>,
}

/// Attempt projection kept by the radio side, enriched with the intel and
/// assignee data needed to rank and display it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedIntelDeliveryAttempt {
    pub id: Uuid,
    pub intel: Uuid,
    pub intel_operation: Uuid,
    pub intel_importance: i32,
    pub assigned_to: Uuid,
    pub assigned_to_label: String,
    pub assigned_to_user: Option<Uuid>,
    pub delivery: Uuid,
    pub channel: Uuid,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
    pub status: IntelDeliveryStatus,
    pub status_ts: DateTime<Utc>,
    pub note: Option<String>,
    pub accepted_at: DateTime<Utc>,
}

/// Handling record for an accepted radio attempt.
///
/// `picked_up_by` and `picked_up_at` are always set together. Once
/// `success` is set the delivery is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioDelivery {
    pub attempt: Uuid,
    pub picked_up_by: Option<Uuid>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub success: Option<bool>,
    pub success_ts: Option<DateTime<Utc>>,
    pub note: String,
}

impl RadioDelivery {
    pub fn is_active(&self) -> bool {
        self.success.is_none()
    }
}

/// Radio-side mirror of a radio channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioChannel {
    pub id: Uuid,
    pub entry: Uuid,
    pub label: String,
    pub timeout: Duration,
    pub info: String,
}

#[cfg(feature = "sqlite")]
mod sql {
    use std::str::FromStr;

    use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

    use super::{ChannelType, IntelDeliveryStatus, IntelType};

    macro_rules! text_enum_sql {
        ($($ty:ty),+) => {$(
            impl ToSql for $ty {
                fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                    Ok(ToSqlOutput::from(self.to_string()))
                }
            }

            impl FromSql for $ty {
                fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    let s = value.as_str()?;
                    <$ty>::from_str(s).map_err(|e| FromSqlError::Other(Box::new(e)))
                }
            }
        )+};
    }

    text_enum_sql!(ChannelType, IntelDeliveryStatus, IntelType);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_type_follows_details() {
        assert_eq!(
            ChannelDetails::Email {
                email: "a@b.c".into()
            }
            .channel_type(),
            ChannelType::Email
        );
        assert_eq!(
            ChannelDetails::InAppNotification.channel_type(),
            ChannelType::InAppNotification
        );
        assert_eq!(ChannelType::ForwardToGroup.to_string(), "forward-to-group");
    }

    #[test]
    fn channel_serializes_type_next_to_details() {
        let channel = Channel {
            id: Uuid::nil(),
            entry: Uuid::nil(),
            label: "desk".into(),
            priority: 10,
            min_importance: 0,
            timeout: Duration::from_secs(60),
            is_active: true,
            details: ChannelDetails::Direct {
                info: "room 4".into(),
            },
        };
        let json = serde_json::to_value(&channel).unwrap();
        assert_eq!(json["type"], "direct");
        assert_eq!(json["details"]["info"], "room 4");
        let back: Channel = serde_json::from_value(json).unwrap();
        assert_eq!(back, channel);
    }

    #[test]
    fn status_strings_match_wire_names() {
        assert_eq!(IntelDeliveryStatus::AwaitingAck.to_string(), "awaiting-ack");
        assert_eq!(
            "awaiting-delivery".parse::<IntelDeliveryStatus>().unwrap(),
            IntelDeliveryStatus::AwaitingDelivery
        );
    }

    #[test]
    fn terminal_statuses_are_inactive() {
        assert!(IntelDeliveryStatus::Delivering.is_active());
        assert!(!IntelDeliveryStatus::Delivered.is_active());
        assert!(!IntelDeliveryStatus::Timeout.is_active());
        assert!(!IntelDeliveryStatus::Canceled.is_active());
    }
}
