// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-type channel details.
//!
//! Each [`ChannelType`] maps to exactly one [`DetailsOperator`] that knows
//! how to validate, store, load and delete the details living in the type's
//! child table. The mapping is a closed `match`, so adding a channel type
//! without an operator does not compile.

use std::collections::HashSet;
use std::sync::LazyLock;

use mds_core::{ChannelDetails, ChannelType, MdsError};
use mds_intel::ValidationReport;
use regex::Regex;
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .unwrap()
});

static E164_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\+[1-9][0-9]{6,14}$").unwrap());

/// Storage and validation for the details of one channel type.
pub trait DetailsOperator: Sync {
    fn validate(&self, details: &ChannelDetails, report: &mut ValidationReport);

    /// Replace the stored details of `channel`.
    fn store(&self, conn: &Connection, channel: Uuid, details: &ChannelDetails) -> Result<(), MdsError>;

    fn load(&self, conn: &Connection, channel: Uuid) -> Result<ChannelDetails, MdsError>;

    fn delete(&self, conn: &Connection, channel: Uuid) -> Result<(), MdsError>;
}

/// Details made of a single text column.
struct TextDetails {
    table: &'static str,
    column: &'static str,
    wrap: fn(String) -> ChannelDetails,
    text: fn(&ChannelDetails) -> Option<&str>,
    check: fn(&str) -> Option<&'static str>,
}

impl TextDetails {
    fn text_of<'a>(&self, details: &'a ChannelDetails) -> Result<&'a str, MdsError> {
        (self.text)(details).ok_or_else(|| {
            MdsError::internal("channel details do not match operator")
                .with_detail("table", self.table)
                .with_detail("type", details.channel_type())
        })
    }
}

impl DetailsOperator for TextDetails {
    fn validate(&self, details: &ChannelDetails, report: &mut ValidationReport) {
        if let Some(problem) = (self.text)(details).and_then(self.check) {
            report.add_error(problem);
        }
    }

    fn store(&self, conn: &Connection, channel: Uuid, details: &ChannelDetails) -> Result<(), MdsError> {
        let text = self.text_of(details)?;
        self.delete(conn, channel)?;
        conn.execute(
            &format!("INSERT INTO {} (channel, {}) VALUES (?1, ?2)", self.table, self.column),
            params![channel, text],
        )?;
        Ok(())
    }

    fn load(&self, conn: &Connection, channel: Uuid) -> Result<ChannelDetails, MdsError> {
        let text: String = conn
            .query_row(
                &format!("SELECT {} FROM {} WHERE channel = ?1", self.column, self.table),
                params![channel],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| {
                MdsError::internal("missing channel details")
                    .with_detail("table", self.table)
                    .with_detail("channel", channel)
            })?;
        Ok((self.wrap)(text))
    }

    fn delete(&self, conn: &Connection, channel: Uuid) -> Result<(), MdsError> {
        conn.execute(
            &format!("DELETE FROM {} WHERE channel = ?1", self.table),
            params![channel],
        )?;
        Ok(())
    }
}

/// Details made of a set of referenced ids.
struct IdSetDetails {
    table: &'static str,
    column: &'static str,
    noun: &'static str,
    wrap: fn(Vec<Uuid>) -> ChannelDetails,
    ids: fn(&ChannelDetails) -> Option<&[Uuid]>,
}

impl DetailsOperator for IdSetDetails {
    fn validate(&self, details: &ChannelDetails, report: &mut ValidationReport) {
        let Some(ids) = (self.ids)(details) else {
            return;
        };
        let mut seen = HashSet::with_capacity(ids.len());
        if ids.iter().any(|id| !seen.insert(id)) {
            report.add_error(format!("duplicate {} ids", self.noun));
        }
    }

    fn store(&self, conn: &Connection, channel: Uuid, details: &ChannelDetails) -> Result<(), MdsError> {
        let ids = (self.ids)(details).ok_or_else(|| {
            MdsError::internal("channel details do not match operator")
                .with_detail("table", self.table)
                .with_detail("type", details.channel_type())
        })?;
        self.delete(conn, channel)?;
        let mut stmt = conn.prepare(&format!(
            "INSERT INTO {} (channel, {}) VALUES (?1, ?2)",
            self.table, self.column
        ))?;
        for id in ids {
            stmt.execute(params![channel, id])?;
        }
        Ok(())
    }

    fn load(&self, conn: &Connection, channel: Uuid) -> Result<ChannelDetails, MdsError> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} WHERE channel = ?1 ORDER BY rowid",
            self.column, self.table
        ))?;
        let ids = stmt
            .query_map(params![channel], |row| row.get(0))?
            .collect::<Result<Vec<Uuid>, _>>()?;
        Ok((self.wrap)(ids))
    }

    fn delete(&self, conn: &Connection, channel: Uuid) -> Result<(), MdsError> {
        conn.execute(
            &format!("DELETE FROM {} WHERE channel = ?1", self.table),
            params![channel],
        )?;
        Ok(())
    }
}

/// Types without details.
struct NoDetails(ChannelDetails);

impl DetailsOperator for NoDetails {
    fn validate(&self, _details: &ChannelDetails, _report: &mut ValidationReport) {}

    fn store(&self, _conn: &Connection, _channel: Uuid, _details: &ChannelDetails) -> Result<(), MdsError> {
        Ok(())
    }

    fn load(&self, _conn: &Connection, _channel: Uuid) -> Result<ChannelDetails, MdsError> {
        Ok(self.0.clone())
    }

    fn delete(&self, _conn: &Connection, _channel: Uuid) -> Result<(), MdsError> {
        Ok(())
    }
}

static DIRECT: TextDetails = TextDetails {
    table: "direct_channels",
    column: "info",
    wrap: |info| ChannelDetails::Direct { info },
    text: |d| match d {
        ChannelDetails::Direct { info } => Some(info.as_str()),
        _ => None,
    },
    check: |_| None,
};

static EMAIL: TextDetails = TextDetails {
    table: "email_channels",
    column: "email",
    wrap: |email| ChannelDetails::Email { email },
    text: |d| match d {
        ChannelDetails::Email { email } => Some(email.as_str()),
        _ => None,
    },
    check: |email| (!EMAIL_PATTERN.is_match(email)).then_some("invalid mail address"),
};

static PHONE: TextDetails = TextDetails {
    table: "phone_channels",
    column: "phone",
    wrap: |phone| ChannelDetails::Phone { phone },
    text: |d| match d {
        ChannelDetails::Phone { phone } => Some(phone.as_str()),
        _ => None,
    },
    check: |phone| {
        (!E164_PATTERN.is_match(phone)).then_some("invalid phone number (expected in E.164-format)")
    },
};

static RADIO: TextDetails = TextDetails {
    table: "radio_channels",
    column: "info",
    wrap: |info| ChannelDetails::Radio { info },
    text: |d| match d {
        ChannelDetails::Radio { info } => Some(info.as_str()),
        _ => None,
    },
    check: |_| None,
};

static FORWARD_TO_USER: IdSetDetails = IdSetDetails {
    table: "forward_to_user_channels",
    column: "user",
    noun: "user",
    wrap: |users| ChannelDetails::ForwardToUser { users },
    ids: |d| match d {
        ChannelDetails::ForwardToUser { users } => Some(users.as_slice()),
        _ => None,
    },
};

static FORWARD_TO_GROUP: IdSetDetails = IdSetDetails {
    table: "forward_to_group_channels",
    column: "group_id",
    noun: "group",
    wrap: |groups| ChannelDetails::ForwardToGroup { groups },
    ids: |d| match d {
        ChannelDetails::ForwardToGroup { groups } => Some(groups.as_slice()),
        _ => None,
    },
};

static IN_APP_NOTIFICATION: NoDetails = NoDetails(ChannelDetails::InAppNotification);
static PUSH: NoDetails = NoDetails(ChannelDetails::Push);

/// The operator responsible for the given channel type.
pub fn operator(channel_type: ChannelType) -> &'static dyn DetailsOperator {
    match channel_type {
        ChannelType::Direct => &DIRECT,
        ChannelType::Email => &EMAIL,
        ChannelType::Phone => &PHONE,
        ChannelType::Radio => &RADIO,
        ChannelType::InAppNotification => &IN_APP_NOTIFICATION,
        ChannelType::Push => &PUSH,
        ChannelType::ForwardToUser => &FORWARD_TO_USER,
        ChannelType::ForwardToGroup => &FORWARD_TO_GROUP,
    }
}

/// Validate details against the rules of their type.
pub fn validate(details: &ChannelDetails) -> ValidationReport {
    let mut report = ValidationReport::default();
    operator(details.channel_type()).validate(details, &mut report);
    report
}
