// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transaction-scoped persistence for the logistics service.
//!
//! Every function takes the open transaction as `&Connection` and never
//! commits on its own. Reads that expect a row fail with not-found.

pub mod channel_details;
pub mod channels;
pub mod deliveries;
pub mod entries;
pub mod groups;
pub mod intel;
pub mod operations;
pub mod users;

use std::time::Duration;

use mds_core::MdsError;

/// Fail with not-found when a write touched no rows.
pub(crate) fn expect_affected(affected: usize, what: &str, id: impl std::fmt::Display) -> Result<(), MdsError> {
    if affected == 0 {
        return Err(MdsError::not_found(format!("{what} not found")).with_detail("id", id));
    }
    Ok(())
}

pub(crate) fn duration_to_ms(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

pub(crate) fn ms_to_duration(ms: i64) -> Duration {
    Duration::from_millis(u64::try_from(ms).unwrap_or(0))
}

/// `?, ?, ...` with `n` placeholders.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_roundtrip_through_millis() {
        let d = Duration::from_millis(1500);
        assert_eq!(ms_to_duration(duration_to_ms(d)), d);
        assert_eq!(ms_to_duration(-5), Duration::ZERO);
    }

    #[test]
    fn placeholder_list() {
        assert_eq!(placeholders(3), "?, ?, ?");
        assert_eq!(placeholders(0), "");
    }
}
