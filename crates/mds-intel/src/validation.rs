// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Validation of intel creation requests.

use std::collections::HashSet;

use mds_core::{CreateIntel, MdsError};

use crate::content;

/// Collected validation errors. Empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn include(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
    }

    /// Turn a failed report into a bad-input error listing every problem.
    pub fn into_result(self, what: &str) -> Result<(), MdsError> {
        if self.is_ok() {
            return Ok(());
        }
        let mut err = MdsError::bad_input(format!("invalid {what}"));
        for (i, message) in self.errors.into_iter().enumerate() {
            err = err.with_detail(format!("error_{i}"), message);
        }
        Err(err)
    }
}

/// Validate type, content and assignments of intel to create.
pub fn validate_create_intel(create: &CreateIntel) -> ValidationReport {
    let mut report = content::validate_content(create.intel_type, &create.content);

    let mut assigned_to = HashSet::with_capacity(create.assignments.len());
    for to in &create.assignments {
        if !assigned_to.insert(to) {
            report.add_error(format!("duplicate assignment to {to}"));
        }
    }
    report
}
