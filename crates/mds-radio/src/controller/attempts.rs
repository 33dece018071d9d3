// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Acceptance of radio attempts and mirroring of their status.

use mds_core::{AcceptedIntelDeliveryAttempt, IntelDeliveryAttempt, MdsError};
use tracing::debug;

use super::Controller;
use crate::notifier;
use crate::store::{attempts, channels, deliveries};

const NOTE_ATTEMPT_INACTIVE: &str = "attempt not active anymore";

impl Controller {
    /// Accept an attempt for radio handling and offer it to the operators
    /// of the intel's operation. Attempts on channels unknown to the radio
    /// mirror are ignored; returns whether the attempt was accepted.
    pub async fn accept_intel_delivery_attempt(&self, mut attempt: AcceptedIntelDeliveryAttempt) -> Result<bool, MdsError> {
        let operation = attempt.intel_operation;
        let accepted = self
            .run_in_tx(move |tx, now| {
                if let Err(e) = channels::radio_channel_by_id(tx, attempt.channel) {
                    if e.is_not_found() {
                        debug!(attempt_id = %attempt.id, channel_id = %attempt.channel, "ignoring attempt for unknown radio channel");
                        return Ok(false);
                    }
                    return Err(e);
                }
                attempt.accepted_at = now;
                attempts::create_accepted_attempt(tx, &attempt)?;
                deliveries::create_radio_delivery(tx, attempt.id)?;
                let created = deliveries::radio_delivery_by_attempt(tx, attempt.id)?;
                notifier::radio_delivery_ready_for_pickup(tx, &attempt, &created.note)?;
                debug!(attempt_id = %attempt.id, operation_id = %attempt.intel_operation, "radio delivery ready for pickup");
                Ok(true)
            })
            .await?;
        if accepted {
            self.multiplexer.schedule_notify(&[operation]).await;
        }
        Ok(accepted)
    }

    /// Mirror the status of an attempt. Once the attempt is inactive, a
    /// still running radio delivery for it is finished as failed.
    pub async fn update_intel_delivery_attempt_status(&self, update: IntelDeliveryAttempt) -> Result<(), MdsError> {
        self.run_in_tx(move |tx, now| {
            let mirrored = attempts::update_accepted_attempt_status(
                tx,
                update.id,
                update.is_active,
                update.status,
                update.status_ts,
                update.note.as_deref(),
            );
            match mirrored {
                Err(e) if e.is_not_found() => return Ok(()),
                other => other?,
            }
            if update.is_active {
                return Ok(());
            }
            let delivery = deliveries::radio_delivery_by_attempt(tx, update.id)?;
            if !delivery.is_active() {
                return Ok(());
            }
            deliveries::finish(tx, update.id, false, NOTE_ATTEMPT_INACTIVE, now)?;
            let finished = deliveries::radio_delivery_by_attempt(tx, update.id)?;
            notifier::radio_delivery_finished(tx, &finished)?;
            debug!(attempt_id = %update.id, status = %update.status, "finished radio delivery of inactive attempt");
            Ok(())
        })
        .await
    }
}
