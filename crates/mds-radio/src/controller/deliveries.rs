// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pickup, release and finish of radio deliveries, plus the pickup-timeout
//! sweep.

use std::collections::BTreeSet;
use std::time::Instant;

use chrono::{DateTime, Utc};
use mds_core::{AcceptedIntelDeliveryAttempt, MdsError, RadioDelivery};
use rusqlite::Connection;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::Controller;
use crate::notifier;
use crate::pickup::next_to_pick_up;
use crate::store::{attempts, deliveries, operations};

const NOTE_PICKED_UP: &str = "picked up";
const NOTE_RELEASED: &str = "waiting for pickup (released)";

/// Fail unless `limit`, when given, is the user holding the delivery.
fn check_picked_up_by(delivery: &RadioDelivery, limit: Option<Uuid>) -> Result<(), MdsError> {
    let Some(picked_up_by) = delivery.picked_up_by else {
        return Err(MdsError::bad_input("radio delivery not picked up").with_detail("attempt_id", delivery.attempt));
    };
    if let Some(limit) = limit
        && picked_up_by != limit
    {
        return Err(MdsError::forbidden("radio delivery not picked up by user")
            .with_detail("picked_up_by", picked_up_by)
            .with_detail("limit_to_picked_up_by", limit));
    }
    Ok(())
}

fn check_active(delivery: &RadioDelivery) -> Result<(), MdsError> {
    if let Some(success) = delivery.success {
        return Err(MdsError::bad_input("radio delivery not active")
            .with_detail("attempt_id", delivery.attempt)
            .with_detail("success", success));
    }
    Ok(())
}

/// Release every picked-up delivery held longer than `timeout` and offer it
/// again. Returns the operations with re-offered deliveries.
fn release_timed_out(
    conn: &Connection,
    timeout: std::time::Duration,
    now: DateTime<Utc>,
) -> Result<BTreeSet<Uuid>, MdsError> {
    let note = format!("timeout ({timeout:?}) while being picked up");
    let mut affected = BTreeSet::new();
    for active in deliveries::active_radio_deliveries(conn, None)? {
        let Some(picked_up_at) = active.picked_up_at else {
            continue;
        };
        let held = (now - picked_up_at).to_std().unwrap_or_default();
        if held <= timeout {
            continue;
        }
        deliveries::set_pickup(conn, active.attempt, None, &note)?;
        let attempt = attempts::accepted_attempt_by_id(conn, active.attempt)?;
        notifier::radio_delivery_ready_for_pickup(conn, &attempt, &note)?;
        debug!(attempt_id = %active.attempt, held = ?held, "released timed out radio delivery");
        affected.insert(active.intel_operation);
    }
    Ok(affected)
}

impl Controller {
    /// Hand the next open radio delivery of `operation` to `by`. `None`
    /// when nothing is open. `by` must be a member of the operation.
    pub async fn pick_up_next_radio_delivery(
        &self,
        operation: Uuid,
        by: Uuid,
    ) -> Result<Option<AcceptedIntelDeliveryAttempt>, MdsError> {
        self.run_in_tx(move |tx, now| {
            if !operations::is_operation_member(tx, operation, by)? {
                return Err(MdsError::forbidden("user not member of operation")
                    .with_detail("user_id", by)
                    .with_detail("operation_id", operation));
            }
            let active = deliveries::active_radio_deliveries(tx, Some(operation))?;
            let Some(attempt_id) = next_to_pick_up(&active) else {
                return Ok(None);
            };
            deliveries::set_pickup(tx, attempt_id, Some((by, now)), NOTE_PICKED_UP)?;
            notifier::radio_delivery_picked_up(tx, attempt_id, by, now)?;
            debug!(%attempt_id, user_id = %by, operation_id = %operation, "radio delivery picked up");
            attempts::accepted_attempt_by_id(tx, attempt_id).map(Some)
        })
        .await
    }

    /// Put a picked-up delivery back into the open pool. With
    /// `limit_to_picked_up_by`, only the holder may release.
    pub async fn release_picked_up_radio_delivery(
        &self,
        attempt_id: Uuid,
        limit_to_picked_up_by: Option<Uuid>,
    ) -> Result<(), MdsError> {
        let operation = self
            .run_in_tx(move |tx, now| {
                let delivery = deliveries::radio_delivery_by_attempt(tx, attempt_id)?;
                let attempt = attempts::accepted_attempt_by_id(tx, attempt_id)?;
                check_active(&delivery)?;
                check_picked_up_by(&delivery, limit_to_picked_up_by)?;
                deliveries::set_pickup(tx, attempt_id, None, NOTE_RELEASED)?;
                notifier::radio_delivery_released(tx, attempt_id, now)?;
                Ok(attempt.intel_operation)
            })
            .await?;
        self.multiplexer.schedule_notify(&[operation]).await;
        Ok(())
    }

    /// Conclude a picked-up delivery. The note replaces the previous one.
    ///
    /// A delivery that is already finished is not finished again: the call
    /// fails with bad-input "radio delivery not active".
    pub async fn finish_radio_delivery(
        &self,
        attempt_id: Uuid,
        success: bool,
        note: String,
        limit_to_picked_up_by: Option<Uuid>,
    ) -> Result<(), MdsError> {
        self.run_in_tx(move |tx, now| {
            let delivery = deliveries::radio_delivery_by_attempt(tx, attempt_id)?;
            check_active(&delivery)?;
            check_picked_up_by(&delivery, limit_to_picked_up_by)?;
            deliveries::finish(tx, attempt_id, success, &note, now)?;
            let finished = deliveries::radio_delivery_by_attempt(tx, attempt_id)?;
            notifier::radio_delivery_finished(tx, &finished)
        })
        .await
    }

    pub async fn radio_delivery_by_attempt(&self, attempt_id: Uuid) -> Result<RadioDelivery, MdsError> {
        self.run_in_tx(move |tx, _| deliveries::radio_delivery_by_attempt(tx, attempt_id))
            .await
    }

    /// Release picked-up deliveries held longer than the pickup timeout as
    /// of `now`. Returns the number of affected operations.
    pub async fn release_timed_out_radio_deliveries(&self, now: DateTime<Utc>) -> Result<usize, MdsError> {
        let timeout = self.pickup_timeout;
        let affected = self
            .run_in_tx_at(now, move |tx, now| release_timed_out(tx, timeout, now))
            .await?;
        let operations: Vec<Uuid> = affected.into_iter().collect();
        self.multiplexer.schedule_notify(&operations).await;
        Ok(operations.len())
    }

    /// Sweep for timed out pickups until `cancel` fires.
    pub async fn run_periodic_pickup_timeout_checks(&self, cancel: CancellationToken) {
        info!(
            interval = ?self.pickup_timeout_check_interval,
            pickup_timeout = ?self.pickup_timeout,
            "pickup timeout checks started"
        );
        loop {
            let started = Instant::now();
            if let Err(e) = self.release_timed_out_radio_deliveries(Utc::now()).await {
                error!(error = %e, "periodic pickup timeout check failed");
            } else {
                debug!(took = ?started.elapsed(), "pickup timeout check done");
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.pickup_timeout_check_interval) => {}
            }
        }
        info!("pickup timeout checks stopped");
    }
}
