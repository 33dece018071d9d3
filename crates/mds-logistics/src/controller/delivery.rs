// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery scheduling.
//!
//! A delivery is re-evaluated by [`look_after`] whenever something about it
//! may have changed: an attempt finished, a channel vanished, or the
//! periodic sweep came by. Every transaction holds the database write lock
//! for its whole duration, so two look-afters for the same delivery never
//! interleave.

use std::collections::BTreeSet;
use std::time::Instant;

use chrono::{DateTime, Utc};
use mds_core::{IntelDeliveryAttempt, IntelDeliveryStatus, MdsError};
use rusqlite::Connection;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::Controller;
use crate::notifier;
use crate::store::{channels, deliveries, entries, intel};

const NOTE_NO_MORE_CHANNELS: &str = "no more channels to try";
const NOTE_CHANNEL_DELETED: &str = "canceled because of channel deletion";
const NOTE_MANUAL_CONFIRMATION: &str = "canceled due to manual delivery-confirmation";
const NOTE_DELIVERED: &str = "delivered";

/// Create one delivery per assignment of the intel and look after each.
pub(crate) fn schedule_deliveries_for_intel(
    conn: &Connection,
    intel_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Vec<Uuid>, MdsError> {
    let created = intel::intel_by_id(conn, intel_id)?;
    let mut scheduled = Vec::with_capacity(created.assignments.len());
    for assignment in &created.assignments {
        let delivery = deliveries::create_delivery(conn, intel_id, assignment.to)?;
        notifier::intel_delivery_created(conn, &delivery)?;
        look_after(conn, delivery.id, now)?;
        scheduled.push(delivery.id);
    }
    Ok(scheduled)
}

/// Re-evaluate a delivery: time out stale attempts and, if nothing is in
/// flight anymore, start the next attempt or give up.
pub(crate) fn look_after(conn: &Connection, delivery_id: Uuid, now: DateTime<Utc>) -> Result<(), MdsError> {
    let delivery = deliveries::delivery_by_id(conn, delivery_id).map_err(|e| {
        MdsError::internal("intel delivery for look-after not found")
            .with_detail("delivery_id", delivery_id)
            .with_detail("cause", e)
    })?;
    if !delivery.is_active {
        warn!(%delivery_id, "look after delivery requested although not active, possible race condition");
        return Ok(());
    }

    handle_timed_out_attempts(conn, delivery_id, now)?;

    if !deliveries::active_attempts_by_delivery(conn, delivery_id)?.is_empty() {
        return Ok(());
    }
    if !entries::is_auto_delivery_enabled(conn, delivery.to)? {
        debug!(%delivery_id, entry_id = %delivery.to, "auto delivery disabled, leaving delivery to manual handling");
        return Ok(());
    }

    let intel = intel::intel_by_id(conn, delivery.intel)?;
    match channels::next_channel_for_delivery(conn, delivery_id, delivery.to, intel.importance)? {
        Some(channel) => {
            create_attempt(conn, delivery_id, channel.id, now)?;
        }
        None => mark_delivery_failed(conn, delivery_id, NOTE_NO_MORE_CHANNELS)?,
    }
    Ok(())
}

/// Time out every active attempt of the delivery whose channel timeout
/// elapsed.
fn handle_timed_out_attempts(conn: &Connection, delivery_id: Uuid, now: DateTime<Utc>) -> Result<(), MdsError> {
    for (attempt, timeout) in deliveries::timed_out_attempts_by_delivery(conn, delivery_id, now)? {
        if !attempt.is_active {
            continue;
        }
        let note = format!("delivery attempt timed out ({timeout:?} from channel config)");
        deliveries::update_attempt_status(
            conn,
            attempt.id,
            false,
            IntelDeliveryStatus::Timeout,
            Some(&note),
            now,
        )?;
        let updated = deliveries::attempt_by_id(conn, attempt.id)?;
        notifier::intel_delivery_attempt_status_updated(conn, &updated)?;
        debug!(attempt_id = %attempt.id, %delivery_id, ?timeout, "delivery attempt timed out");
    }
    Ok(())
}

/// Create an attempt for an active delivery via the given channel and emit
/// `intel-delivery-attempt-created`. Does not check for other active
/// attempts.
fn create_attempt(
    conn: &Connection,
    delivery_id: Uuid,
    channel_id: Uuid,
    now: DateTime<Utc>,
) -> Result<IntelDeliveryAttempt, MdsError> {
    let delivery = deliveries::delivery_by_id(conn, delivery_id)?;
    if !delivery.is_active {
        return Err(MdsError::bad_input("delivery inactive").with_detail("delivery_id", delivery_id));
    }
    let attempt = deliveries::create_attempt(conn, delivery_id, channel_id, now)?;
    let intel = intel::intel_by_id(conn, delivery.intel)?;
    let entry = entries::entry_by_id(conn, delivery.to, None)?;
    notifier::intel_delivery_attempt_created(conn, &attempt, &delivery, &entry, &intel)?;
    debug!(attempt_id = %attempt.id, %delivery_id, %channel_id, "delivery attempt created");
    Ok(attempt)
}

/// Set the delivery inactive and unsuccessful. Callers make sure no attempt
/// is active anymore.
fn mark_delivery_failed(conn: &Connection, delivery_id: Uuid, reason: &str) -> Result<(), MdsError> {
    deliveries::update_delivery_status(conn, delivery_id, false, false, Some(reason))?;
    notifier::intel_delivery_status_updated(conn, delivery_id, false, false, Some(reason.to_string()))?;
    info!(%delivery_id, reason, "intel delivery failed");
    Ok(())
}

/// Emit cancellations for active attempts on channels about to be deleted
/// and remove every attempt referencing them. Returns the deliveries that
/// lost an active attempt; look after them once the channel set is stable.
pub(crate) fn cancel_attempts_for_deleted_channels(
    conn: &Connection,
    deleted_channels: &[Uuid],
    now: DateTime<Utc>,
) -> Result<BTreeSet<Uuid>, MdsError> {
    let mut affected = BTreeSet::new();
    for mut attempt in deliveries::active_attempts_by_channels(conn, deleted_channels)? {
        // The row is deleted right after, only the event carries the transition.
        attempt.is_active = false;
        attempt.status = IntelDeliveryStatus::Canceled;
        attempt.status_ts = now;
        attempt.note = Some(NOTE_CHANNEL_DELETED.to_string());
        notifier::intel_delivery_attempt_status_updated(conn, &attempt)?;
        affected.insert(attempt.delivery);
    }
    for channel in deleted_channels {
        deliveries::delete_attempts_by_channel(conn, *channel)?;
    }
    Ok(affected)
}

/// Update the status of a still active attempt, keeping it active. Inactive
/// or canceled attempts are left alone.
pub(crate) fn update_attempt_status_for_active(
    conn: &Connection,
    attempt_id: Uuid,
    status: IntelDeliveryStatus,
    note: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), MdsError> {
    let attempt = deliveries::attempt_by_id(conn, attempt_id)?;
    if !attempt.is_active || attempt.status == IntelDeliveryStatus::Canceled {
        debug!(
            %attempt_id,
            new_status = %status,
            current_status = %attempt.status,
            current_is_active = attempt.is_active,
            "skipping status update for intel delivery attempt not active anymore"
        );
        return Ok(());
    }
    deliveries::update_attempt_status(conn, attempt_id, true, status, note, now)?;
    let updated = deliveries::attempt_by_id(conn, attempt_id)?;
    notifier::intel_delivery_attempt_status_updated(conn, &updated)
}

/// Mark an active attempt as failed and look after its delivery.
pub(crate) fn mark_attempt_failed(
    conn: &Connection,
    attempt_id: Uuid,
    note: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), MdsError> {
    let attempt = deliveries::attempt_by_id(conn, attempt_id)?;
    if !attempt.is_active {
        debug!(%attempt_id, "skipping marking intel delivery attempt as failed, not active anymore");
        return Ok(());
    }
    deliveries::update_attempt_status(conn, attempt_id, false, IntelDeliveryStatus::Failed, note, now)?;
    let updated = deliveries::attempt_by_id(conn, attempt_id)?;
    notifier::intel_delivery_attempt_status_updated(conn, &updated)?;
    look_after(conn, attempt.delivery, now)
}

/// Mark a delivery as successfully delivered. The given attempt becomes
/// delivered, every other active attempt is canceled.
///
/// With `by`, only the user the recipient entry is bound to may confirm.
pub(crate) fn mark_delivered(
    conn: &Connection,
    delivery_id: Uuid,
    attempt_id: Option<Uuid>,
    by: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<(), MdsError> {
    let delivery = deliveries::delivery_by_id(conn, delivery_id)?;
    if let Some(by) = by {
        let entry = entries::entry_by_id(conn, delivery.to, None)?;
        if entry.user != Some(by) {
            return Err(MdsError::forbidden("intel delivery assigned to different user")
                .with_detail("mark_by", by)
                .with_detail("delivery_assigned_to", delivery.to));
        }
    }

    for attempt in deliveries::active_attempts_by_delivery(conn, delivery_id)? {
        let (status, note) = if Some(attempt.id) == attempt_id {
            (IntelDeliveryStatus::Delivered, None)
        } else {
            (IntelDeliveryStatus::Canceled, Some(NOTE_MANUAL_CONFIRMATION))
        };
        deliveries::update_attempt_status(conn, attempt.id, false, status, note, now)?;
        let updated = deliveries::attempt_by_id(conn, attempt.id)?;
        notifier::intel_delivery_attempt_status_updated(conn, &updated)?;
    }

    deliveries::update_delivery_status(conn, delivery_id, false, true, Some(NOTE_DELIVERED))?;
    notifier::intel_delivery_status_updated(conn, delivery_id, false, true, Some(NOTE_DELIVERED.to_string()))?;
    info!(%delivery_id, attempt_id = ?attempt_id, "intel delivery delivered");
    Ok(())
}

/// Apply a status reported by a downstream transport. A delivered report
/// concludes the delivery, any other inactive status fails the attempt and
/// moves on to the next channel.
pub(crate) fn apply_attempt_status(
    conn: &Connection,
    attempt_id: Uuid,
    is_active: bool,
    status: IntelDeliveryStatus,
    note: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), MdsError> {
    let attempt = deliveries::attempt_by_id(conn, attempt_id)?;
    if status == IntelDeliveryStatus::Delivered {
        if !attempt.is_active {
            debug!(%attempt_id, "ignoring delivered report for inactive attempt");
            return Ok(());
        }
        return mark_delivered(conn, attempt.delivery, Some(attempt_id), None, now);
    }
    if is_active {
        return update_attempt_status_for_active(conn, attempt_id, status, note, now);
    }
    if !attempt.is_active {
        debug!(%attempt_id, new_status = %status, "skipping status update for inactive attempt");
        return Ok(());
    }
    deliveries::update_attempt_status(conn, attempt_id, false, status, note, now)?;
    let updated = deliveries::attempt_by_id(conn, attempt_id)?;
    notifier::intel_delivery_attempt_status_updated(conn, &updated)?;
    if deliveries::delivery_by_id(conn, attempt.delivery)?.is_active {
        look_after(conn, attempt.delivery, now)?;
    }
    Ok(())
}

impl Controller {
    /// Manually start an attempt for a delivery via the given channel.
    pub async fn create_intel_delivery_attempt(
        &self,
        delivery_id: Uuid,
        channel_id: Uuid,
    ) -> Result<IntelDeliveryAttempt, MdsError> {
        self.run_in_tx(move |tx, now| {
            let active = deliveries::active_attempts_by_delivery(tx, delivery_id)?;
            if !active.is_empty() {
                return Err(MdsError::bad_input(format!("{} attempts still active", active.len()))
                    .with_detail("delivery_id", delivery_id)
                    .with_detail("active_attempts", active.len()));
            }
            let delivery = deliveries::delivery_by_id(tx, delivery_id)?;
            let channel = channels::channel_by_id(tx, channel_id)?;
            if channel.entry != delivery.to {
                return Err(MdsError::bad_input("channel does not belong to delivery recipient")
                    .with_detail("channel_id", channel_id)
                    .with_detail("delivery_id", delivery_id));
            }
            create_attempt(tx, delivery_id, channel_id, now)
        })
        .await
    }

    /// Confirm a delivery via one of its attempts.
    pub async fn mark_intel_delivery_attempt_as_delivered(
        &self,
        attempt_id: Uuid,
        by: Option<Uuid>,
    ) -> Result<(), MdsError> {
        self.run_in_tx(move |tx, now| {
            let attempt = deliveries::attempt_by_id(tx, attempt_id)?;
            mark_delivered(tx, attempt.delivery, Some(attempt_id), by, now)
        })
        .await
    }

    /// Confirm a delivery without naming an attempt. Every active attempt is
    /// canceled.
    pub async fn mark_intel_delivery_as_delivered(
        &self,
        delivery_id: Uuid,
        by: Option<Uuid>,
    ) -> Result<(), MdsError> {
        self.run_in_tx(move |tx, now| mark_delivered(tx, delivery_id, None, by, now))
            .await
    }

    pub async fn mark_intel_delivery_attempt_as_failed(
        &self,
        attempt_id: Uuid,
        note: Option<String>,
    ) -> Result<(), MdsError> {
        self.run_in_tx(move |tx, now| mark_attempt_failed(tx, attempt_id, note.as_deref(), now))
            .await
    }

    /// All attempts of a delivery, oldest first.
    pub async fn intel_delivery_attempts_by_delivery(
        &self,
        delivery_id: Uuid,
    ) -> Result<Vec<IntelDeliveryAttempt>, MdsError> {
        self.run_in_tx(move |tx, _| {
            deliveries::delivery_by_id(tx, delivery_id)?;
            deliveries::attempts_by_delivery(tx, delivery_id)
        })
        .await
    }

    /// Apply a status reported by a downstream transport worker.
    pub async fn update_intel_delivery_attempt_status(
        &self,
        attempt_id: Uuid,
        is_active: bool,
        status: IntelDeliveryStatus,
        note: Option<String>,
    ) -> Result<(), MdsError> {
        self.run_in_tx(move |tx, now| {
            apply_attempt_status(tx, attempt_id, is_active, status, note.as_deref(), now)
        })
        .await
    }

    /// Look after every active delivery as of `now`, each in its own
    /// transaction. A delivery that fails is logged and rolled back alone.
    /// Returns how many were looked after successfully.
    pub async fn check_active_deliveries(&self, now: DateTime<Utc>) -> Result<usize, MdsError> {
        let active = self
            .run_in_tx_at(now, |tx, _| deliveries::active_deliveries(tx))
            .await?;
        let mut checked = 0;
        for delivery in active {
            let delivery_id = delivery.id;
            match self
                .run_in_tx_at(now, move |tx, now| look_after(tx, delivery_id, now))
                .await
            {
                Ok(()) => checked += 1,
                Err(e) => error!(%delivery_id, error = %e, "looking after delivery failed"),
            }
        }
        Ok(checked)
    }

    /// Run [`Controller::check_active_deliveries`] on the configured interval
    /// until `cancel` fires.
    pub async fn run_periodic_delivery_checks(&self, cancel: CancellationToken) {
        let interval = self.config.periodic_delivery_check_interval();
        let warn_threshold = self.config.periodic_delivery_warn_threshold();
        info!(?interval, "periodic delivery checks started");
        loop {
            let start = Instant::now();
            match self.check_active_deliveries(Utc::now()).await {
                Ok(checked) => {
                    let took = start.elapsed();
                    if took > warn_threshold {
                        warn!(?took, ?warn_threshold, checked, "periodic delivery checks took longer than expected");
                    }
                }
                Err(e) => error!(error = %e, "periodic delivery checks failed"),
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("periodic delivery checks shutting down");
                    return;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::controller::testing::{Fixture, direct, email, event_names};
    use mds_core::{ErrorKind, Event};

    async fn intel_to(fx: &Fixture, entry: Uuid) -> Uuid {
        fx.controller
            .create_intel(fx.create_intel(50, vec![entry]))
            .await
            .unwrap()
            .id
    }

    async fn single_delivery(fx: &Fixture, intel: Uuid) -> mds_core::IntelDelivery {
        fx.controller
            .database()
            .transaction(move |tx| deliveries::deliveries_by_intel(tx, intel))
            .await
            .unwrap()
            .remove(0)
    }

    async fn attempts(fx: &Fixture, delivery: Uuid) -> Vec<IntelDeliveryAttempt> {
        fx.controller
            .intel_delivery_attempts_by_delivery(delivery)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn first_attempt_uses_highest_priority_channel() {
        let fx = Fixture::new().await;
        let entry = fx.entry(None).await;
        let high = fx.channel(entry.id, 10, direct()).await;
        fx.channel(entry.id, 5, email()).await;

        let intel = intel_to(&fx, entry.id).await;
        let events = fx.take_events().await;
        assert_eq!(
            event_names(&events),
            vec!["intel-created", "intel-delivery-created", "intel-delivery-attempt-created"]
        );
        let Event::IntelDeliveryAttemptCreated { attempt, intel: sent, .. } = &events[2] else {
            panic!("unexpected event {:?}", events[2]);
        };
        assert_eq!(attempt.channel, high.id);
        assert_eq!(attempt.status, IntelDeliveryStatus::Open);
        assert_eq!(sent.id, intel);
    }

    #[tokio::test]
    async fn delivered_report_concludes_delivery() {
        let fx = Fixture::new().await;
        let entry = fx.entry(None).await;
        fx.channel(entry.id, 10, direct()).await;
        let intel = intel_to(&fx, entry.id).await;
        let delivery = single_delivery(&fx, intel).await;
        let attempt = attempts(&fx, delivery.id).await.remove(0);
        fx.take_events().await;

        fx.controller
            .update_intel_delivery_attempt_status(attempt.id, false, IntelDeliveryStatus::Delivered, None)
            .await
            .unwrap();

        let events = fx.take_events().await;
        assert_eq!(events.len(), 2);
        let Event::IntelDeliveryAttemptStatusUpdated(updated) = &events[0] else {
            panic!("unexpected event {:?}", events[0]);
        };
        assert_eq!(updated.id, attempt.id);
        assert!(!updated.is_active);
        assert_eq!(updated.status, IntelDeliveryStatus::Delivered);
        assert_eq!(updated.note, None);
        assert_eq!(
            events[1],
            Event::IntelDeliveryStatusUpdated {
                delivery: delivery.id,
                is_active: false,
                success: true,
                note: Some("delivered".into()),
            }
        );
    }

    #[tokio::test]
    async fn failures_fall_through_until_channels_exhausted() {
        let fx = Fixture::new().await;
        let entry = fx.entry(None).await;
        let first = fx.channel(entry.id, 10, direct()).await;
        let second = fx.channel(entry.id, 5, email()).await;
        let intel = intel_to(&fx, entry.id).await;
        let delivery = single_delivery(&fx, intel).await;

        let a1 = attempts(&fx, delivery.id).await.remove(0);
        assert_eq!(a1.channel, first.id);
        fx.controller
            .mark_intel_delivery_attempt_as_failed(a1.id, Some("nobody answered".into()))
            .await
            .unwrap();

        let all = attempts(&fx, delivery.id).await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].status, IntelDeliveryStatus::Failed);
        assert_eq!(all[0].note.as_deref(), Some("nobody answered"));
        assert_eq!(all[1].channel, second.id);
        fx.take_events().await;

        fx.controller
            .update_intel_delivery_attempt_status(all[1].id, false, IntelDeliveryStatus::Failed, None)
            .await
            .unwrap();
        let events = fx.take_events().await;
        assert_eq!(
            events.last(),
            Some(&Event::IntelDeliveryStatusUpdated {
                delivery: delivery.id,
                is_active: false,
                success: false,
                note: Some("no more channels to try".into()),
            })
        );
    }

    #[tokio::test]
    async fn sweep_times_out_stale_attempts() {
        let fx = Fixture::new().await;
        let entry = fx.entry(None).await;
        let mut fast = crate::controller::testing::channel(entry.id, 10, direct());
        fast.timeout = Duration::from_secs(1);
        let fast_id = fast.id;
        fx.controller
            .run_in_tx(move |tx, _| channels::create_channel(tx, &fast))
            .await
            .unwrap();
        let fallback = fx.channel(entry.id, 5, email()).await;
        let intel = intel_to(&fx, entry.id).await;
        let delivery = single_delivery(&fx, intel).await;
        let created_at = attempts(&fx, delivery.id).await[0].created_at;
        fx.take_events().await;

        let checked = fx
            .controller
            .check_active_deliveries(created_at + chrono::Duration::milliseconds(1500))
            .await
            .unwrap();
        assert_eq!(checked, 1);

        let all = attempts(&fx, delivery.id).await;
        assert_eq!(all[0].channel, fast_id);
        assert_eq!(all[0].status, IntelDeliveryStatus::Timeout);
        assert_eq!(all[0].note.as_deref(), Some("delivery attempt timed out (1s from channel config)"));
        assert!(all[0].created_at + chrono::Duration::seconds(1) <= all[0].status_ts);
        assert_eq!(all[1].channel, fallback.id);
        assert_eq!(
            event_names(&fx.take_events().await),
            vec!["intel-delivery-attempt-status-updated", "intel-delivery-attempt-created"]
        );
    }

    #[tokio::test]
    async fn failing_delivery_does_not_roll_back_sweep() {
        let fx = Fixture::new().await;
        let broken_entry = fx.entry(None).await;
        let healthy_entry = fx.entry(None).await;
        fx.channel(broken_entry.id, 10, direct()).await;
        fx.channel(healthy_entry.id, 10, direct()).await;
        let broken_intel = intel_to(&fx, broken_entry.id).await;
        let healthy_intel = intel_to(&fx, healthy_entry.id).await;
        let broken = single_delivery(&fx, broken_intel).await;
        let healthy = single_delivery(&fx, healthy_intel).await;
        fx.controller
            .database()
            .transaction(move |tx| {
                tx.execute(
                    "UPDATE intel SET content = 'not json' WHERE id = ?1",
                    rusqlite::params![broken_intel],
                )?;
                Ok::<_, MdsError>(())
            })
            .await
            .unwrap();
        fx.take_events().await;

        let checked = fx
            .controller
            .check_active_deliveries(Utc::now() + chrono::Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(checked, 1);

        // Rolled back: the broken delivery keeps its active attempt.
        let broken_attempts = attempts(&fx, broken.id).await;
        assert!(broken_attempts[0].is_active);

        let healthy_attempts = attempts(&fx, healthy.id).await;
        assert_eq!(healthy_attempts[0].status, IntelDeliveryStatus::Timeout);
        assert_eq!(
            event_names(&fx.take_events().await),
            vec!["intel-delivery-attempt-status-updated", "intel-delivery-status-updated"]
        );
    }

    #[tokio::test]
    async fn sweep_before_timeout_changes_nothing() {
        let fx = Fixture::new().await;
        let entry = fx.entry(None).await;
        fx.channel(entry.id, 10, direct()).await;
        let intel = intel_to(&fx, entry.id).await;
        let delivery = single_delivery(&fx, intel).await;
        let created_at = attempts(&fx, delivery.id).await[0].created_at;
        fx.take_events().await;

        fx.controller
            .check_active_deliveries(created_at + chrono::Duration::seconds(30))
            .await
            .unwrap();
        assert!(fx.take_events().await.is_empty());
    }

    #[tokio::test]
    async fn disabled_auto_delivery_keeps_delivery_open() {
        let fx = Fixture::new().await;
        let entry = fx.entry(None).await;
        let channel = fx.channel(entry.id, 10, direct()).await;
        fx.controller
            .set_auto_intel_delivery_enabled_for_entry(entry.id, false)
            .await
            .unwrap();
        let intel = intel_to(&fx, entry.id).await;
        let delivery = single_delivery(&fx, intel).await;
        assert!(delivery.is_active);
        assert!(attempts(&fx, delivery.id).await.is_empty());

        let attempt = fx
            .controller
            .create_intel_delivery_attempt(delivery.id, channel.id)
            .await
            .unwrap();
        assert_eq!(attempt.channel, channel.id);

        let err = fx
            .controller
            .create_intel_delivery_attempt(delivery.id, channel.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadInput);
        assert!(err.to_string().contains("1 attempts still active"));
    }

    #[tokio::test]
    async fn manual_confirmation_cancels_other_attempts() {
        let fx = Fixture::new().await;
        let recipient = Uuid::new_v4();
        let entry = fx.entry(Some(recipient)).await;
        fx.channel(entry.id, 10, direct()).await;
        let intel = intel_to(&fx, entry.id).await;
        let delivery = single_delivery(&fx, intel).await;
        fx.take_events().await;

        let err = fx
            .controller
            .mark_intel_delivery_as_delivered(delivery.id, Some(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        fx.controller
            .mark_intel_delivery_as_delivered(delivery.id, Some(recipient))
            .await
            .unwrap();
        let all = attempts(&fx, delivery.id).await;
        assert_eq!(all[0].status, IntelDeliveryStatus::Canceled);
        assert_eq!(all[0].note.as_deref(), Some("canceled due to manual delivery-confirmation"));
        let events = fx.take_events().await;
        assert_eq!(
            events.last(),
            Some(&Event::IntelDeliveryStatusUpdated {
                delivery: delivery.id,
                is_active: false,
                success: true,
                note: Some("delivered".into()),
            })
        );

        let err = fx
            .controller
            .create_intel_delivery_attempt(delivery.id, all[0].channel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadInput);
    }

    #[tokio::test]
    async fn status_updates_for_inactive_attempts_are_skipped() {
        let fx = Fixture::new().await;
        let entry = fx.entry(None).await;
        fx.channel(entry.id, 10, direct()).await;
        let intel = intel_to(&fx, entry.id).await;
        let delivery = single_delivery(&fx, intel).await;
        let attempt = attempts(&fx, delivery.id).await.remove(0);

        fx.controller
            .mark_intel_delivery_attempt_as_delivered(attempt.id, None)
            .await
            .unwrap();
        fx.take_events().await;

        fx.controller
            .update_intel_delivery_attempt_status(attempt.id, true, IntelDeliveryStatus::Delivering, None)
            .await
            .unwrap();
        fx.controller
            .mark_intel_delivery_attempt_as_failed(attempt.id, None)
            .await
            .unwrap();
        assert!(fx.take_events().await.is_empty());
        assert_eq!(attempts(&fx, delivery.id).await[0].status, IntelDeliveryStatus::Delivered);
    }

    #[tokio::test]
    async fn active_status_update_keeps_attempt_active() {
        let fx = Fixture::new().await;
        let entry = fx.entry(None).await;
        fx.channel(entry.id, 10, direct()).await;
        let intel = intel_to(&fx, entry.id).await;
        let delivery = single_delivery(&fx, intel).await;
        let attempt = attempts(&fx, delivery.id).await.remove(0);

        fx.controller
            .update_intel_delivery_attempt_status(
                attempt.id,
                true,
                IntelDeliveryStatus::AwaitingAck,
                Some("in-app-notification sent".into()),
            )
            .await
            .unwrap();
        let updated = attempts(&fx, delivery.id).await.remove(0);
        assert!(updated.is_active);
        assert_eq!(updated.status, IntelDeliveryStatus::AwaitingAck);
        assert_eq!(updated.note.as_deref(), Some("in-app-notification sent"));
    }

    #[tokio::test]
    async fn unknown_attempt_is_not_found() {
        let fx = Fixture::new().await;
        let err = fx
            .controller
            .update_intel_delivery_attempt_status(Uuid::new_v4(), true, IntelDeliveryStatus::Delivering, None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_checks_stop_on_cancel() {
        let fx = Fixture::new().await;
        let cancel = CancellationToken::new();
        let controller = fx.controller.clone();
        let handle = tokio::spawn({
            let cancel = cancel.clone();
            async move { controller.run_periodic_delivery_checks(cancel).await }
        });
        tokio::time::sleep(Duration::from_secs(65)).await;
        cancel.cancel();
        handle.await.unwrap();
    }
}
