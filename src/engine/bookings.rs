use std::time::Instant;

use chrono::{Datelike, Duration, NaiveDate};
use tokio_util::sync::CancellationToken;
use tracing::info;
use ulid::Ulid;

use crate::model::{BookingStatus, TimeSlotBooking};

use super::{Engine, EngineError};

/// Everything needed to commit one reservation against a slot instance.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub time_slot_id: Ulid,
    pub booking_date: NaiveDate,
    pub invitation_id: Option<Ulid>,
    pub visitor_count: u32,
    pub notes: Option<String>,
    pub booked_by: String,
}

impl Engine {
    /// Commit a reservation against `(time_slot_id, booking_date)`.
    ///
    /// The capacity read and the insert run under one per-(slot, date)
    /// mutex: concurrent bookers for the same slot instance observe each
    /// other's writes and the Confirmed sum never exceeds `max_visitors`
    /// for non-overlapping slots.
    pub async fn book_slot(
        &self,
        req: BookingRequest,
        cancel: &CancellationToken,
    ) -> Result<TimeSlotBooking, EngineError> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let started = Instant::now();

        let slot = self
            .slots
            .get(&req.time_slot_id)
            .await?
            .ok_or(EngineError::NotFound(req.time_slot_id))?;
        if !slot.is_active {
            return Err(EngineError::InvalidState(format!(
                "time slot {} is not active",
                slot.name
            )));
        }
        if req.booking_date < self.clock.now().date_naive() {
            return Err(EngineError::Validation(vec![
                "booking date is in the past".to_string(),
            ]));
        }
        let weekday = req.booking_date.weekday();
        if !slot.active_days.is_empty() && !slot.active_days.contains(weekday) {
            return Err(EngineError::InvalidState(format!(
                "time slot {} does not run on {weekday}",
                slot.name
            )));
        }

        let lock = self.slot_lock(req.time_slot_id, req.booking_date);
        let _guard = lock.lock().await;

        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let existing = self
            .bookings
            .confirmed_for_slot(&req.time_slot_id, req.booking_date)
            .await?;
        let current: u32 = existing.iter().map(|b| b.visitor_count).sum();
        let available = slot.max_visitors.saturating_sub(current);
        if req.visitor_count > available && !slot.allow_overlapping {
            metrics::counter!(crate::observability::BOOKINGS_REJECTED_TOTAL).increment(1);
            return Err(EngineError::CapacityExceeded {
                requested: req.visitor_count,
                available,
                current,
                max: slot.max_visitors,
            });
        }

        if let Some(invitation_id) = req.invitation_id {
            let active = self.bookings.active_for_invitation(&invitation_id).await?;
            if let Some(active) = active {
                return Err(EngineError::DuplicateBooking {
                    invitation_id,
                    existing: active.id,
                });
            }
        }

        let booking = TimeSlotBooking::new(
            req.time_slot_id,
            req.booking_date,
            req.invitation_id,
            req.visitor_count,
            req.notes,
            req.booked_by,
            self.clock.now(),
        );
        booking.validate().map_err(EngineError::Validation)?;

        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        self.bookings.insert(booking.clone()).await?;

        info!(
            "confirmed booking {} for {} visitors on slot {} at {}",
            booking.id, booking.visitor_count, slot.name, booking.booking_date
        );
        metrics::counter!(crate::observability::BOOKINGS_CONFIRMED_TOTAL).increment(1);
        metrics::histogram!(crate::observability::BOOKING_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        Ok(booking)
    }

    /// Cancel a Confirmed booking, recording who, when and why.
    ///
    /// Cancellation closes `cancellation_cutoff_minutes` before the slot
    /// instance starts; with the default of 0 a booking stays cancellable
    /// until the slot begins.
    pub async fn cancel_booking(
        &self,
        booking_id: Ulid,
        cancelled_by: &str,
        reason: &str,
        cancel: &CancellationToken,
    ) -> Result<(), EngineError> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let booking = self
            .bookings
            .get(&booking_id)
            .await?
            .ok_or(EngineError::NotFound(booking_id))?;

        let lock = self.slot_lock(booking.time_slot_id, booking.booking_date);
        let _guard = lock.lock().await;

        // Re-read under the lock: a concurrent cancel may have won the race.
        let mut booking = self
            .bookings
            .get(&booking_id)
            .await?
            .ok_or(EngineError::NotFound(booking_id))?;
        if booking.status != BookingStatus::Confirmed {
            return Err(EngineError::InvalidState(format!(
                "booking {booking_id} is already {}",
                booking.status
            )));
        }

        if let Some(cutoff) = self.config.cancellation_cutoff_minutes {
            // A slot deleted since booking leaves no start time to measure
            // against; cancellation stays allowed.
            if let Some(slot) = self.slots.get(&booking.time_slot_id).await? {
                let deadline = slot.starts_on(booking.booking_date) - Duration::minutes(cutoff);
                if self.clock.now() >= deadline {
                    return Err(EngineError::InvalidState(format!(
                        "booking {booking_id} can no longer be cancelled, cutoff passed at {deadline}"
                    )));
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        booking.cancel(cancelled_by, reason, self.clock.now());
        self.bookings.update(booking).await?;

        info!("cancelled booking {booking_id} by {cancelled_by}");
        metrics::counter!(crate::observability::BOOKINGS_CANCELLED_TOTAL).increment(1);
        Ok(())
    }
}
