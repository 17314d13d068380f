use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use ulid::Ulid;

use crate::model::AlternativeSlot;
use crate::store::StoreResult;

use super::occupancy::occupancy_percent;
use super::{Engine, EngineError};

impl Engine {
    /// Bounded greedy forward scan for future slot instances with enough
    /// spare capacity. Never suggests the original instant or anything in
    /// the past; stops adding days once enough candidates exist; returns at
    /// most the configured cap, ascending by start instant.
    pub async fn alternative_slots(
        &self,
        origin: DateTime<Utc>,
        expected_visitors: u32,
        location_id: Option<Ulid>,
        days_to_check: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<AlternativeSlot>, EngineError> {
        metrics::counter!(crate::observability::ALTERNATIVE_SCANS_TOTAL).increment(1);
        let now = self.clock.now();
        let mut found: Vec<AlternativeSlot> = Vec::new();

        for day in 0..days_to_check {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            let check_date = match origin.date_naive().checked_add_days(Days::new(day as u64)) {
                Some(d) => d,
                None => break,
            };
            match self
                .scan_day(check_date, origin, now, expected_visitors, location_id)
                .await
            {
                Ok(mut candidates) => found.append(&mut candidates),
                Err(e) => {
                    warn!("alternative-slot scan skipped {check_date}: {e}");
                    metrics::counter!(crate::observability::ALTERNATIVE_DAYS_SKIPPED_TOTAL)
                        .increment(1);
                }
            }
            if found.len() >= self.config.max_alternatives {
                break;
            }
        }

        found.sort_by_key(|c| c.starts_at);
        found.truncate(self.config.max_alternatives);
        Ok(found)
    }

    async fn scan_day(
        &self,
        check_date: NaiveDate,
        origin: DateTime<Utc>,
        now: DateTime<Utc>,
        expected_visitors: u32,
        location_id: Option<Ulid>,
    ) -> StoreResult<Vec<AlternativeSlot>> {
        let slots = self.slots.active_for_location(location_id).await?;
        let mut candidates = Vec::new();

        for slot in slots {
            if !slot.active_days.applies_on(check_date.weekday()) {
                continue;
            }
            let starts_at = slot.starts_on(check_date);
            if starts_at == origin || starts_at < now {
                continue;
            }
            let occupancy = self.occupancy_excluding(starts_at, location_id, None).await?;
            let available = slot.max_visitors.saturating_sub(occupancy);
            if available >= expected_visitors {
                candidates.push(AlternativeSlot {
                    time_slot_id: slot.id,
                    name: slot.name,
                    starts_at,
                    available_capacity: available,
                    occupancy_percent: occupancy_percent(occupancy, slot.max_visitors),
                });
            }
        }

        Ok(candidates)
    }
}
