use chrono::{DateTime, Datelike, Utc};
use tokio_util::sync::CancellationToken;
use ulid::Ulid;

use crate::model::{CapacityValidation, TimeSlot};
use crate::store::StoreResult;

use super::{Engine, EngineError};

/// One admission question: can `expected_visitors` be admitted at `at`?
#[derive(Debug, Clone)]
pub struct CapacityRequest {
    pub location_id: Option<Ulid>,
    pub time_slot_id: Option<Ulid>,
    pub at: DateTime<Utc>,
    pub expected_visitors: u32,
    pub vip: bool,
    /// Removed from the occupancy sum when re-validating an invitation
    /// that is being edited.
    pub exclude_invitation: Option<Ulid>,
}

impl CapacityRequest {
    pub fn new(at: DateTime<Utc>, expected_visitors: u32) -> Self {
        Self {
            location_id: None,
            time_slot_id: None,
            at,
            expected_visitors,
            vip: false,
            exclude_invitation: None,
        }
    }
}

/// Occupancy as a percentage of capacity, rounded to two decimals.
pub(super) fn occupancy_percent(current: u32, max: u32) -> f64 {
    if max == 0 {
        return 0.0;
    }
    let percent = current as f64 / max as f64 * 100.0;
    (percent * 100.0).round() / 100.0
}

impl Engine {
    /// Sum of expected visitors over admission-eligible invitations whose
    /// scheduled interval contains `at`, optionally scoped to a location.
    /// Pure read.
    pub async fn current_occupancy(
        &self,
        at: DateTime<Utc>,
        location_id: Option<Ulid>,
    ) -> Result<u32, EngineError> {
        Ok(self.occupancy_excluding(at, location_id, None).await?)
    }

    pub(super) async fn occupancy_excluding(
        &self,
        at: DateTime<Utc>,
        location_id: Option<Ulid>,
        exclude: Option<Ulid>,
    ) -> StoreResult<u32> {
        let invitations = self.invitations.admission_eligible().await?;
        Ok(invitations
            .iter()
            .filter(|inv| exclude.is_none_or(|e| inv.id != e))
            .filter(|inv| inv.matches_location(location_id))
            .filter(|inv| inv.covers(at))
            .map(|inv| inv.expected_visitor_count)
            .sum())
    }

    /// Effective capacity at an instant: the first covering slot combined
    /// with the location ceiling, or the configured default when neither
    /// resolves.
    pub async fn max_capacity(
        &self,
        at: DateTime<Utc>,
        location_id: Option<Ulid>,
    ) -> Result<u32, EngineError> {
        Ok(self.resolve_capacity(at, location_id).await?)
    }

    pub(super) async fn resolve_capacity(
        &self,
        at: DateTime<Utc>,
        location_id: Option<Ulid>,
    ) -> StoreResult<u32> {
        let slot_cap = self
            .covering_slot(at, location_id)
            .await?
            .map(|s| s.max_visitors);
        let location_cap = self.location_cap(location_id).await?;
        Ok(match (slot_cap, location_cap) {
            (Some(slot), Some(location)) => slot.min(location),
            (None, Some(location)) => location,
            (Some(slot), None) => slot,
            (None, None) => self.config.default_max_capacity,
        })
    }

    async fn covering_slot(
        &self,
        at: DateTime<Utc>,
        location_id: Option<Ulid>,
    ) -> StoreResult<Option<TimeSlot>> {
        let slots = self.slots.active_for_location(location_id).await?;
        Ok(slots
            .into_iter()
            .find(|s| s.active_days.applies_on(at.weekday()) && s.covers_time(at.time())))
    }

    async fn location_cap(&self, location_id: Option<Ulid>) -> StoreResult<Option<u32>> {
        match location_id {
            Some(id) => Ok(self.locations.get(&id).await?.map(|l| l.max_capacity)),
            None => Ok(None),
        }
    }

    /// Capacity for a validation request. A supplied slot id that resolves
    /// to an active slot pins the capacity to that slot (min-ed with the
    /// location ceiling); otherwise the time-of-day lookup applies.
    async fn effective_capacity(&self, req: &CapacityRequest) -> StoreResult<u32> {
        if let Some(slot_id) = req.time_slot_id {
            let pinned = self.slots.get(&slot_id).await?;
            if let Some(slot) = pinned
                && slot.is_active {
                    let location_cap = self.location_cap(req.location_id).await?;
                    return Ok(
                        location_cap.map_or(slot.max_visitors, |cap| slot.max_visitors.min(cap))
                    );
                }
        }
        self.resolve_capacity(req.at, req.location_id).await
    }

    /// Validate an admission request. Advisory: reads only, collaborator
    /// failures propagate unchanged.
    pub async fn validate_capacity(
        &self,
        req: &CapacityRequest,
        cancel: &CancellationToken,
    ) -> Result<CapacityValidation, EngineError> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let started = std::time::Instant::now();

        let max_capacity = self.effective_capacity(req).await?;
        let current = self
            .occupancy_excluding(req.at, req.location_id, req.exclude_invitation)
            .await?;
        let available = max_capacity as i64 - current as i64;
        let percent = occupancy_percent(current, max_capacity);
        let warning = percent >= self.config.warning_threshold_percent;

        let mut is_available = available >= req.expected_visitors as i64;
        let mut messages = Vec::new();
        let mut alternatives = Vec::new();

        // Admission-policy exception: a VIP request is admitted even when
        // the numbers say no.
        if !is_available && req.vip {
            is_available = true;
            messages.push(format!(
                "VIP override: admitting {} visitors despite only {available} of {max_capacity} places free",
                req.expected_visitors
            ));
            metrics::counter!(crate::observability::VIP_OVERRIDES_TOTAL).increment(1);
        }

        if !is_available {
            messages.push(format!(
                "insufficient capacity at {}: requested {}, available {available} ({current}/{max_capacity} occupied)",
                req.at, req.expected_visitors
            ));
            alternatives = self
                .alternative_slots(
                    req.at,
                    req.expected_visitors,
                    req.location_id,
                    self.config.alternative_days_to_check,
                    cancel,
                )
                .await?;
        } else if warning {
            messages.push(format!(
                "occupancy at {percent}% of capacity, above the {}% warning level",
                self.config.warning_threshold_percent
            ));
        }

        metrics::counter!(crate::observability::VALIDATIONS_TOTAL).increment(1);
        metrics::histogram!(crate::observability::VALIDATION_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        Ok(CapacityValidation {
            is_available,
            max_capacity,
            current_occupancy: current,
            available_capacity: available,
            occupancy_percent: percent,
            warning_level: warning,
            messages,
            alternatives,
        })
    }
}
