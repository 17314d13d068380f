use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use ulid::Ulid;

use crate::model::{Invitation, Location, TimeSlot, TimeSlotBooking};

/// Failure inside a data collaborator. Opaque: the engine surfaces it
/// unchanged.
#[derive(Debug, Clone)]
pub struct StoreError(String);

impl StoreError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "store error: {}", self.0)
    }
}

impl std::error::Error for StoreError {}

pub type StoreResult<T> = Result<T, StoreError>;

// ── Collaborator contracts ───────────────────────────────────────

#[async_trait]
pub trait TimeSlotDirectory: Send + Sync {
    async fn get(&self, id: &Ulid) -> StoreResult<Option<TimeSlot>>;

    /// Active slots visible from a location: slots bound to it plus
    /// location-agnostic ones. Ordered by start time so "first covering
    /// slot" is deterministic. With no location, every active slot.
    async fn active_for_location(&self, location_id: Option<Ulid>) -> StoreResult<Vec<TimeSlot>>;
}

#[async_trait]
pub trait LocationDirectory: Send + Sync {
    async fn get(&self, id: &Ulid) -> StoreResult<Option<Location>>;
}

#[async_trait]
pub trait InvitationDirectory: Send + Sync {
    /// Invitations that count toward occupancy: not deleted and in an
    /// admission-eligible status. Location and time filtering stay in the
    /// engine.
    async fn admission_eligible(&self) -> StoreResult<Vec<Invitation>>;
}

/// The one store this engine owns and writes.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn insert(&self, booking: TimeSlotBooking) -> StoreResult<()>;

    async fn get(&self, id: &Ulid) -> StoreResult<Option<TimeSlotBooking>>;

    async fn update(&self, booking: TimeSlotBooking) -> StoreResult<()>;

    /// All Confirmed bookings for one slot instance.
    async fn confirmed_for_slot(
        &self,
        slot_id: &Ulid,
        date: NaiveDate,
    ) -> StoreResult<Vec<TimeSlotBooking>>;

    /// The non-Cancelled booking referencing an invitation, if any.
    async fn active_for_invitation(
        &self,
        invitation_id: &Ulid,
    ) -> StoreResult<Option<TimeSlotBooking>>;
}

/// Time source. Injected so "today" and past-instant rules stay testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests.
pub struct ManualClock(RwLock<DateTime<Utc>>);

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self(RwLock::new(start))
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.0.write().expect("clock lock") = to;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.0.write().expect("clock lock");
        *guard = *guard + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.read().expect("clock lock")
    }
}

// ── In-memory reference implementation ───────────────────────────

/// DashMap-backed implementation of every data contract. Backs the test
/// suite and the bench; deployments plug their own stores in.
pub struct MemoryStore {
    locations: DashMap<Ulid, Location>,
    slots: DashMap<Ulid, TimeSlot>,
    invitations: DashMap<Ulid, Invitation>,
    bookings: DashMap<Ulid, TimeSlotBooking>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            locations: DashMap::new(),
            slots: DashMap::new(),
            invitations: DashMap::new(),
            bookings: DashMap::new(),
        }
    }

    pub fn put_location(&self, location: Location) {
        self.locations.insert(location.id, location);
    }

    pub fn put_slot(&self, slot: TimeSlot) {
        self.slots.insert(slot.id, slot);
    }

    pub fn put_invitation(&self, invitation: Invitation) {
        self.invitations.insert(invitation.id, invitation);
    }

    pub fn booking_count(&self) -> usize {
        self.bookings.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TimeSlotDirectory for MemoryStore {
    async fn get(&self, id: &Ulid) -> StoreResult<Option<TimeSlot>> {
        Ok(self.slots.get(id).map(|e| e.value().clone()))
    }

    async fn active_for_location(&self, location_id: Option<Ulid>) -> StoreResult<Vec<TimeSlot>> {
        let mut slots: Vec<TimeSlot> = self
            .slots
            .iter()
            .filter(|e| e.value().is_active)
            .filter(|e| match location_id {
                Some(l) => e.value().location_id.is_none_or(|sl| sl == l),
                None => true,
            })
            .map(|e| e.value().clone())
            .collect();
        slots.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));
        Ok(slots)
    }
}

#[async_trait]
impl LocationDirectory for MemoryStore {
    async fn get(&self, id: &Ulid) -> StoreResult<Option<Location>> {
        Ok(self.locations.get(id).map(|e| e.value().clone()))
    }
}

#[async_trait]
impl InvitationDirectory for MemoryStore {
    async fn admission_eligible(&self) -> StoreResult<Vec<Invitation>> {
        Ok(self
            .invitations
            .iter()
            .filter(|e| {
                let inv = e.value();
                !inv.is_deleted && inv.status.is_admission_eligible()
            })
            .map(|e| e.value().clone())
            .collect())
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn insert(&self, booking: TimeSlotBooking) -> StoreResult<()> {
        self.bookings.insert(booking.id, booking);
        Ok(())
    }

    async fn get(&self, id: &Ulid) -> StoreResult<Option<TimeSlotBooking>> {
        Ok(self.bookings.get(id).map(|e| e.value().clone()))
    }

    async fn update(&self, booking: TimeSlotBooking) -> StoreResult<()> {
        if !self.bookings.contains_key(&booking.id) {
            return Err(StoreError::new(format!("unknown booking {}", booking.id)));
        }
        self.bookings.insert(booking.id, booking);
        Ok(())
    }

    async fn confirmed_for_slot(
        &self,
        slot_id: &Ulid,
        date: NaiveDate,
    ) -> StoreResult<Vec<TimeSlotBooking>> {
        Ok(self
            .bookings
            .iter()
            .filter(|e| {
                let b = e.value();
                b.time_slot_id == *slot_id && b.booking_date == date && b.is_active()
            })
            .map(|e| e.value().clone())
            .collect())
    }

    async fn active_for_invitation(
        &self,
        invitation_id: &Ulid,
    ) -> StoreResult<Option<TimeSlotBooking>> {
        Ok(self
            .bookings
            .iter()
            .find(|e| {
                let b = e.value();
                b.invitation_id == Some(*invitation_id) && b.is_active()
            })
            .map(|e| e.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InvitationStatus, WeekdaySet};
    use chrono::NaiveTime;

    fn slot_at(start: (u32, u32), location_id: Option<Ulid>, active: bool) -> TimeSlot {
        TimeSlot {
            id: Ulid::new(),
            name: format!("{:02}:{:02}", start.0, start.1),
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(start.0 + 1, start.1, 0).unwrap(),
            max_visitors: 10,
            active_days: WeekdaySet::EMPTY,
            location_id,
            allow_overlapping: false,
            is_active: active,
        }
    }

    #[tokio::test]
    async fn active_for_location_includes_global_slots() {
        let store = MemoryStore::new();
        let loc = Ulid::new();
        let other = Ulid::new();
        store.put_slot(slot_at((9, 0), Some(loc), true));
        store.put_slot(slot_at((10, 0), None, true));
        store.put_slot(slot_at((11, 0), Some(other), true));

        let visible = store.active_for_location(Some(loc)).await.unwrap();
        assert_eq!(visible.len(), 2);
    }

    #[tokio::test]
    async fn active_for_location_orders_by_start_time() {
        let store = MemoryStore::new();
        store.put_slot(slot_at((14, 0), None, true));
        store.put_slot(slot_at((8, 30), None, true));
        store.put_slot(slot_at((11, 0), None, true));

        let slots = store.active_for_location(None).await.unwrap();
        let starts: Vec<_> = slots.iter().map(|s| s.start_time).collect();
        let mut sorted = starts.clone();
        sorted.sort();
        assert_eq!(starts, sorted);
    }

    #[tokio::test]
    async fn inactive_slots_are_hidden() {
        let store = MemoryStore::new();
        store.put_slot(slot_at((9, 0), None, false));
        assert!(store.active_for_location(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn admission_eligible_filters_status_and_deletion() {
        let store = MemoryStore::new();
        let base = Invitation {
            id: Ulid::new(),
            status: InvitationStatus::Approved,
            scheduled_start: Utc::now(),
            scheduled_end: Utc::now(),
            expected_visitor_count: 1,
            location_id: None,
            is_deleted: false,
        };
        store.put_invitation(base.clone());
        store.put_invitation(Invitation {
            id: Ulid::new(),
            status: InvitationStatus::Pending,
            ..base.clone()
        });
        store.put_invitation(Invitation {
            id: Ulid::new(),
            is_deleted: true,
            ..base.clone()
        });

        let eligible = store.admission_eligible().await.unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].id, base.id);
    }

    #[tokio::test]
    async fn active_for_invitation_skips_cancelled() {
        let store = MemoryStore::new();
        let invitation_id = Ulid::new();
        let mut booking = TimeSlotBooking::new(
            Ulid::new(),
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            Some(invitation_id),
            1,
            None,
            "reception",
            Utc::now(),
        );
        booking.cancel("host", "no-show", Utc::now());
        store.insert(booking).await.unwrap();

        assert!(store
            .active_for_invitation(&invitation_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn update_unknown_booking_fails() {
        let store = MemoryStore::new();
        let booking = TimeSlotBooking::new(
            Ulid::new(),
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            None,
            1,
            None,
            "reception",
            Utc::now(),
        );
        assert!(store.update(booking).await.is_err());
    }

    #[test]
    fn manual_clock_set_and_advance() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance(chrono::Duration::hours(2));
        assert_eq!(clock.now(), start + chrono::Duration::hours(2));
        clock.set(start);
        assert_eq!(clock.now(), start);
    }
}
