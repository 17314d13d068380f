use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

pub const MAX_ACTOR_LEN: usize = 128;
pub const MAX_NOTES_LEN: usize = 1024;

/// Bitmask over the 7 ISO weekdays, bit 0 = Monday.
///
/// An empty set means "runs every day" wherever slot applicability is
/// evaluated; see [`WeekdaySet::applies_on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub const EMPTY: WeekdaySet = WeekdaySet(0);

    pub fn of(days: &[Weekday]) -> Self {
        let mut set = WeekdaySet(0);
        for day in days {
            set.insert(*day);
        }
        set
    }

    /// Monday through Friday.
    pub fn weekdays() -> Self {
        Self::of(&[
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
        ])
    }

    fn bit(day: Weekday) -> u8 {
        1 << (day.number_from_monday() - 1)
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= Self::bit(day);
    }

    pub fn remove(&mut self, day: Weekday) {
        self.0 &= !Self::bit(day);
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & Self::bit(day) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Whether a slot with this day set runs on `day`. Empty means every day.
    pub fn applies_on(&self, day: Weekday) -> bool {
        self.is_empty() || self.contains(day)
    }
}

/// A physical place with a visitor ceiling. Owned by external location
/// management; read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: Ulid,
    pub name: String,
    pub max_capacity: u32,
    pub is_active: bool,
}

/// A named recurring daily window bookings are made against. Read-only
/// here; lifecycle managed externally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: Ulid,
    pub name: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_visitors: u32,
    pub active_days: WeekdaySet,
    /// None applies the slot across all locations.
    pub location_id: Option<Ulid>,
    pub allow_overlapping: bool,
    pub is_active: bool,
}

impl TimeSlot {
    /// Inclusive on both ends, matching the invitation interval convention.
    pub fn covers_time(&self, t: NaiveTime) -> bool {
        self.start_time <= t && t <= self.end_time
    }

    /// The instant this slot begins on a given date.
    pub fn starts_on(&self, date: NaiveDate) -> DateTime<Utc> {
        date.and_time(self.start_time).and_utc()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "Confirmed",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One reservation of a visitor count against one slot instance.
///
/// Confirmed is the initial state; Cancelled is terminal. No other
/// transition exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlotBooking {
    pub id: Ulid,
    pub time_slot_id: Ulid,
    pub booking_date: NaiveDate,
    pub invitation_id: Option<Ulid>,
    pub visitor_count: u32,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub booked_by: String,
    pub booked_on: DateTime<Utc>,
    pub cancelled_by: Option<String>,
    pub cancelled_on: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
}

impl TimeSlotBooking {
    pub fn new(
        time_slot_id: Ulid,
        booking_date: NaiveDate,
        invitation_id: Option<Ulid>,
        visitor_count: u32,
        notes: Option<String>,
        booked_by: impl Into<String>,
        booked_on: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Ulid::new(),
            time_slot_id,
            booking_date,
            invitation_id,
            visitor_count,
            status: BookingStatus::Confirmed,
            notes,
            booked_by: booked_by.into(),
            booked_on,
            cancelled_by: None,
            cancelled_on: None,
            cancellation_reason: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == BookingStatus::Confirmed
    }

    pub fn cancel(&mut self, by: impl Into<String>, reason: impl Into<String>, at: DateTime<Utc>) {
        self.status = BookingStatus::Cancelled;
        self.cancelled_by = Some(by.into());
        self.cancelled_on = Some(at);
        self.cancellation_reason = Some(reason.into());
    }

    /// Entity-level rules, aggregated so the caller sees every violation at
    /// once.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.visitor_count == 0 {
            errors.push("visitor count must be at least 1".to_string());
        }
        if self.booked_by.trim().is_empty() {
            errors.push("booked_by must not be empty".to_string());
        }
        if self.booked_by.len() > MAX_ACTOR_LEN {
            errors.push(format!("booked_by exceeds {MAX_ACTOR_LEN} characters"));
        }
        if let Some(notes) = &self.notes
            && notes.len() > MAX_NOTES_LEN {
                errors.push(format!("notes exceed {MAX_NOTES_LEN} characters"));
            }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvitationStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Expired,
}

impl InvitationStatus {
    /// Only approved invitations count toward occupancy.
    pub fn is_admission_eligible(&self) -> bool {
        matches!(self, Self::Approved)
    }
}

/// A scheduled visit contributing to occupancy. Read-only input; its
/// lifecycle belongs to other subsystems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: Ulid,
    pub status: InvitationStatus,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub expected_visitor_count: u32,
    pub location_id: Option<Ulid>,
    pub is_deleted: bool,
}

impl Invitation {
    /// The scheduled interval is inclusive on both ends.
    pub fn covers(&self, at: DateTime<Utc>) -> bool {
        self.scheduled_start <= at && at <= self.scheduled_end
    }

    pub fn matches_location(&self, location_id: Option<Ulid>) -> bool {
        location_id.is_none_or(|l| self.location_id == Some(l))
    }
}

// ── Result types ─────────────────────────────────────────────────

/// Outcome of a capacity validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapacityValidation {
    pub is_available: bool,
    pub max_capacity: u32,
    pub current_occupancy: u32,
    /// May go negative when occupancy already exceeds capacity.
    pub available_capacity: i64,
    pub occupancy_percent: f64,
    pub warning_level: bool,
    pub messages: Vec<String>,
    pub alternatives: Vec<AlternativeSlot>,
}

/// A future slot instance with enough spare capacity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlternativeSlot {
    pub time_slot_id: Ulid,
    pub name: String,
    pub starts_at: DateTime<Utc>,
    pub available_capacity: u32,
    pub occupancy_percent: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn weekday_set_bits() {
        let mut set = WeekdaySet::EMPTY;
        set.insert(Weekday::Mon);
        set.insert(Weekday::Sun);
        assert!(set.contains(Weekday::Mon));
        assert!(set.contains(Weekday::Sun));
        assert!(!set.contains(Weekday::Wed));
        set.remove(Weekday::Mon);
        assert!(!set.contains(Weekday::Mon));
    }

    #[test]
    fn weekday_set_all_seven() {
        let all = [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ];
        let set = WeekdaySet::of(&all);
        for day in all {
            assert!(set.contains(day));
        }
    }

    #[test]
    fn empty_weekday_set_applies_every_day() {
        let set = WeekdaySet::EMPTY;
        assert!(set.is_empty());
        assert!(set.applies_on(Weekday::Mon));
        assert!(set.applies_on(Weekday::Sun));
    }

    #[test]
    fn nonempty_weekday_set_applies_only_on_members() {
        let set = WeekdaySet::weekdays();
        assert!(set.applies_on(Weekday::Fri));
        assert!(!set.applies_on(Weekday::Sat));
    }

    #[test]
    fn slot_covers_time_inclusive() {
        let slot = TimeSlot {
            id: Ulid::new(),
            name: "Morning".into(),
            start_time: t(9, 0),
            end_time: t(12, 0),
            max_visitors: 10,
            active_days: WeekdaySet::EMPTY,
            location_id: None,
            allow_overlapping: false,
            is_active: true,
        };
        assert!(slot.covers_time(t(9, 0)));
        assert!(slot.covers_time(t(12, 0)));
        assert!(!slot.covers_time(t(12, 1)));
        assert!(!slot.covers_time(t(8, 59)));
    }

    #[test]
    fn invitation_covers_inclusive_bounds() {
        let inv = Invitation {
            id: Ulid::new(),
            status: InvitationStatus::Approved,
            scheduled_start: utc(2026, 3, 2, 9),
            scheduled_end: utc(2026, 3, 2, 11),
            expected_visitor_count: 3,
            location_id: None,
            is_deleted: false,
        };
        assert!(inv.covers(utc(2026, 3, 2, 9)));
        assert!(inv.covers(utc(2026, 3, 2, 11)));
        assert!(!inv.covers(utc(2026, 3, 2, 12)));
    }

    #[test]
    fn invitation_location_matching() {
        let loc = Ulid::new();
        let inv = Invitation {
            id: Ulid::new(),
            status: InvitationStatus::Approved,
            scheduled_start: utc(2026, 3, 2, 9),
            scheduled_end: utc(2026, 3, 2, 11),
            expected_visitor_count: 3,
            location_id: Some(loc),
            is_deleted: false,
        };
        assert!(inv.matches_location(None));
        assert!(inv.matches_location(Some(loc)));
        assert!(!inv.matches_location(Some(Ulid::new())));
    }

    fn sample_booking() -> TimeSlotBooking {
        TimeSlotBooking::new(
            Ulid::new(),
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            None,
            2,
            None,
            "reception",
            utc(2026, 3, 1, 12),
        )
    }

    #[test]
    fn new_booking_is_confirmed() {
        let b = sample_booking();
        assert_eq!(b.status, BookingStatus::Confirmed);
        assert!(b.is_active());
        assert!(b.cancelled_on.is_none());
    }

    #[test]
    fn cancel_records_audit_fields() {
        let mut b = sample_booking();
        let at = utc(2026, 3, 1, 13);
        b.cancel("host", "visit called off", at);
        assert_eq!(b.status, BookingStatus::Cancelled);
        assert!(!b.is_active());
        assert_eq!(b.cancelled_by.as_deref(), Some("host"));
        assert_eq!(b.cancelled_on, Some(at));
        assert_eq!(b.cancellation_reason.as_deref(), Some("visit called off"));
    }

    #[test]
    fn validate_aggregates_every_violation() {
        let mut b = sample_booking();
        b.visitor_count = 0;
        b.booked_by = String::new();
        let errors = b.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn validate_rejects_oversized_notes() {
        let mut b = sample_booking();
        b.notes = Some("x".repeat(MAX_NOTES_LEN + 1));
        assert!(b.validate().is_err());
    }

    #[test]
    fn validate_accepts_well_formed_booking() {
        assert!(sample_booking().validate().is_ok());
    }

    #[test]
    fn booking_status_display() {
        assert_eq!(BookingStatus::Confirmed.to_string(), "Confirmed");
        assert_eq!(BookingStatus::Cancelled.to_string(), "Cancelled");
    }
}
