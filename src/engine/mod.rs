mod alternatives;
mod bookings;
mod error;
mod occupancy;

pub use bookings::BookingRequest;
pub use error::EngineError;
pub use occupancy::CapacityRequest;

use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::Mutex;
use ulid::Ulid;

use crate::config::EngineConfig;
use crate::store::{
    BookingStore, Clock, InvitationDirectory, LocationDirectory, SystemClock, TimeSlotDirectory,
};

/// The capacity and booking engine.
///
/// Stateless apart from the booking-write lock registry; every data
/// dependency is an injected collaborator.
pub struct Engine {
    slots: Arc<dyn TimeSlotDirectory>,
    locations: Arc<dyn LocationDirectory>,
    invitations: Arc<dyn InvitationDirectory>,
    bookings: Arc<dyn BookingStore>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    /// One mutex per (slot, date): booking writes serialize around the
    /// capacity total for that slot instance.
    slot_locks: DashMap<(Ulid, NaiveDate), Arc<Mutex<()>>>,
}

impl Engine {
    pub fn new(
        slots: Arc<dyn TimeSlotDirectory>,
        locations: Arc<dyn LocationDirectory>,
        invitations: Arc<dyn InvitationDirectory>,
        bookings: Arc<dyn BookingStore>,
        config: EngineConfig,
    ) -> Self {
        Self::with_clock(
            slots,
            locations,
            invitations,
            bookings,
            config,
            Arc::new(SystemClock),
        )
    }

    pub fn with_clock(
        slots: Arc<dyn TimeSlotDirectory>,
        locations: Arc<dyn LocationDirectory>,
        invitations: Arc<dyn InvitationDirectory>,
        bookings: Arc<dyn BookingStore>,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            slots,
            locations,
            invitations,
            bookings,
            clock,
            config,
            slot_locks: DashMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn slot_lock(&self, slot_id: Ulid, date: NaiveDate) -> Arc<Mutex<()>> {
        self.slot_locks
            .entry((slot_id, date))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
