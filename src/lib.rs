//! Facility-visit capacity and time-slot booking engine.
//!
//! Decides whether a requested number of visitors can be admitted at a
//! place and time, proposes alternative windows when they cannot, and
//! manages capacity-bounded time-slot bookings. Invoked in-process; data
//! collaborators are injected through the traits in [`store`].

pub mod config;
pub mod engine;
pub mod model;
pub mod observability;
pub mod store;

pub use config::EngineConfig;
pub use engine::{BookingRequest, CapacityRequest, Engine, EngineError};
pub use store::{
    BookingStore, Clock, InvitationDirectory, LocationDirectory, ManualClock, MemoryStore,
    StoreError, SystemClock, TimeSlotDirectory,
};
