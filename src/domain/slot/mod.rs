//! Charging slot aggregate

pub mod model;
pub mod repository;

pub use model::{
    day_bounds, ChargingSlot, ClaimOutcome, ReleaseOutcome, SlotAvailability, SlotSchedule,
};
pub use repository::SlotRepository;
