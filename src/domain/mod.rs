pub mod identity;
pub mod policy;
pub mod repositories;
pub mod reservation;
pub mod slot;

// Re-export commonly used types
pub use identity::{CallerIdentity, Role};
pub use policy::TimePolicy;
pub use repositories::{DomainResult, RepositoryProvider};
pub use reservation::{
    Reservation, ReservationRepository, ReservationStatus, SlotAssignment, Transition,
    UpcomingFilter,
};
pub use slot::{
    ChargingSlot, ClaimOutcome, ReleaseOutcome, SlotAvailability, SlotRepository, SlotSchedule,
};

pub use crate::shared::errors::DomainError;
