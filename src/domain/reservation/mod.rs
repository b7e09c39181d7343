//! Reservation aggregate
//!
//! Contains the Reservation entity, its lifecycle transitions, and the
//! repository interface.

pub mod model;
pub mod repository;

pub use model::{Reservation, ReservationStatus, SlotAssignment, Transition};
pub use repository::{ReservationRepository, UpcomingFilter};
