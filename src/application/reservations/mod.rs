//! Reservation use-cases
//!
//! - [`ReservationAllocator`]: create / update / cancel / approve / confirm /
//!   complete / reopen, with claim compensation
//! - [`ReservationQueries`]: lookups, upcoming lists and booking trends

pub mod allocator;
pub mod queries;


pub use allocator::{
    CreateReservation, ReopenOutcome, ReopenWarning, ReservationAllocator, ReservationUpdate,
};
pub use queries::{DailyCount, ReservationQueries, MAX_TREND_DAYS};
