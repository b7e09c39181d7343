//! Application layer - use-cases orchestrating the domain
//!
//! - `reservations`: the allocator (write path) and reservation queries
//! - `slots`: daily slot generation and removal
//! - `dashboard`: role-specific summaries

pub mod dashboard;
pub mod reservations;
pub mod slots;

pub use dashboard::{DashboardService, DashboardSummary, SlotCounts};
pub use reservations::{
    CreateReservation, DailyCount, ReopenOutcome, ReopenWarning, ReservationAllocator,
    ReservationQueries, ReservationUpdate,
};
pub use slots::SlotService;
