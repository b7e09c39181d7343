//! Database entities module

pub mod charging_slot;
pub mod reservation;

pub use charging_slot::Entity as ChargingSlot;
pub use reservation::Entity as Reservation;
