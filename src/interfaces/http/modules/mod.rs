pub mod dashboard;
pub mod health;
pub mod metrics;
pub mod reservations;
pub mod slots;
