//! # EV Booking
//!
//! Reservation allocation engine for EV charging stations: at most one live
//! reservation per charging slot, time-window rules on booking and changing,
//! and a compensating two-store write path between slots and reservations.
//!
//! ## Architecture
//!
//! - **domain**: entities, the time policy and repository traits
//! - **application**: the allocator, read queries, slot and dashboard services
//! - **infrastructure**: SeaORM and in-memory repositories
//! - **interfaces**: REST API with Swagger documentation
//! - **server**: runtime lifecycle shared by the CLI

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod server;
pub mod shared;

pub use config::{default_config_path, AppConfig};

pub use infrastructure::{
    init_database, DatabaseConfig, InMemoryRepositoryProvider, SeaOrmRepositoryProvider,
};

pub use interfaces::http::create_api_router;

pub use application::{ReservationAllocator, ReservationQueries, SlotService};
pub use domain::{DomainError, RepositoryProvider, TimePolicy};
