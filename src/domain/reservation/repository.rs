//! Reservation repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{Reservation, SlotAssignment, Transition};
use crate::domain::DomainResult;

/// Narrows an upcoming-reservations query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpcomingFilter {
    pub owner_id: Option<String>,
    pub station_id: Option<String>,
}

impl UpcomingFilter {
    pub fn owner(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: Some(owner_id.into()),
            station_id: None,
        }
    }

    pub fn station(station_id: impl Into<String>) -> Self {
        Self {
            owner_id: None,
            station_id: Some(station_id.into()),
        }
    }

    pub fn matches(&self, r: &Reservation) -> bool {
        self.owner_id.as_deref().map_or(true, |o| r.owner_id == o)
            && self.station_id.as_deref().map_or(true, |s| r.station_id == s)
    }
}

#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// Insert a new reservation
    async fn create(&self, reservation: Reservation) -> DomainResult<Reservation>;

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<Reservation>>;

    /// Apply `transition` iff its precondition holds at write time.
    ///
    /// Returns `None` when the reservation is missing or the precondition
    /// failed; the caller re-reads to tell which.
    async fn transition(
        &self,
        id: &str,
        transition: Transition,
        at: DateTime<Utc>,
    ) -> DomainResult<Option<Reservation>>;

    /// Rebind slot / station / time iff the reservation is open and still
    /// references `expected_slot_id`.
    async fn reassign(
        &self,
        id: &str,
        expected_slot_id: Option<&str>,
        assignment: SlotAssignment,
        at: DateTime<Utc>,
    ) -> DomainResult<Option<Reservation>>;

    async fn find_by_owner(&self, owner_id: &str) -> DomainResult<Vec<Reservation>>;

    async fn find_all(&self) -> DomainResult<Vec<Reservation>>;

    /// Open reservations with `reservation_time >= now`, soonest first
    async fn find_upcoming(
        &self,
        filter: &UpcomingFilter,
        now: DateTime<Utc>,
        limit: u64,
    ) -> DomainResult<Vec<Reservation>>;

    /// Reservations created at or after `since`
    async fn find_created_since(&self, since: DateTime<Utc>) -> DomainResult<Vec<Reservation>>;
}
