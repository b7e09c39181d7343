//! Charging slot repository interface

use async_trait::async_trait;
use chrono::NaiveDate;

use super::model::{ChargingSlot, ClaimOutcome, ReleaseOutcome, SlotAvailability};
use crate::domain::DomainResult;

/// Slot storage with atomic claim/release.
///
/// `claim` and `release` must each be a single conditional write at the
/// storage layer. Implementations never read, decide, then write.
#[async_trait]
pub trait SlotRepository: Send + Sync {
    /// Insert freshly generated slots
    async fn insert_many(&self, slots: Vec<ChargingSlot>) -> DomainResult<u64>;

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<ChargingSlot>>;

    /// Unclaimed → claimed, conditioned on `claimed == false`.
    async fn claim(
        &self,
        slot_id: &str,
        owner_id: &str,
        reservation_id: &str,
    ) -> DomainResult<ClaimOutcome>;

    /// Claimed → unclaimed, conditioned on `reservation_id == expected_reservation_id`.
    async fn release(
        &self,
        slot_id: &str,
        expected_reservation_id: &str,
    ) -> DomainResult<ReleaseOutcome>;

    /// Slots of one station starting on `day`, ordered by start time
    async fn list_by_station_and_day(
        &self,
        station_id: &str,
        day: NaiveDate,
        availability: SlotAvailability,
    ) -> DomainResult<Vec<ChargingSlot>>;

    async fn delete(&self, id: &str) -> DomainResult<bool>;

    async fn delete_by_station_and_day(&self, station_id: &str, day: NaiveDate) -> DomainResult<u64>;
}
