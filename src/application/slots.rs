//! Slot management: generating, listing and removing a station's daily slots
//!
//! This service owns slot lifetime. Deleting a claimed slot is allowed; the
//! allocator copes with vanished slots when a reservation is reopened.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use crate::domain::{
    ChargingSlot, DomainError, DomainResult, RepositoryProvider, SlotAvailability, SlotSchedule,
};

pub struct SlotService {
    repos: Arc<dyn RepositoryProvider>,
    schedule: SlotSchedule,
}

impl SlotService {
    pub fn new(repos: Arc<dyn RepositoryProvider>, schedule: SlotSchedule) -> Self {
        Self { repos, schedule }
    }

    pub fn schedule(&self) -> &SlotSchedule {
        &self.schedule
    }

    /// Generate the day's slots for a station. A day can be initialized once.
    pub async fn initialize_daily_slots(
        &self,
        station_id: &str,
        date: NaiveDate,
    ) -> DomainResult<Vec<ChargingSlot>> {
        if station_id.trim().is_empty() {
            return Err(DomainError::Validation("station_id is required".into()));
        }

        let already_initialized = || {
            DomainError::Conflict(format!(
                "slots for station {} on {} are already initialized",
                station_id, date
            ))
        };

        let existing = self.list(station_id, date, SlotAvailability::All).await?;
        if !existing.is_empty() {
            return Err(already_initialized());
        }

        // The store refuses a second slot at the same station and start
        // time, which settles racing initializations of one day.
        let slots = self.schedule.daily_slots(station_id, date)?;
        let inserted = match self.repos.slots().insert_many(slots.clone()).await {
            Ok(inserted) => inserted,
            Err(DomainError::Conflict(_)) => return Err(already_initialized()),
            Err(e) => return Err(e),
        };
        info!(station_id, %date, inserted, "🗓️ Daily slots initialized");
        Ok(slots)
    }

    pub async fn list(
        &self,
        station_id: &str,
        date: NaiveDate,
        availability: SlotAvailability,
    ) -> DomainResult<Vec<ChargingSlot>> {
        self.repos
            .slots()
            .list_by_station_and_day(station_id, date, availability)
            .await
    }

    pub async fn available_slots(&self, station_id: &str, date: NaiveDate) -> DomainResult<Vec<ChargingSlot>> {
        self.list(station_id, date, SlotAvailability::Unclaimed).await
    }

    pub async fn booked_slots(&self, station_id: &str, date: NaiveDate) -> DomainResult<Vec<ChargingSlot>> {
        self.list(station_id, date, SlotAvailability::Claimed).await
    }

    pub async fn all_slots(&self, station_id: &str, date: NaiveDate) -> DomainResult<Vec<ChargingSlot>> {
        self.list(station_id, date, SlotAvailability::All).await
    }

    pub async fn get_slot(&self, id: &str) -> DomainResult<ChargingSlot> {
        self.repos
            .slots()
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("ChargingSlot", id))
    }

    pub async fn delete_slot(&self, id: &str) -> DomainResult<()> {
        if !self.repos.slots().delete(id).await? {
            return Err(DomainError::not_found("ChargingSlot", id));
        }
        info!(slot_id = id, "Slot deleted");
        Ok(())
    }

    /// Remove every slot of a station on `date`; returns how many went.
    pub async fn deinitialize_day(&self, station_id: &str, date: NaiveDate) -> DomainResult<u64> {
        let deleted = self
            .repos
            .slots()
            .delete_by_station_and_day(station_id, date)
            .await?;
        if deleted == 0 {
            return Err(DomainError::NotFound {
                entity: "ChargingSlot",
                field: "station_day",
                value: format!("{}/{}", station_id, date),
            });
        }
        info!(station_id, %date, deleted, "Daily slots removed");
        Ok(deleted)
    }
}
