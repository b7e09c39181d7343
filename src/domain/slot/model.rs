//! Charging slot domain entity

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::DomainResult;
use crate::shared::errors::DomainError;

/// A fixed time interval at a station that at most one reservation may hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargingSlot {
    pub id: String,
    pub station_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Always equal to `reservation_id.is_some()`
    pub claimed: bool,
    pub reservation_id: Option<String>,
    pub owner_id: Option<String>,
}

impl ChargingSlot {
    pub fn new(
        station_id: impl Into<String>,
        start_time: DateTime<Utc>,
        length: Duration,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            station_id: station_id.into(),
            start_time,
            end_time: start_time + length,
            claimed: false,
            reservation_id: None,
            owner_id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn is_available(&self) -> bool {
        !self.claimed
    }

    pub fn is_held_by(&self, reservation_id: &str) -> bool {
        self.reservation_id.as_deref() == Some(reservation_id)
    }

    /// Calendar day (UTC) the slot starts on
    pub fn day(&self) -> NaiveDate {
        self.start_time.date_naive()
    }
}

/// Which slots a listing should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotAvailability {
    #[default]
    All,
    Claimed,
    Unclaimed,
}

impl SlotAvailability {
    pub fn matches(&self, slot: &ChargingSlot) -> bool {
        match self {
            Self::All => true,
            Self::Claimed => slot.claimed,
            Self::Unclaimed => !slot.claimed,
        }
    }
}

/// Result of an atomic claim attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed(ChargingSlot),
    /// The slot exists but is already held
    Conflict,
    NotFound,
}

/// Result of an atomic release attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,
    /// Slot absent, already free, or held by another reservation
    NotFound,
}

/// Opening hours used to generate a station's daily slots (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSchedule {
    pub opening_hour: u32,
    pub closing_hour: u32,
    pub slot_minutes: u32,
}

impl Default for SlotSchedule {
    fn default() -> Self {
        Self {
            opening_hour: 8,
            closing_hour: 18,
            slot_minutes: 60,
        }
    }
}

impl SlotSchedule {
    pub fn validate(&self) -> DomainResult<()> {
        if self.slot_minutes == 0 {
            return Err(DomainError::Validation("slot_minutes must be positive".into()));
        }
        if self.closing_hour > 24 || self.opening_hour >= self.closing_hour {
            return Err(DomainError::Validation(format!(
                "invalid opening hours {}..{}",
                self.opening_hour, self.closing_hour
            )));
        }
        Ok(())
    }

    /// Back-to-back, non-overlapping slots for `station_id` on `date`.
    pub fn daily_slots(&self, station_id: &str, date: NaiveDate) -> DomainResult<Vec<ChargingSlot>> {
        self.validate()?;

        let (day_start, _) = day_bounds(date);
        let length = Duration::minutes(i64::from(self.slot_minutes));
        let close = day_start + Duration::hours(i64::from(self.closing_hour));

        let mut slots = Vec::new();
        let mut start = day_start + Duration::hours(i64::from(self.opening_hour));
        while start + length <= close {
            slots.push(ChargingSlot::new(station_id, start, length));
            start += length;
        }
        Ok(slots)
    }
}

/// `[00:00, next 00:00)` of `date` in UTC.
pub fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 11).unwrap()
    }

    #[test]
    fn default_schedule_yields_ten_hourly_slots() {
        let slots = SlotSchedule::default().daily_slots("ST1", date()).unwrap();
        assert_eq!(slots.len(), 10);
        assert_eq!(slots[0].start_time.format("%H:%M").to_string(), "08:00");
        assert_eq!(slots[9].end_time.format("%H:%M").to_string(), "18:00");
        assert!(slots.iter().all(|s| !s.claimed && s.reservation_id.is_none()));
    }

    #[test]
    fn slots_do_not_overlap() {
        let slots = SlotSchedule::default().daily_slots("ST1", date()).unwrap();
        for pair in slots.windows(2) {
            assert_eq!(pair[0].end_time, pair[1].start_time);
        }
    }

    #[test]
    fn partial_trailing_slot_is_dropped() {
        let schedule = SlotSchedule {
            opening_hour: 8,
            closing_hour: 10,
            slot_minutes: 45,
        };
        let slots = schedule.daily_slots("ST1", date()).unwrap();
        assert_eq!(slots.len(), 2);
    }

    #[test]
    fn inverted_hours_are_rejected() {
        let schedule = SlotSchedule {
            opening_hour: 18,
            closing_hour: 8,
            slot_minutes: 60,
        };
        assert!(schedule.daily_slots("ST1", date()).is_err());
    }

    #[test]
    fn availability_filter() {
        let mut slot = ChargingSlot::new("ST1", day_bounds(date()).0, Duration::hours(1));
        assert!(SlotAvailability::Unclaimed.matches(&slot));
        slot.claimed = true;
        slot.reservation_id = Some("R1".into());
        assert!(SlotAvailability::Claimed.matches(&slot));
        assert!(SlotAvailability::All.matches(&slot));
        assert!(slot.is_held_by("R1"));
        assert!(!slot.is_held_by("R2"));
    }
}
