//! Charging slot DTOs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{ChargingSlot, SlotAvailability};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SlotDto {
    pub id: String,
    pub station_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub claimed: bool,
    pub reservation_id: Option<String>,
    pub owner_id: Option<String>,
}

impl From<ChargingSlot> for SlotDto {
    fn from(s: ChargingSlot) -> Self {
        Self {
            id: s.id,
            station_id: s.station_id,
            start_time: s.start_time,
            end_time: s.end_time,
            claimed: s.claimed,
            reservation_id: s.reservation_id,
            owner_id: s.owner_id,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityParam {
    #[default]
    All,
    Claimed,
    Unclaimed,
}

impl From<AvailabilityParam> for SlotAvailability {
    fn from(p: AvailabilityParam) -> Self {
        match p {
            AvailabilityParam::All => SlotAvailability::All,
            AvailabilityParam::Claimed => SlotAvailability::Claimed,
            AvailabilityParam::Unclaimed => SlotAvailability::Unclaimed,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SlotListQuery {
    /// all (default), claimed or unclaimed
    pub availability: Option<AvailabilityParam>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StationDaySlots {
    pub station_id: String,
    pub date: NaiveDate,
    pub slots: Vec<SlotDto>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeletedSlots {
    pub deleted: u64,
}
