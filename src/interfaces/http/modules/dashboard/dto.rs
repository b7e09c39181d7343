//! Dashboard DTOs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::application::{DailyCount, DashboardSummary, SlotCounts};
use crate::interfaces::http::modules::reservations::ReservationDto;

#[derive(Debug, Serialize, ToSchema)]
pub struct DailyCountDto {
    pub date: NaiveDate,
    pub count: u64,
}

impl From<DailyCount> for DailyCountDto {
    fn from(d: DailyCount) -> Self {
        Self {
            date: d.date,
            count: d.count,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SlotCountsDto {
    pub total: u64,
    pub booked: u64,
    pub available: u64,
}

impl From<SlotCounts> for SlotCountsDto {
    fn from(c: SlotCounts) -> Self {
        Self {
            total: c.total,
            booked: c.booked,
            available: c.available,
        }
    }
}

/// Role-specific summary; only the fields for `role` are present.
#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardResponse {
    /// ev_owner, backoffice or station_operator
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_bookings: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_charges: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slots_today: Option<SlotCountsDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upcoming: Option<Vec<ReservationDto>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<Vec<DailyCountDto>>,
}

impl DashboardResponse {
    fn empty(role: &str) -> Self {
        Self {
            role: role.to_string(),
            total_bookings: None,
            completed_charges: None,
            station_id: None,
            slots_today: None,
            upcoming: None,
            trend: None,
        }
    }
}

impl From<DashboardSummary> for DashboardResponse {
    fn from(summary: DashboardSummary) -> Self {
        match summary {
            DashboardSummary::EvOwner {
                total_bookings,
                completed_charges,
                upcoming,
            } => Self {
                total_bookings: Some(total_bookings),
                completed_charges: Some(completed_charges),
                upcoming: Some(upcoming.into_iter().map(Into::into).collect()),
                ..Self::empty("ev_owner")
            },
            DashboardSummary::Backoffice {
                total_bookings,
                trend,
            } => Self {
                total_bookings: Some(total_bookings),
                trend: Some(trend.into_iter().map(Into::into).collect()),
                ..Self::empty("backoffice")
            },
            DashboardSummary::StationOperator {
                station_id,
                slots_today,
                upcoming,
            } => Self {
                station_id: Some(station_id),
                slots_today: Some(slots_today.into()),
                upcoming: Some(upcoming.into_iter().map(Into::into).collect()),
                ..Self::empty("station_operator")
            },
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct TrendQuery {
    /// Number of days back, today included (default 7, at most 366)
    pub days: Option<u32>,
}
