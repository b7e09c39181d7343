//! Reservation DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::application::ReopenOutcome;
use crate::domain::Reservation;
use crate::shared::FieldUpdate;

/// Reservation details in API responses
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReservationDto {
    pub id: String,
    pub owner_id: String,
    pub station_id: String,
    /// `null` for slot-less reservations
    pub slot_id: Option<String>,
    pub reservation_time: DateTime<Utc>,
    /// Pending, Approved, Confirmed, Completed or Canceled
    pub status: String,
    pub approved: bool,
    pub confirmed: bool,
    pub completed: bool,
    pub canceled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Reservation> for ReservationDto {
    fn from(r: Reservation) -> Self {
        Self {
            status: r.status().to_string(),
            id: r.id,
            owner_id: r.owner_id,
            station_id: r.station_id,
            slot_id: r.slot_id,
            reservation_time: r.reservation_time,
            approved: r.approved,
            confirmed: r.confirmed,
            completed: r.completed,
            canceled: r.canceled,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Book a slot, or a bare station and time when `slot_id` is omitted.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateReservationRequest {
    #[validate(length(min = 1, max = 64))]
    pub slot_id: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub station_id: Option<String>,
    /// Required without `slot_id`; must equal the slot's start otherwise
    pub reservation_time: Option<DateTime<Utc>>,
    /// Backoffice only: book on behalf of this owner
    #[validate(length(min = 1, max = 64))]
    pub owner_id: Option<String>,
}

/// Partial update. An absent `slot_id` leaves the slot alone, `null` releases
/// it, a value moves the reservation to that slot.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateReservationRequest {
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub slot_id: FieldUpdate<String>,
    #[validate(length(min = 1, max = 64))]
    pub station_id: Option<String>,
    pub reservation_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReopenResponse {
    pub reservation: ReservationDto,
    /// Set when the previous slot could not be re-attached
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// `slot_missing`, `slot_taken` or `reattach_failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning_code: Option<String>,
}

impl From<ReopenOutcome> for ReopenResponse {
    fn from(outcome: ReopenOutcome) -> Self {
        Self {
            reservation: outcome.reservation.into(),
            warning: outcome.warning.map(|w| w.message().to_string()),
            warning_code: outcome.warning.map(|w| w.code().to_string()),
        }
    }
}

pub const DEFAULT_UPCOMING_LIMIT: u64 = 10;
pub const MAX_UPCOMING_LIMIT: u64 = 100;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct UpcomingQuery {
    /// How many reservations to return (default 10, at most 100)
    pub limit: Option<u64>,
}

impl UpcomingQuery {
    pub fn limit(&self) -> u64 {
        self.limit
            .unwrap_or(DEFAULT_UPCOMING_LIMIT)
            .min(MAX_UPCOMING_LIMIT)
    }
}
