//! Charging slot HTTP handlers

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;

use crate::application::SlotService;
use crate::domain::ChargingSlot;
use crate::interfaces::http::common::error::ApiResult;
use crate::interfaces::http::common::{ApiError, ApiResponse};

use super::dto::*;

#[derive(Clone)]
pub struct SlotAppState {
    pub slots: Arc<SlotService>,
}

fn day(station_id: String, date: NaiveDate, slots: Vec<ChargingSlot>) -> StationDaySlots {
    StationDaySlots {
        station_id,
        date,
        slots: slots.into_iter().map(Into::into).collect(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/stations/{station_id}/slots/{date}",
    tag = "Slots",
    params(
        ("station_id" = String, Path, description = "Station ID"),
        ("date" = String, Path, description = "Day to initialize (YYYY-MM-DD, UTC)")
    ),
    responses(
        (status = 201, description = "Slots generated for the day", body = ApiResponse<StationDaySlots>),
        (status = 409, description = "Day already initialized")
    )
)]
pub async fn initialize_slots(
    State(state): State<SlotAppState>,
    Path((station_id, date)): Path<(String, NaiveDate)>,
) -> Result<(StatusCode, Json<ApiResponse<StationDaySlots>>), ApiError> {
    let slots = state.slots.initialize_daily_slots(&station_id, date).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(day(station_id, date, slots))),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/stations/{station_id}/slots/{date}",
    tag = "Slots",
    params(
        ("station_id" = String, Path, description = "Station ID"),
        ("date" = String, Path, description = "Day (YYYY-MM-DD, UTC)"),
        SlotListQuery
    ),
    responses(
        (status = 200, description = "Slots ordered by start time", body = ApiResponse<StationDaySlots>)
    )
)]
pub async fn list_slots(
    State(state): State<SlotAppState>,
    Path((station_id, date)): Path<(String, NaiveDate)>,
    Query(query): Query<SlotListQuery>,
) -> ApiResult<StationDaySlots> {
    let availability = query.availability.unwrap_or_default().into();
    let slots = state.slots.list(&station_id, date, availability).await?;
    Ok(Json(ApiResponse::success(day(station_id, date, slots))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/stations/{station_id}/slots/{date}",
    tag = "Slots",
    params(
        ("station_id" = String, Path, description = "Station ID"),
        ("date" = String, Path, description = "Day (YYYY-MM-DD, UTC)")
    ),
    responses(
        (status = 200, description = "Slots removed", body = ApiResponse<DeletedSlots>),
        (status = 404, description = "No slots for that station and day")
    )
)]
pub async fn deinitialize_slots(
    State(state): State<SlotAppState>,
    Path((station_id, date)): Path<(String, NaiveDate)>,
) -> ApiResult<DeletedSlots> {
    let deleted = state.slots.deinitialize_day(&station_id, date).await?;
    Ok(Json(ApiResponse::success(DeletedSlots { deleted })))
}

#[utoipa::path(
    get,
    path = "/api/v1/slots/{id}",
    tag = "Slots",
    params(("id" = String, Path, description = "Slot ID")),
    responses(
        (status = 200, description = "Slot", body = ApiResponse<SlotDto>),
        (status = 404, description = "Slot not found")
    )
)]
pub async fn get_slot(
    State(state): State<SlotAppState>,
    Path(id): Path<String>,
) -> ApiResult<SlotDto> {
    let slot = state.slots.get_slot(&id).await?;
    Ok(Json(ApiResponse::success(slot.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/slots/{id}",
    tag = "Slots",
    params(("id" = String, Path, description = "Slot ID")),
    responses(
        (status = 200, description = "Slot deleted", body = ApiResponse<DeletedSlots>),
        (status = 404, description = "Slot not found")
    )
)]
pub async fn delete_slot(
    State(state): State<SlotAppState>,
    Path(id): Path<String>,
) -> ApiResult<DeletedSlots> {
    state.slots.delete_slot(&id).await?;
    Ok(Json(ApiResponse::success(DeletedSlots { deleted: 1 })))
}
