//! Reservation HTTP handlers

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::info;

use crate::application::{CreateReservation, ReservationAllocator, ReservationQueries, ReservationUpdate};
use crate::domain::{Role, UpcomingFilter};
use crate::interfaces::http::common::error::ApiResult;
use crate::interfaces::http::common::{ApiError, ApiResponse, Caller, RequestDeadline, ValidatedJson};

use super::dto::*;

/// Application state for reservation handlers.
#[derive(Clone)]
pub struct ReservationAppState {
    pub allocator: Arc<ReservationAllocator>,
    pub queries: Arc<ReservationQueries>,
}

fn ok(r: crate::domain::Reservation) -> ApiResult<ReservationDto> {
    Ok(Json(ApiResponse::success(r.into())))
}

fn list(rs: Vec<crate::domain::Reservation>) -> ApiResult<Vec<ReservationDto>> {
    Ok(Json(ApiResponse::success(rs.into_iter().map(Into::into).collect())))
}

#[utoipa::path(
    post,
    path = "/api/v1/reservations",
    tag = "Reservations",
    request_body = CreateReservationRequest,
    responses(
        (status = 201, description = "Reservation created", body = ApiResponse<ReservationDto>),
        (status = 400, description = "Outside the booking window or malformed headers"),
        (status = 404, description = "Slot not found"),
        (status = 409, description = "Slot already booked"),
        (status = 422, description = "Invalid request body"),
        (status = 504, description = "Request deadline passed")
    )
)]
pub async fn create_reservation(
    State(state): State<ReservationAppState>,
    Caller(caller): Caller,
    RequestDeadline(deadline): RequestDeadline,
    ValidatedJson(request): ValidatedJson<CreateReservationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ReservationDto>>), ApiError> {
    let owner_id = match request.owner_id {
        Some(owner) if owner != caller.user_id => {
            if !caller.is_backoffice() {
                return Err(ApiError::new(
                    StatusCode::FORBIDDEN,
                    "forbidden",
                    "only backoffice may book on behalf of another owner",
                ));
            }
            owner
        }
        _ => caller.user_id.clone(),
    };

    let reservation = state
        .allocator
        .create(CreateReservation {
            owner_id,
            station_id: request.station_id,
            slot_id: request.slot_id,
            reservation_time: request.reservation_time,
            deadline,
        })
        .await?;

    info!(
        reservation_id = %reservation.id,
        requested_by = %caller.user_id,
        "Reservation created via API"
    );
    Ok((StatusCode::CREATED, Json(ApiResponse::success(reservation.into()))))
}

#[utoipa::path(
    get,
    path = "/api/v1/reservations",
    tag = "Reservations",
    responses(
        (status = 200, description = "All reservations, newest first", body = ApiResponse<Vec<ReservationDto>>)
    )
)]
pub async fn list_reservations(
    State(state): State<ReservationAppState>,
) -> ApiResult<Vec<ReservationDto>> {
    list(state.queries.list_all().await?)
}

#[utoipa::path(
    get,
    path = "/api/v1/reservations/mine",
    tag = "Reservations",
    responses(
        (status = 200, description = "The caller's reservations, newest first", body = ApiResponse<Vec<ReservationDto>>),
        (status = 401, description = "Missing identity headers")
    )
)]
pub async fn list_my_reservations(
    State(state): State<ReservationAppState>,
    Caller(caller): Caller,
) -> ApiResult<Vec<ReservationDto>> {
    list(state.queries.list_by_owner(&caller.user_id).await?)
}

/// Owners see their own bookings, operators their station's, backoffice all.
#[utoipa::path(
    get,
    path = "/api/v1/reservations/upcoming",
    tag = "Reservations",
    params(UpcomingQuery),
    responses(
        (status = 200, description = "Open reservations from now on, soonest first", body = ApiResponse<Vec<ReservationDto>>),
        (status = 401, description = "Missing identity headers")
    )
)]
pub async fn list_upcoming_reservations(
    State(state): State<ReservationAppState>,
    Caller(caller): Caller,
    Query(query): Query<UpcomingQuery>,
) -> ApiResult<Vec<ReservationDto>> {
    let filter = match (caller.role, caller.station_id) {
        (Role::EvOwner, _) => UpcomingFilter::owner(caller.user_id),
        (Role::StationOperator, Some(station)) => UpcomingFilter::station(station),
        (Role::StationOperator, None) => {
            return Err(ApiError::bad_request("X-Station-Id is required for station operators"))
        }
        (Role::Backoffice, _) => UpcomingFilter::default(),
    };
    list(state.queries.list_upcoming(&filter, query.limit()).await?)
}

#[utoipa::path(
    get,
    path = "/api/v1/reservations/{id}",
    tag = "Reservations",
    params(("id" = String, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation", body = ApiResponse<ReservationDto>),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn get_reservation(
    State(state): State<ReservationAppState>,
    Path(id): Path<String>,
) -> ApiResult<ReservationDto> {
    ok(state.queries.get(&id).await?)
}

#[utoipa::path(
    patch,
    path = "/api/v1/reservations/{id}",
    tag = "Reservations",
    params(("id" = String, Path, description = "Reservation ID")),
    request_body = UpdateReservationRequest,
    responses(
        (status = 200, description = "Updated reservation", body = ApiResponse<ReservationDto>),
        (status = 400, description = "Inside the lockout window, outside the booking window, or not modifiable"),
        (status = 404, description = "Reservation or slot not found"),
        (status = 409, description = "Target slot already booked")
    )
)]
pub async fn update_reservation(
    State(state): State<ReservationAppState>,
    Caller(caller): Caller,
    RequestDeadline(deadline): RequestDeadline,
    Path(id): Path<String>,
    ValidatedJson(request): ValidatedJson<UpdateReservationRequest>,
) -> ApiResult<ReservationDto> {
    let updated = state
        .allocator
        .update(
            &id,
            ReservationUpdate {
                slot: request.slot_id,
                station_id: request.station_id,
                reservation_time: request.reservation_time,
                deadline,
            },
        )
        .await?;
    info!(reservation_id = %id, requested_by = %caller.user_id, "Reservation updated via API");
    ok(updated)
}

#[utoipa::path(
    post,
    path = "/api/v1/reservations/{id}/cancel",
    tag = "Reservations",
    params(("id" = String, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Canceled; the slot is free again", body = ApiResponse<ReservationDto>),
        (status = 400, description = "Inside the lockout window, or already canceled/completed"),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn cancel_reservation(
    State(state): State<ReservationAppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> ApiResult<ReservationDto> {
    let canceled = state.allocator.cancel(&id).await?;
    info!(reservation_id = %id, requested_by = %caller.user_id, "Reservation canceled via API");
    ok(canceled)
}

#[utoipa::path(
    post,
    path = "/api/v1/reservations/{id}/approve",
    tag = "Reservations",
    params(("id" = String, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Approved", body = ApiResponse<ReservationDto>),
        (status = 400, description = "Canceled or completed"),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn approve_reservation(
    State(state): State<ReservationAppState>,
    Path(id): Path<String>,
) -> ApiResult<ReservationDto> {
    ok(state.allocator.approve(&id).await?)
}

#[utoipa::path(
    post,
    path = "/api/v1/reservations/{id}/confirm",
    tag = "Reservations",
    params(("id" = String, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Confirmed by the station", body = ApiResponse<ReservationDto>),
        (status = 400, description = "Canceled or completed"),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn confirm_reservation(
    State(state): State<ReservationAppState>,
    Path(id): Path<String>,
) -> ApiResult<ReservationDto> {
    ok(state.allocator.confirm(&id).await?)
}

#[utoipa::path(
    post,
    path = "/api/v1/reservations/{id}/complete",
    tag = "Reservations",
    params(("id" = String, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Charging finished", body = ApiResponse<ReservationDto>),
        (status = 400, description = "Not confirmed, canceled or already completed"),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn complete_reservation(
    State(state): State<ReservationAppState>,
    Path(id): Path<String>,
) -> ApiResult<ReservationDto> {
    ok(state.allocator.complete(&id).await?)
}

#[utoipa::path(
    post,
    path = "/api/v1/reservations/{id}/reopen",
    tag = "Reservations",
    params(("id" = String, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reopened; `warning` is set if the old slot was lost", body = ApiResponse<ReopenResponse>),
        (status = 400, description = "Not canceled"),
        (status = 404, description = "Reservation not found"),
        (status = 500, description = "Slot and reservation records disagree")
    )
)]
pub async fn reopen_reservation(
    State(state): State<ReservationAppState>,
    Caller(caller): Caller,
    RequestDeadline(deadline): RequestDeadline,
    Path(id): Path<String>,
) -> ApiResult<ReopenResponse> {
    let outcome = state.allocator.reopen(&id, deadline).await?;
    info!(
        reservation_id = %id,
        requested_by = %caller.user_id,
        warning = ?outcome.warning,
        "Reservation reopened via API"
    );
    Ok(Json(ApiResponse::success(outcome.into())))
}
