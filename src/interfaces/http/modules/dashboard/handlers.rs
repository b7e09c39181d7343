//! Dashboard HTTP handlers

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;

use crate::application::dashboard::TREND_DAYS;
use crate::application::DashboardService;
use crate::interfaces::http::common::error::ApiResult;
use crate::interfaces::http::common::{ApiResponse, Caller};

use super::dto::*;

#[derive(Clone)]
pub struct DashboardAppState {
    pub dashboard: Arc<DashboardService>,
}

#[utoipa::path(
    get,
    path = "/api/v1/dashboard",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Summary for the caller's role", body = ApiResponse<DashboardResponse>),
        (status = 401, description = "Missing identity headers"),
        (status = 422, description = "Station operator without a station")
    )
)]
pub async fn get_dashboard(
    State(state): State<DashboardAppState>,
    Caller(caller): Caller,
) -> ApiResult<DashboardResponse> {
    let summary = state.dashboard.summary(&caller).await?;
    Ok(Json(ApiResponse::success(summary.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/dashboard/trend",
    tag = "Dashboard",
    params(TrendQuery),
    responses(
        (status = 200, description = "Bookings created per day, oldest first", body = ApiResponse<Vec<DailyCountDto>>),
        (status = 422, description = "days out of range")
    )
)]
pub async fn get_booking_trend(
    State(state): State<DashboardAppState>,
    Query(query): Query<TrendQuery>,
) -> ApiResult<Vec<DailyCountDto>> {
    let trend = state
        .dashboard
        .trend(query.days.unwrap_or(TREND_DAYS))
        .await?;
    Ok(Json(ApiResponse::success(trend.into_iter().map(Into::into).collect())))
}
