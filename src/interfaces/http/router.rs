//! API router with Swagger UI

use axum::{
    extract::FromRef,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::common::ApiResponse;
use super::modules::dashboard::{self, DashboardAppState};
use super::modules::health::{self, HealthState};
use super::modules::metrics::{self, MetricsState, METRICS_PATH};
use super::modules::reservations::{self, ReservationAppState};
use super::modules::slots::{self, SlotAppState};

/// Unified router state. Each handler keeps its own `State<T>` extractor and
/// axum narrows this down via `FromRef`.
#[derive(Clone)]
pub struct AppState {
    pub reservations: ReservationAppState,
    pub slots: SlotAppState,
    pub dashboard: DashboardAppState,
    pub health: HealthState,
    pub metrics: MetricsState,
}

impl FromRef<AppState> for ReservationAppState {
    fn from_ref(s: &AppState) -> Self {
        s.reservations.clone()
    }
}

impl FromRef<AppState> for SlotAppState {
    fn from_ref(s: &AppState) -> Self {
        s.slots.clone()
    }
}

impl FromRef<AppState> for DashboardAppState {
    fn from_ref(s: &AppState) -> Self {
        s.dashboard.clone()
    }
}

impl FromRef<AppState> for HealthState {
    fn from_ref(s: &AppState) -> Self {
        s.health.clone()
    }
}

impl FromRef<AppState> for MetricsState {
    fn from_ref(s: &AppState) -> Self {
        s.metrics.clone()
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::health_check,
        // Reservations
        reservations::create_reservation,
        reservations::list_reservations,
        reservations::list_my_reservations,
        reservations::list_upcoming_reservations,
        reservations::get_reservation,
        reservations::update_reservation,
        reservations::cancel_reservation,
        reservations::approve_reservation,
        reservations::confirm_reservation,
        reservations::complete_reservation,
        reservations::reopen_reservation,
        // Slots
        slots::initialize_slots,
        slots::list_slots,
        slots::deinitialize_slots,
        slots::get_slot,
        slots::delete_slot,
        // Dashboard
        dashboard::get_dashboard,
        dashboard::get_booking_trend,
    ),
    components(
        schemas(
            ApiResponse<String>,
            health::HealthResponse,
            health::ComponentHealth,
            reservations::ReservationDto,
            reservations::CreateReservationRequest,
            reservations::UpdateReservationRequest,
            reservations::ReopenResponse,
            slots::SlotDto,
            slots::AvailabilityParam,
            slots::StationDaySlots,
            slots::DeletedSlots,
            dashboard::DashboardResponse,
            dashboard::SlotCountsDto,
            dashboard::DailyCountDto,
        )
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Reservations", description = "Booking lifecycle: create, reschedule, cancel, approve, confirm, complete, reopen"),
        (name = "Slots", description = "Daily charging slot initialization and lookup"),
        (name = "Dashboard", description = "Role-specific summaries and booking trend"),
    ),
    info(
        title = "EV Booking API",
        version = "1.0.0",
        description = "Reservation allocation for EV charging stations. Caller identity comes from the X-User-Id / X-User-Role / X-User-Nic / X-Station-Id headers.",
        license(name = "MIT")
    )
)]
pub struct ApiDoc;

/// Create the API router with all routes
pub fn create_api_router(state: AppState) -> Router {
    let reservation_routes = Router::new()
        .route(
            "/",
            get(reservations::list_reservations).post(reservations::create_reservation),
        )
        .route("/mine", get(reservations::list_my_reservations))
        .route("/upcoming", get(reservations::list_upcoming_reservations))
        .route(
            "/{id}",
            get(reservations::get_reservation).patch(reservations::update_reservation),
        )
        .route("/{id}/cancel", post(reservations::cancel_reservation))
        .route("/{id}/approve", post(reservations::approve_reservation))
        .route("/{id}/confirm", post(reservations::confirm_reservation))
        .route("/{id}/complete", post(reservations::complete_reservation))
        .route("/{id}/reopen", post(reservations::reopen_reservation));

    let station_routes = Router::new().route(
        "/{station_id}/slots/{date}",
        get(slots::list_slots)
            .post(slots::initialize_slots)
            .delete(slots::deinitialize_slots),
    );

    let slot_routes =
        Router::new().route("/{id}", get(slots::get_slot).delete(slots::delete_slot));

    let dashboard_routes = Router::new()
        .route("/", get(dashboard::get_dashboard))
        .route("/trend", get(dashboard::get_booking_trend));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let swagger_routes = SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi());

    Router::new()
        .merge(swagger_routes)
        .route("/health", get(health::health_check))
        .route(METRICS_PATH, get(metrics::prometheus_metrics))
        .nest("/api/v1/reservations", reservation_routes)
        .nest("/api/v1/stations", station_routes)
        .nest("/api/v1/slots", slot_routes)
        .nest("/api/v1/dashboard", dashboard_routes)
        .layer(middleware::from_fn(metrics::http_metrics_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::{TimeZone, Utc};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::{json, Value};

    use crate::application::{
        DashboardService, ReservationAllocator, ReservationQueries, SlotService,
    };
    use crate::domain::{RepositoryProvider, SlotSchedule, TimePolicy};
    use crate::infrastructure::InMemoryRepositoryProvider;
    use crate::shared::{FixedClock, SharedClock};

    fn state() -> AppState {
        let repos: Arc<dyn RepositoryProvider> = InMemoryRepositoryProvider::shared();
        let clock: SharedClock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 3, 10, 7, 0, 0).unwrap(),
        ));
        AppState {
            reservations: ReservationAppState {
                allocator: Arc::new(ReservationAllocator::new(
                    repos.clone(),
                    TimePolicy::default(),
                    clock.clone(),
                )),
                queries: Arc::new(ReservationQueries::new(repos.clone(), clock.clone())),
            },
            slots: SlotAppState {
                slots: Arc::new(SlotService::new(repos.clone(), SlotSchedule::default())),
            },
            dashboard: DashboardAppState {
                dashboard: Arc::new(DashboardService::new(repos, clock)),
            },
            health: HealthState {
                db: None,
                started_at: Arc::new(Instant::now()),
            },
            metrics: MetricsState {
                handle: PrometheusBuilder::new().build_recorder().handle(),
            },
        }
    }

    struct TestApp {
        router: Router,
    }

    impl TestApp {
        fn new() -> Self {
            Self {
                router: create_api_router(state()),
            }
        }

        async fn send(
            &self,
            method: &str,
            uri: &str,
            user: Option<(&str, &str)>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            use tower::Service;

            let mut req = Request::builder().method(method).uri(uri);
            if let Some((id, role)) = user {
                req = req.header("X-User-Id", id).header("X-User-Role", role);
            }
            let req = match body {
                Some(b) => req
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&b).unwrap())),
                None => req.body(Body::empty()),
            }
            .unwrap();

            let mut svc = self.router.clone().into_service();
            let resp = svc.call(req).await.unwrap();
            let status = resp.status();
            let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
                .await
                .unwrap();
            (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
        }

        /// Initialize ST1 on 2025-03-11 and return the slot ids in order.
        async fn seed_slots(&self) -> Vec<String> {
            let (status, body) = self
                .send(
                    "POST",
                    "/api/v1/stations/ST1/slots/2025-03-11",
                    Some(("OP1", "station_operator")),
                    None,
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
            body["data"]["slots"]
                .as_array()
                .unwrap()
                .iter()
                .map(|s| s["id"].as_str().unwrap().to_string())
                .collect()
        }
    }

    const OWNER: Option<(&str, &str)> = Some(("U1", "ev_owner"));

    #[tokio::test]
    async fn health_reports_in_memory_store() {
        let app = TestApp::new();
        let (status, body) = app.send("GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["storage"], "memory");
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let app = TestApp::new();
        let (status, body) = app.send("GET", "/api-doc/openapi.json", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/api/v1/reservations/{id}/reopen"].is_object());
    }

    #[tokio::test]
    async fn second_booking_of_a_slot_conflicts() {
        let app = TestApp::new();
        let slots = app.seed_slots().await;

        let (status, body) = app
            .send("POST", "/api/v1/reservations", OWNER, Some(json!({"slot_id": slots[2]})))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["status"], "Pending");
        assert_eq!(body["data"]["station_id"], "ST1");
        assert_eq!(body["data"]["reservation_time"], "2025-03-11T10:00:00Z");

        let (status, body) = app
            .send(
                "POST",
                "/api/v1/reservations",
                Some(("U2", "ev_owner")),
                Some(json!({"slot_id": slots[2]})),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error_code"], "conflict");

        let (_, body) = app
            .send(
                "GET",
                "/api/v1/stations/ST1/slots/2025-03-11?availability=claimed",
                None,
                None,
            )
            .await;
        assert_eq!(body["data"]["slots"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn lifecycle_through_the_api() {
        let app = TestApp::new();
        let slots = app.seed_slots().await;

        let (_, body) = app
            .send("POST", "/api/v1/reservations", OWNER, Some(json!({"slot_id": slots[0]})))
            .await;
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = app
            .send("POST", &format!("/api/v1/reservations/{id}/complete"), OWNER, None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "invalid_state");

        for (action, expected) in [("approve", "Approved"), ("confirm", "Confirmed"), ("complete", "Completed")] {
            let (status, body) = app
                .send("POST", &format!("/api/v1/reservations/{id}/{action}"), OWNER, None)
                .await;
            assert_eq!(status, StatusCode::OK, "{action}");
            assert_eq!(body["data"]["status"], expected);
        }

        let (status, _) = app
            .send("POST", &format!("/api/v1/reservations/{id}/cancel"), OWNER, None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn cancel_then_reopen_reclaims_slot() {
        let app = TestApp::new();
        let slots = app.seed_slots().await;

        let (_, body) = app
            .send("POST", "/api/v1/reservations", OWNER, Some(json!({"slot_id": slots[5]})))
            .await;
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = app
            .send("POST", &format!("/api/v1/reservations/{id}/cancel"), OWNER, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "Canceled");

        let (status, body) = app
            .send("POST", &format!("/api/v1/reservations/{id}/reopen"), OWNER, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["reservation"]["status"], "Pending");
        assert_eq!(body["data"]["reservation"]["slot_id"], slots[5].as_str());
        assert!(body["data"].get("warning").is_none());
    }

    #[tokio::test]
    async fn update_moves_and_clears_slot() {
        let app = TestApp::new();
        let slots = app.seed_slots().await;

        let (_, body) = app
            .send("POST", "/api/v1/reservations", OWNER, Some(json!({"slot_id": slots[1]})))
            .await;
        let id = body["data"]["id"].as_str().unwrap().to_string();
        let uri = format!("/api/v1/reservations/{id}");

        let (status, body) = app
            .send("PATCH", &uri, OWNER, Some(json!({"slot_id": slots[3]})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["slot_id"], slots[3].as_str());

        let (status, body) = app
            .send("PATCH", &uri, OWNER, Some(json!({"slot_id": null})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["slot_id"].is_null());

        let (_, body) = app
            .send(
                "GET",
                "/api/v1/stations/ST1/slots/2025-03-11?availability=unclaimed",
                None,
                None,
            )
            .await;
        assert_eq!(body["data"]["slots"].as_array().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn booking_beyond_the_window_is_a_policy_violation() {
        let app = TestApp::new();
        let (status, body) = app
            .send(
                "POST",
                "/api/v1/reservations",
                OWNER,
                Some(json!({"station_id": "ST1", "reservation_time": "2025-03-20T10:00:00Z"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "policy_violation");
    }

    #[tokio::test]
    async fn requests_without_identity_are_rejected() {
        let app = TestApp::new();
        let (status, body) = app
            .send("POST", "/api/v1/reservations", None, Some(json!({"slot_id": "SL1"})))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "unauthenticated");
    }

    #[tokio::test]
    async fn empty_slot_id_fails_validation() {
        let app = TestApp::new();
        let (status, body) = app
            .send("POST", "/api/v1/reservations", OWNER, Some(json!({"slot_id": ""})))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error_code"], "validation");
    }

    #[tokio::test]
    async fn owners_cannot_book_for_someone_else() {
        let app = TestApp::new();
        let slots = app.seed_slots().await;
        let body = json!({"slot_id": slots[0], "owner_id": "U9"});

        let (status, _) = app
            .send("POST", "/api/v1/reservations", OWNER, Some(body.clone()))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app
            .send("POST", "/api/v1/reservations", Some(("B1", "backoffice")), Some(body))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["owner_id"], "U9");
    }

    #[tokio::test]
    async fn unknown_reservation_is_not_found() {
        let app = TestApp::new();
        let (status, body) = app.send("GET", "/api/v1/reservations/nope", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error_code"], "not_found");
    }

    #[tokio::test]
    async fn owner_dashboard_and_trend() {
        let app = TestApp::new();
        let slots = app.seed_slots().await;
        app.send("POST", "/api/v1/reservations", OWNER, Some(json!({"slot_id": slots[0]})))
            .await;

        let (status, body) = app.send("GET", "/api/v1/dashboard", OWNER, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["role"], "ev_owner");
        assert_eq!(body["data"]["total_bookings"], 1);
        assert_eq!(body["data"]["upcoming"].as_array().unwrap().len(), 1);

        let (status, body) = app
            .send("GET", "/api/v1/dashboard/trend?days=3", None, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let counts: Vec<u64> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["count"].as_u64().unwrap())
            .collect();
        assert_eq!(counts, vec![0, 0, 1]);

        let (status, _) = app
            .send("GET", "/api/v1/dashboard/trend?days=0", None, None)
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
