//! Reusable booking server runtime.
//!
//! [`ServerHandle`] owns the whole lifecycle: metrics recorder, storage
//! (SeaORM database or the in-memory store), services, REST API and graceful
//! shutdown. The CLI binary is a thin wrapper around it.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tracing::{error, info, warn};

use crate::application::{DashboardService, ReservationAllocator, ReservationQueries, SlotService};
use crate::config::AppConfig;
use crate::domain::RepositoryProvider;
use crate::infrastructure::database::migrator::Migrator;
use crate::infrastructure::{init_database, InMemoryRepositoryProvider, SeaOrmRepositoryProvider};
use crate::interfaces::http::modules::dashboard::DashboardAppState;
use crate::interfaces::http::modules::health::HealthState;
use crate::interfaces::http::modules::metrics::MetricsState;
use crate::interfaces::http::modules::reservations::ReservationAppState;
use crate::interfaces::http::modules::slots::SlotAppState;
use crate::interfaces::http::{create_api_router, AppState};
use crate::shared::{InfraError, SharedClock, ShutdownCoordinator, ShutdownSignal, SystemClock};

// ── Options ────────────────────────────────────────────────────────

pub struct ServerOptions {
    pub config: AppConfig,
    /// Run database migrations on startup (default: true).
    pub auto_migrate: bool,
    /// Keep everything in process memory instead of the configured database.
    pub in_memory: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            config: AppConfig::default(),
            auto_migrate: true,
            in_memory: false,
        }
    }
}

/// The global metrics recorder can only be installed once per process, so a
/// stop + start within one process reuses it.
fn prometheus_handle() -> Result<PrometheusHandle, InfraError> {
    static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

    if let Some(handle) = PROM_HANDLE.get() {
        return Ok(handle.clone());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| InfraError::Metrics(e.to_string()))?;
    info!("📊 Prometheus metrics recorder installed");
    Ok(PROM_HANDLE.get_or_init(|| handle).clone())
}

// ── ServerHandle ───────────────────────────────────────────────────

/// Handle to a running booking server.
///
/// ```rust,no_run
/// use ev_booking::server::{ServerHandle, ServerOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let handle = ServerHandle::start(ServerOptions::default()).await?;
///     handle.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct ServerHandle {
    pub repos: Arc<dyn RepositoryProvider>,
    pub config: AppConfig,
    /// Address the REST API is bound to (resolves port 0)
    pub local_addr: SocketAddr,

    db: Option<DatabaseConnection>,
    shutdown: ShutdownCoordinator,
    api_task: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Start the server:
    /// 1. Install the Prometheus recorder
    /// 2. Connect storage and run migrations
    /// 3. Build services and the REST API
    /// 4. Bind and serve until shutdown is triggered
    pub async fn start(opts: ServerOptions) -> Result<Self, InfraError> {
        let app_cfg = opts.config;
        app_cfg.validate()?;

        info!("Starting EV booking service...");
        let prometheus = prometheus_handle()?;

        // ── Storage ────────────────────────────────────────────
        let (repos, db): (Arc<dyn RepositoryProvider>, Option<DatabaseConnection>) =
            if opts.in_memory {
                warn!("Using the in-memory store; nothing survives a restart");
                (InMemoryRepositoryProvider::shared(), None)
            } else {
                let db = init_database(&app_cfg.database).await?;
                if opts.auto_migrate {
                    info!("Running database migrations...");
                    Migrator::up(&db, None).await?;
                    info!("Migrations completed");
                }
                (Arc::new(SeaOrmRepositoryProvider::new(db.clone())), Some(db))
            };

        // ── Services ───────────────────────────────────────────
        let clock: SharedClock = Arc::new(SystemClock);
        let policy = app_cfg.time_policy();
        info!(
            admission_hours = app_cfg.booking.admission_window_hours,
            lockout_hours = app_cfg.booking.lockout_window_hours,
            "Booking policy configured"
        );

        let state = AppState {
            reservations: ReservationAppState {
                allocator: Arc::new(ReservationAllocator::new(repos.clone(), policy, clock.clone())),
                queries: Arc::new(ReservationQueries::new(repos.clone(), clock.clone())),
            },
            slots: SlotAppState {
                slots: Arc::new(SlotService::new(repos.clone(), app_cfg.slot_schedule())),
            },
            dashboard: DashboardAppState {
                dashboard: Arc::new(DashboardService::new(repos.clone(), clock)),
            },
            health: HealthState {
                db: db.clone(),
                started_at: Arc::new(Instant::now()),
            },
            metrics: MetricsState { handle: prometheus },
        };

        // ── REST API ───────────────────────────────────────────
        let shutdown = ShutdownCoordinator::new(app_cfg.server.shutdown_timeout);
        let api_shutdown = shutdown.signal();

        let listener = tokio::net::TcpListener::bind(app_cfg.api_address()).await?;
        let local_addr = listener.local_addr()?;
        info!("REST API server listening on http://{}", local_addr);
        info!("Swagger UI available at http://{}/docs/", local_addr);

        let api_server = axum::serve(listener, create_api_router(state)).with_graceful_shutdown(
            async move {
                api_shutdown.wait().await;
                info!("🛑 REST API server received shutdown signal");
            },
        );

        let api_task = tokio::spawn(async move {
            if let Err(e) = api_server.await {
                error!(error = %e, "REST API server error");
            }
        });

        info!("🚀 EV booking service started");

        Ok(Self {
            repos,
            config: app_cfg,
            local_addr,
            db,
            shutdown,
            api_task,
        })
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Install OS signal listeners (SIGTERM, SIGINT) that trigger shutdown.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    /// Trigger graceful shutdown without waiting for it.
    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Wait for the server to stop after shutdown has been triggered, bounded
    /// by `server.shutdown_timeout`.
    pub async fn wait(self) {
        info!("⏳ Waiting for server tasks to complete...");

        let Self {
            db,
            shutdown,
            api_task,
            ..
        } = self;

        let drained = shutdown
            .run_cleanup(async move {
                match api_task.await {
                    Ok(()) => info!("REST API server stopped"),
                    Err(e) => error!(error = %e, "REST API server task panicked"),
                }
            })
            .await;
        if !drained {
            warn!("Closing storage with requests still in flight");
        }

        if let Some(db) = db {
            match db.close().await {
                Ok(()) => info!("✅ Database connection closed"),
                Err(e) => warn!(error = %e, "Error closing database connection"),
            }
        }

        info!("👋 EV booking service shutdown complete");
    }

    pub async fn shutdown(self) {
        info!("🛑 Shutting down EV booking service...");
        self.trigger_shutdown();
        self.wait().await;
    }

    pub fn is_running(&self) -> bool {
        !self.api_task.is_finished()
    }
}

/// Initialize tracing from the application config. Call once at startup.
///
/// `RUST_LOG` wins over `logging.level` when set.
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if config.logging.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ServerOptions {
        let mut config = AppConfig::default();
        config.server.api_host = "127.0.0.1".into();
        config.server.api_port = 0;
        config.server.shutdown_timeout = 5;
        ServerOptions {
            config,
            auto_migrate: true,
            in_memory: true,
        }
    }

    #[tokio::test]
    async fn in_memory_server_starts_and_stops() {
        let handle = ServerHandle::start(options()).await.unwrap();
        assert!(handle.is_running());
        assert_ne!(handle.local_addr.port(), 0);

        let signal = handle.shutdown_signal();
        handle.shutdown().await;
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn invalid_config_is_refused() {
        let mut opts = options();
        opts.config.booking.admission_window_hours = 0;
        let err = ServerHandle::start(opts).await.err().unwrap();
        assert!(matches!(err, InfraError::Config(_)));
    }
}
