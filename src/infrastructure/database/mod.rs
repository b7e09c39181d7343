pub mod entities;
pub mod migrator;
pub mod repositories;

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite://./ev-booking.db?mode=rwc")
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Seconds to wait for a pooled connection
    pub acquire_timeout: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./ev-booking.db?mode=rwc".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: 8,
        }
    }
}

impl DatabaseConfig {
    /// Create config for SQLite
    pub fn sqlite(path: &str) -> Self {
        Self {
            url: format!("sqlite://{}?mode=rwc", path),
            ..Self::default()
        }
    }

    /// Private in-memory SQLite database.
    ///
    /// Pinned to a single connection: every new `:memory:` connection
    /// would otherwise open an empty database of its own.
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            ..Self::default()
        }
    }
}

/// Initialize database connection
pub async fn init_database(config: &DatabaseConfig) -> Result<DatabaseConnection, sea_orm::DbErr> {
    info!("Connecting to database: {}", config.url);

    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections.max(1))
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout))
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    info!("Database connected successfully");
    Ok(db)
}

/// Fresh, migrated in-memory database for repository tests
#[cfg(test)]
pub(crate) async fn test_database() -> DatabaseConnection {
    use sea_orm_migration::MigratorTrait;

    let db = init_database(&DatabaseConfig::in_memory()).await.unwrap();
    migrator::Migrator::up(&db, None).await.unwrap();
    db
}

/// Migrated SQLite file behind a multi-connection pool, for tests that need
/// statements from different connections to contend. The database lives as
/// long as the returned `TempDir`.
#[cfg(test)]
pub(crate) async fn pooled_test_database() -> (DatabaseConnection, tempfile::TempDir) {
    use sea_orm_migration::MigratorTrait;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("booking.db");
    let config = DatabaseConfig {
        max_connections: 10,
        min_connections: 4,
        ..DatabaseConfig::sqlite(path.to_str().unwrap())
    };
    let db = init_database(&config).await.unwrap();
    migrator::Migrator::up(&db, None).await.unwrap();
    (db, dir)
}
