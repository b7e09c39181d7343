//! Configuration module
//!
//! `AppConfig` is read from a TOML file. Every section and field has a
//! default, so a partial (or empty) file is valid.
//!
//! ```toml
//! [server]
//! api_port = 8080
//!
//! [booking]
//! admission_window_hours = 168
//! lockout_window_hours = 12
//!
//! [slots]
//! opening_hour = 8
//! closing_hour = 18
//! slot_minutes = 60
//! ```

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{SlotSchedule, TimePolicy};
use crate::infrastructure::DatabaseConfig;

/// Environment variable that overrides the default config location
pub const CONFIG_ENV: &str = "EV_BOOKING_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid value: {0}")]
    Invalid(String),
}

// ── Sections ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub api_host: String,
    pub api_port: u16,
    /// Seconds to wait for in-flight work on shutdown
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_host: "0.0.0.0".to_string(),
            api_port: 8080,
            shutdown_timeout: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// EnvFilter directive, e.g. "info" or "ev_booking=debug"
    pub level: String,
    /// "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Time windows of the booking rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingConfig {
    /// How far ahead a reservation may be placed
    pub admission_window_hours: i64,
    /// How close to its time a reservation stops being changeable
    pub lockout_window_hours: i64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            admission_window_hours: 7 * 24,
            lockout_window_hours: 12,
        }
    }
}

impl From<&BookingConfig> for TimePolicy {
    fn from(cfg: &BookingConfig) -> Self {
        TimePolicy::new(
            Duration::hours(cfg.admission_window_hours),
            Duration::hours(cfg.lockout_window_hours),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotsConfig {
    pub opening_hour: u32,
    pub closing_hour: u32,
    pub slot_minutes: u32,
}

impl Default for SlotsConfig {
    fn default() -> Self {
        let schedule = SlotSchedule::default();
        Self {
            opening_hour: schedule.opening_hour,
            closing_hour: schedule.closing_hour,
            slot_minutes: schedule.slot_minutes,
        }
    }
}

impl From<&SlotsConfig> for SlotSchedule {
    fn from(cfg: &SlotsConfig) -> Self {
        SlotSchedule {
            opening_hour: cfg.opening_hour,
            closing_hour: cfg.closing_hour,
            slot_minutes: cfg.slot_minutes,
        }
    }
}

// ── AppConfig ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub booking: BookingConfig,
    pub slots: SlotsConfig,
}

impl AppConfig {
    /// Read and validate the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Write the config as TOML, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let body = toml::to_string_pretty(self)?;
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, body).map_err(write_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.booking.admission_window_hours <= 0 {
            return Err(ConfigError::Invalid(
                "booking.admission_window_hours must be positive".into(),
            ));
        }
        if self.booking.lockout_window_hours < 0 {
            return Err(ConfigError::Invalid(
                "booking.lockout_window_hours must not be negative".into(),
            ));
        }
        SlotSchedule::from(&self.slots)
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("slots: {}", e)))?;
        if self.database.url.is_empty() {
            return Err(ConfigError::Invalid("database.url is empty".into()));
        }
        Ok(())
    }

    pub fn api_address(&self) -> String {
        format!("{}:{}", self.server.api_host, self.server.api_port)
    }

    pub fn time_policy(&self) -> TimePolicy {
        TimePolicy::from(&self.booking)
    }

    pub fn slot_schedule(&self) -> SlotSchedule {
        SlotSchedule::from(&self.slots)
    }
}

/// `$EV_BOOKING_CONFIG`, else `~/.config/ev-booking/config.toml`.
pub fn default_config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ev-booking")
        .join("config.toml")
}
