//! Temporal booking rules
//!
//! Two pure predicates over timestamps:
//! - admission: a reservation may not be placed further ahead than the
//!   admission window (7 days by default)
//! - lockout: a reservation may not be updated or canceled once it is closer
//!   than the lockout window (12 hours by default)

use chrono::{DateTime, Duration, Utc};

use crate::domain::DomainResult;
use crate::shared::errors::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimePolicy {
    admission_window: Duration,
    lockout_window: Duration,
}

impl TimePolicy {
    pub fn new(admission_window: Duration, lockout_window: Duration) -> Self {
        Self {
            admission_window,
            lockout_window,
        }
    }

    pub fn admission_window(&self) -> Duration {
        self.admission_window
    }

    pub fn lockout_window(&self) -> Duration {
        self.lockout_window
    }

    /// Rejects reservations more than `admission_window` ahead of `now`.
    ///
    /// There is no lower bound: past times are rejected by slot absence,
    /// not by this check.
    pub fn check_admission(
        &self,
        reservation_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if reservation_time - now > self.admission_window {
            return Err(DomainError::PolicyViolation(format!(
                "too far ahead: reservations must be within {} hours",
                self.admission_window.num_hours()
            )));
        }
        Ok(())
    }

    /// Rejects changes once the reservation is closer than `lockout_window`.
    pub fn check_mutable(
        &self,
        reservation_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if reservation_time - now < self.lockout_window {
            return Err(DomainError::PolicyViolation(format!(
                "locked: cannot change a reservation less than {} hours before it starts",
                self.lockout_window.num_hours()
            )));
        }
        Ok(())
    }
}

impl Default for TimePolicy {
    fn default() -> Self {
        Self::new(Duration::days(7), Duration::hours(12))
    }
}
