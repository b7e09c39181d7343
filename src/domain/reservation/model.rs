//! Reservation domain entity

use chrono::{DateTime, Utc};

/// Lifecycle position derived from the four reservation flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationStatus {
    /// Created, waiting for backoffice approval
    Pending,
    /// Approved by backoffice
    Approved,
    /// Confirmed by the station operator
    Confirmed,
    /// Charging session finished
    Completed,
    /// Withdrawn by the owner or backoffice
    Canceled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Confirmed => "Confirmed",
            Self::Completed => "Completed",
            Self::Canceled => "Canceled",
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A booking of one slot (or, slot-less, a bare station + time) by an owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub id: String,
    pub owner_id: String,
    pub station_id: String,
    pub slot_id: Option<String>,
    pub reservation_time: DateTime<Utc>,
    pub approved: bool,
    pub confirmed: bool,
    pub completed: bool,
    pub canceled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// New pending reservation with every flag cleared.
    pub fn new(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        station_id: impl Into<String>,
        slot_id: Option<String>,
        reservation_time: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            station_id: station_id.into(),
            slot_id,
            reservation_time,
            approved: false,
            confirmed: false,
            completed: false,
            canceled: false,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn status(&self) -> ReservationStatus {
        if self.canceled {
            ReservationStatus::Canceled
        } else if self.completed {
            ReservationStatus::Completed
        } else if self.confirmed {
            ReservationStatus::Confirmed
        } else if self.approved {
            ReservationStatus::Approved
        } else {
            ReservationStatus::Pending
        }
    }

    /// Neither canceled nor completed
    pub fn is_open(&self) -> bool {
        !self.canceled && !self.completed
    }

    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.is_open() && self.reservation_time >= now
    }

    /// Whether `transition` may be applied to the current flags.
    pub fn permits(&self, transition: Transition) -> bool {
        match transition {
            Transition::Approve | Transition::Confirm | Transition::Cancel => self.is_open(),
            Transition::Complete => self.is_open() && self.confirmed,
            Transition::Reopen => self.canceled,
        }
    }

    /// Apply `transition` unconditionally. Callers check [`Self::permits`] first.
    pub fn apply(&mut self, transition: Transition, at: DateTime<Utc>) {
        match transition {
            Transition::Approve => self.approved = true,
            Transition::Confirm => self.confirmed = true,
            Transition::Complete => self.completed = true,
            Transition::Cancel => self.canceled = true,
            Transition::Reopen => {
                self.canceled = false;
                self.approved = false;
                self.confirmed = false;
                self.slot_id = None;
            }
        }
        self.updated_at = at;
    }

    /// Whether the reservation currently references `expected` as its slot.
    pub fn holds_slot(&self, expected: Option<&str>) -> bool {
        self.slot_id.as_deref() == expected
    }

    pub fn assign(&mut self, assignment: SlotAssignment, at: DateTime<Utc>) {
        self.slot_id = assignment.slot_id;
        self.station_id = assignment.station_id;
        self.reservation_time = assignment.reservation_time;
        self.updated_at = at;
    }
}

/// Flag change applied through a conditional store update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Requires open; sets `approved`
    Approve,
    /// Requires open; sets `confirmed`
    Confirm,
    /// Requires open and confirmed; sets `completed`
    Complete,
    /// Requires open; sets `canceled`, keeps the slot reference
    Cancel,
    /// Requires canceled; back to pending with no slot
    Reopen,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Confirm => "confirm",
            Self::Complete => "complete",
            Self::Cancel => "cancel",
            Self::Reopen => "reopen",
        }
    }
}

/// Where and when a reservation takes place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotAssignment {
    pub slot_id: Option<String>,
    pub station_id: String,
    pub reservation_time: DateTime<Utc>,
}

// ── Tests ──────────────────────────────────────────────────────
